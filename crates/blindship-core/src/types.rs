//! Common types used throughout Blindship.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Storage key form (bare UUID, no prefix).
            #[must_use]
            pub fn key(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of an address owner (the user who issues shipping tokens).
    OwnerId,
    "owner"
);

uuid_id!(
    /// Identifier of a permission record (one per issued shipping token).
    PermissionId,
    "perm"
);

uuid_id!(
    /// Identifier of a shipment record.
    ShipmentId,
    "shipment"
);

/// Error returned when a carrier identifier is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid carrier id {0:?}: expected 1-32 lowercase ascii letters, digits, '-' or '_'")]
pub struct InvalidCarrierId(pub String);

/// Identifier of a shipping carrier (`usps`, `fedex`, `ups`, `dhl`, ...).
///
/// Always lowercase; parsing normalizes case so `USPS` and `usps` are the
/// same carrier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CarrierId(String);

impl CarrierId {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 32;

    /// Parse and normalize a carrier identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCarrierId`] if the identifier is empty, too long, or
    /// contains characters other than ascii letters, digits, `-` and `_`.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidCarrierId> {
        let raw = raw.as_ref().trim();
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(InvalidCarrierId(raw.to_string()))
        }
    }

    /// The normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `usps`.
    #[must_use]
    pub fn usps() -> Self {
        Self("usps".into())
    }

    /// `fedex`.
    #[must_use]
    pub fn fedex() -> Self {
        Self("fedex".into())
    }

    /// `ups`.
    #[must_use]
    pub fn ups() -> Self {
        Self("ups".into())
    }

    /// `dhl`.
    #[must_use]
    pub fn dhl() -> Self {
        Self("dhl".into())
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CarrierId {
    type Err = InvalidCarrierId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CarrierId {
    type Error = InvalidCarrierId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CarrierId> for String {
    fn from(id: CarrierId) -> Self {
        id.0
    }
}

impl AsRef<str> for CarrierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Timestamp wrapper for consistent handling throughout Blindship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// A timestamp `delta` away from now (negative deltas point to the past).
    #[must_use]
    pub fn from_now(delta: Duration) -> Self {
        Self(Utc::now().checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    /// Check if this timestamp is in the past.
    #[must_use]
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now()
    }

    /// Check if this timestamp is before `other`.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self.0 < other.0
    }

    /// RFC 3339 rendering used in wire payloads.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_id_display_and_parse() {
        let id = PermissionId::new();
        let display = id.to_string();
        assert!(display.starts_with("perm:"));

        let parsed: PermissionId = display.parse().unwrap();
        assert_eq!(parsed, id);

        // Bare UUIDs parse too (storage keys).
        let parsed: PermissionId = id.key().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ShipmentId::new(), ShipmentId::new());
        assert_ne!(OwnerId::new(), OwnerId::new());
    }

    #[test]
    fn test_carrier_id_normalizes_case() {
        let id = CarrierId::new(" USPS ").unwrap();
        assert_eq!(id.as_str(), "usps");
        assert_eq!(id, CarrierId::new("usps").unwrap());
        assert_eq!(id, CarrierId::usps());
    }

    #[test]
    fn test_carrier_id_rejects_garbage() {
        assert!(CarrierId::new("").is_err());
        assert!(CarrierId::new("fed ex").is_err());
        assert!(CarrierId::new("ups/../admin").is_err());
        assert!(CarrierId::new("x".repeat(33)).is_err());
    }

    #[test]
    fn test_carrier_id_serde_roundtrip_validates() {
        let id: CarrierId = serde_json::from_str("\"DHL\"").unwrap();
        assert_eq!(id.as_str(), "dhl");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dhl\"");
        assert!(serde_json::from_str::<CarrierId>("\"no spaces\"").is_err());
    }

    #[test]
    fn test_timestamp_ordering() {
        let past = Timestamp::from_now(Duration::seconds(-60));
        let future = Timestamp::from_now(Duration::seconds(60));
        assert!(past.is_past());
        assert!(!future.is_past());
        assert!(past.is_before(&future));
    }
}
