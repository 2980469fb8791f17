//! Access log entry types.

use blindship_core::{AddressField, CarrierId, PermissionId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an access log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessLogId(pub Uuid);

impl AccessLogId {
    /// Create a new entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccessLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccessLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "access:{}", self.0)
    }
}

/// Why the address was disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessPurpose {
    /// A carrier resolved the token directly (`/resolve`).
    Resolve,
    /// The broker resolved the token to create a shipment.
    CreateShipment {
        /// Requested carrier service.
        service: String,
    },
}

/// One disclosure of an owner's address to a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Unique entry identifier.
    pub id: AccessLogId,
    /// Permission whose token was resolved.
    pub permission_id: PermissionId,
    /// Carrier that received the address.
    pub carrier: CarrierId,
    /// Exactly the fields that were revealed.
    pub disclosed_fields: Vec<AddressField>,
    /// The permission's access counter after this access (1-based).
    pub access_number: u32,
    /// Why the address was disclosed.
    pub purpose: AccessPurpose,
    /// When the disclosure happened.
    pub accessed_at: Timestamp,
}

impl AccessLogEntry {
    /// Create a new entry stamped with the current time.
    #[must_use]
    pub fn new(
        permission_id: PermissionId,
        carrier: CarrierId,
        disclosed_fields: Vec<AddressField>,
        access_number: u32,
        purpose: AccessPurpose,
    ) -> Self {
        Self {
            id: AccessLogId::new(),
            permission_id,
            carrier,
            disclosed_fields,
            access_number,
            purpose,
            accessed_at: Timestamp::now(),
        }
    }

    /// Storage key: orders entries by access number, unique per entry.
    pub(crate) fn storage_key(&self) -> String {
        format!("{:010}-{}", self.access_number, self.id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u32) -> AccessLogEntry {
        AccessLogEntry::new(
            PermissionId::new(),
            CarrierId::new("usps").unwrap(),
            AddressField::ALL.to_vec(),
            n,
            AccessPurpose::Resolve,
        )
    }

    #[test]
    fn test_storage_key_sorts_by_access_number() {
        let a = entry(2).storage_key();
        let b = entry(10).storage_key();
        assert!(a < b);
        assert!(a.starts_with("0000000002-"));
    }

    #[test]
    fn test_purpose_serialization() {
        let purpose = AccessPurpose::CreateShipment {
            service: "Priority".into(),
        };
        let json = serde_json::to_value(&purpose).unwrap();
        assert_eq!(json["kind"], "create_shipment");
        assert_eq!(json["service"], "Priority");
    }

    #[test]
    fn test_entry_serialization_names_fields_only() {
        let json = serde_json::to_string(&entry(1)).unwrap();
        assert!(json.contains("\"street_address\""));
        assert!(json.contains("\"carrier\":\"usps\""));
    }
}
