//! Permission records: the server-side state behind a shipping token.

use blindship_core::{CarrierId, OwnerId, PermissionId, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilityResult};
use crate::scope::ShippingScope;
use crate::token::ShippingToken;

/// A shipping capability record.
///
/// Created by the owner at issuance, mutated only by the resolver (access
/// counter, `last_accessed_at`) and by revocation, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Record identifier.
    pub id: PermissionId,
    /// The bearer token carriers present.
    pub token: ShippingToken,
    /// Owner whose address the token resolves to.
    pub owner_id: OwnerId,
    /// What the token allows.
    pub scope: ShippingScope,
    /// Human name of the app the token was issued to.
    #[serde(default)]
    pub label: Option<String>,
    /// When the token was issued.
    pub issued_at: Timestamp,
    /// When the token stops working (`None` = never).
    pub expires_at: Option<Timestamp>,
    /// Whether the owner revoked the token.
    pub revoked: bool,
    /// When it was revoked.
    #[serde(default)]
    pub revoked_at: Option<Timestamp>,
    /// Maximum number of resolutions (`None` = unlimited).
    pub max_access_count: Option<u32>,
    /// Resolutions so far.
    pub access_count: u32,
    /// Time of the last resolution.
    pub last_accessed_at: Option<Timestamp>,
}

impl Permission {
    /// Whether the token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        self.expires_at.is_some_and(|exp| !now.is_before(&exp))
    }

    /// Accesses left before the limit, `None` when unlimited.
    #[must_use]
    pub fn remaining_accesses(&self) -> Option<u32> {
        self.max_access_count
            .map(|max| max.saturating_sub(self.access_count))
    }

    /// Checks 3-5 of resolution: expiry, revocation, access limit.
    ///
    /// Expiry is checked first, so an expired token reports `TokenExpired`
    /// even when it also has accesses left or was revoked.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn check_usable(&self, now: &Timestamp) -> CapabilityResult<()> {
        if self.is_expired_at(now) {
            return Err(CapabilityError::TokenExpired {
                permission_id: self.id.to_string(),
            });
        }
        if self.revoked {
            return Err(CapabilityError::TokenRevoked {
                permission_id: self.id.to_string(),
            });
        }
        if let Some(max) = self.max_access_count
            && self.access_count >= max
        {
            return Err(CapabilityError::AccessLimitReached {
                permission_id: self.id.to_string(),
                max,
            });
        }
        Ok(())
    }

    /// Check that the carrier is in scope.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::CarrierNotAuthorized`].
    pub fn check_carrier(&self, carrier: &CarrierId) -> CapabilityResult<()> {
        if self.scope.allows_carrier(carrier) {
            Ok(())
        } else {
            Err(CapabilityError::CarrierNotAuthorized {
                carrier: carrier.to_string(),
                permission_id: self.id.to_string(),
            })
        }
    }

    /// The requested service is in scope.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::ServiceNotAuthorized`].
    pub fn check_service(&self, service: &str) -> CapabilityResult<()> {
        if self.scope.allows_service(service) {
            Ok(())
        } else {
            Err(CapabilityError::ServiceNotAuthorized {
                service: service.to_owned(),
                permission_id: self.id.to_string(),
            })
        }
    }

    /// Apply one access: re-check usability, bump the counter.
    ///
    /// Runs inside the store's atomic step; a racing resolution that lost the
    /// compare-and-swap re-runs this against the fresh record.
    ///
    /// # Errors
    ///
    /// Returns the usability error if the record no longer allows access.
    pub(crate) fn apply_access(&mut self, now: Timestamp) -> CapabilityResult<()> {
        self.check_usable(&now)?;
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = Some(now);
        Ok(())
    }
}

/// Defaults applied by [`PermissionBuilder`] when limits are not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceDefaults {
    /// Token lifetime in days.
    pub expiry_days: u32,
    /// Maximum resolutions.
    pub max_access_count: u32,
}

impl Default for IssuanceDefaults {
    fn default() -> Self {
        Self {
            expiry_days: 7,
            max_access_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Expiry {
    Default,
    Never,
    At(Timestamp),
}

#[derive(Debug, Clone, Copy)]
enum Limit {
    Default,
    Unlimited,
    Max(u32),
}

/// Builder for new permissions (token issuance).
///
/// ```rust
/// use blindship_capabilities::{PermissionBuilder, ShippingScope};
/// use blindship_core::{CarrierId, OwnerId};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scope = ShippingScope::new([CarrierId::new("usps")?], ["Priority"], false)?;
/// let permission = PermissionBuilder::new(OwnerId::new(), scope)
///     .label("Acme Store")
///     .max_access_count(3)
///     .build()?;
/// assert!(permission.token.expose().starts_with("ship_"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PermissionBuilder {
    owner_id: OwnerId,
    scope: ShippingScope,
    label: Option<String>,
    token: Option<ShippingToken>,
    expiry: Expiry,
    limit: Limit,
    defaults: IssuanceDefaults,
}

impl PermissionBuilder {
    /// Start building a permission for `owner_id`.
    #[must_use]
    pub fn new(owner_id: OwnerId, scope: ShippingScope) -> Self {
        Self {
            owner_id,
            scope,
            label: None,
            token: None,
            expiry: Expiry::Default,
            limit: Limit::Default,
            defaults: IssuanceDefaults::default(),
        }
    }

    /// Use configured issuance defaults.
    #[must_use]
    pub fn defaults(mut self, defaults: IssuanceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Name the app the token is issued to.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Use a specific token instead of generating one.
    #[must_use]
    pub fn token(mut self, token: ShippingToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Expire after `ttl`.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::At(Timestamp::from_now(ttl));
        self
    }

    /// Expire at an absolute time.
    #[must_use]
    pub fn expires_at(mut self, at: Timestamp) -> Self {
        self.expiry = Expiry::At(at);
        self
    }

    /// Never expire.
    #[must_use]
    pub fn never_expires(mut self) -> Self {
        self.expiry = Expiry::Never;
        self
    }

    /// Allow at most `max` resolutions.
    #[must_use]
    pub fn max_access_count(mut self, max: u32) -> Self {
        self.limit = Limit::Max(max);
        self
    }

    /// Allow unlimited resolutions.
    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.limit = Limit::Unlimited;
        self
    }

    /// Build the permission.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidPermission`] if the expiry is not in
    /// the future or the access limit is zero.
    pub fn build(self) -> CapabilityResult<Permission> {
        let issued_at = Timestamp::now();

        let expires_at = match self.expiry {
            Expiry::Never => None,
            Expiry::At(at) => Some(at),
            Expiry::Default => Some(Timestamp::from_now(Duration::days(i64::from(
                self.defaults.expiry_days,
            )))),
        };
        if let Some(at) = &expires_at
            && !issued_at.is_before(at)
        {
            return Err(CapabilityError::InvalidPermission(
                "expiry must be in the future".into(),
            ));
        }

        let max_access_count = match self.limit {
            Limit::Unlimited => None,
            Limit::Max(max) => Some(max),
            Limit::Default => Some(self.defaults.max_access_count),
        };
        if max_access_count == Some(0) {
            return Err(CapabilityError::InvalidPermission(
                "max access count must be at least 1".into(),
            ));
        }

        let label = self
            .label
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());

        Ok(Permission {
            id: PermissionId::new(),
            token: self.token.unwrap_or_else(ShippingToken::generate),
            owner_id: self.owner_id,
            scope: self.scope,
            label,
            issued_at,
            expires_at,
            revoked: false,
            revoked_at: None,
            max_access_count,
            access_count: 0,
            last_accessed_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ShippingScope {
        ShippingScope::new([CarrierId::new("usps").unwrap()], ["Priority"], false).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let p = PermissionBuilder::new(OwnerId::new(), scope()).build().unwrap();
        assert_eq!(p.max_access_count, Some(1));
        assert_eq!(p.access_count, 0);
        assert!(!p.revoked);

        let expires = p.expires_at.unwrap().into_inner();
        let days = expires.signed_duration_since(p.issued_at.into_inner()).num_days();
        assert!((6..=7).contains(&days));
    }

    #[test]
    fn test_builder_configured_defaults() {
        let p = PermissionBuilder::new(OwnerId::new(), scope())
            .defaults(IssuanceDefaults {
                expiry_days: 30,
                max_access_count: 5,
            })
            .build()
            .unwrap();
        assert_eq!(p.max_access_count, Some(5));
    }

    #[test]
    fn test_builder_rejects_past_expiry_and_zero_limit() {
        let past = PermissionBuilder::new(OwnerId::new(), scope())
            .expires_at(Timestamp::from_now(Duration::minutes(-1)))
            .build();
        assert!(matches!(past, Err(CapabilityError::InvalidPermission(_))));

        let zero = PermissionBuilder::new(OwnerId::new(), scope())
            .max_access_count(0)
            .build();
        assert!(matches!(zero, Err(CapabilityError::InvalidPermission(_))));
    }

    #[test]
    fn test_check_usable_order_expiry_first() {
        let mut p = PermissionBuilder::new(OwnerId::new(), scope())
            .max_access_count(1)
            .build()
            .unwrap();
        p.revoked = true;
        p.access_count = 1;
        p.expires_at = Some(Timestamp::from_now(Duration::seconds(-1)));

        assert!(matches!(
            p.check_usable(&Timestamp::now()),
            Err(CapabilityError::TokenExpired { .. })
        ));

        p.expires_at = None;
        assert!(matches!(
            p.check_usable(&Timestamp::now()),
            Err(CapabilityError::TokenRevoked { .. })
        ));

        p.revoked = false;
        assert!(matches!(
            p.check_usable(&Timestamp::now()),
            Err(CapabilityError::AccessLimitReached { max: 1, .. })
        ));
    }

    #[test]
    fn test_apply_access_stops_at_limit() {
        let mut p = PermissionBuilder::new(OwnerId::new(), scope())
            .max_access_count(2)
            .build()
            .unwrap();

        p.apply_access(Timestamp::now()).unwrap();
        p.apply_access(Timestamp::now()).unwrap();
        assert!(p.apply_access(Timestamp::now()).is_err());
        assert_eq!(p.access_count, 2);
        assert_eq!(p.remaining_accesses(), Some(0));
        assert!(p.last_accessed_at.is_some());
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let mut p = PermissionBuilder::new(OwnerId::new(), scope())
            .unlimited()
            .never_expires()
            .build()
            .unwrap();
        for _ in 0..100 {
            p.apply_access(Timestamp::now()).unwrap();
        }
        assert_eq!(p.remaining_accesses(), None);
    }

    #[test]
    fn test_check_carrier_and_service() {
        let p = PermissionBuilder::new(OwnerId::new(), scope()).build().unwrap();
        assert!(p.check_carrier(&CarrierId::new("usps").unwrap()).is_ok());
        assert!(matches!(
            p.check_carrier(&CarrierId::new("ups").unwrap()),
            Err(CapabilityError::CarrierNotAuthorized { .. })
        ));
        assert!(p.check_service("PRIORITY").is_ok());
        assert!(matches!(
            p.check_service("Ground"),
            Err(CapabilityError::ServiceNotAuthorized { .. })
        ));
    }

    #[test]
    fn test_permission_json_roundtrip_keeps_token() {
        let p = PermissionBuilder::new(OwnerId::new(), scope()).build().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, p);
    }
}
