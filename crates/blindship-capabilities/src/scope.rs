//! The typed, versioned scope of a shipping token.

use std::collections::BTreeSet;

use blindship_core::CarrierId;
use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilityResult};

/// What a shipping token allows.
///
/// Validated once at construction; stored with a `version` tag so the
/// persisted shape can evolve without re-parsing loosely typed JSON at
/// resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VersionedScope", try_from = "VersionedScope")]
pub struct ShippingScope {
    allowed_carriers: BTreeSet<CarrierId>,
    allowed_services: BTreeSet<String>,
    require_delivery_confirmation: bool,
}

impl ShippingScope {
    /// Build a scope.
    ///
    /// Service names are trimmed; matching later is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidPermission`] if no carrier or no
    /// service is given, or a service name is blank.
    pub fn new(
        carriers: impl IntoIterator<Item = CarrierId>,
        services: impl IntoIterator<Item = impl Into<String>>,
        require_delivery_confirmation: bool,
    ) -> CapabilityResult<Self> {
        let allowed_carriers: BTreeSet<CarrierId> = carriers.into_iter().collect();
        let mut allowed_services = BTreeSet::new();
        for service in services {
            let service = service.into().trim().to_owned();
            if service.is_empty() {
                return Err(CapabilityError::InvalidPermission(
                    "service names must not be blank".into(),
                ));
            }
            allowed_services.insert(service);
        }

        let scope = Self {
            allowed_carriers,
            allowed_services,
            require_delivery_confirmation,
        };
        scope.validate()?;
        Ok(scope)
    }

    fn validate(&self) -> CapabilityResult<()> {
        if self.allowed_carriers.is_empty() {
            return Err(CapabilityError::InvalidPermission(
                "scope must allow at least one carrier".into(),
            ));
        }
        if self.allowed_services.is_empty() {
            return Err(CapabilityError::InvalidPermission(
                "scope must allow at least one service".into(),
            ));
        }
        Ok(())
    }

    /// Whether `carrier` may redeem the token.
    #[must_use]
    pub fn allows_carrier(&self, carrier: &CarrierId) -> bool {
        self.allowed_carriers.contains(carrier)
    }

    /// Whether `service` may be booked (case-insensitive).
    #[must_use]
    pub fn allows_service(&self, service: &str) -> bool {
        let service = service.trim();
        self.allowed_services
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service))
    }

    /// Allowed carriers.
    #[must_use]
    pub fn allowed_carriers(&self) -> &BTreeSet<CarrierId> {
        &self.allowed_carriers
    }

    /// Allowed services.
    #[must_use]
    pub fn allowed_services(&self) -> &BTreeSet<String> {
        &self.allowed_services
    }

    /// Whether delivered shipments need the owner's confirmation.
    #[must_use]
    pub fn require_delivery_confirmation(&self) -> bool {
        self.require_delivery_confirmation
    }
}

/// Persisted representation, tagged by `version`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "version", rename_all = "lowercase")]
enum VersionedScope {
    V1 {
        allowed_carriers: BTreeSet<CarrierId>,
        allowed_services: BTreeSet<String>,
        #[serde(default)]
        require_delivery_confirmation: bool,
    },
}

impl From<ShippingScope> for VersionedScope {
    fn from(scope: ShippingScope) -> Self {
        Self::V1 {
            allowed_carriers: scope.allowed_carriers,
            allowed_services: scope.allowed_services,
            require_delivery_confirmation: scope.require_delivery_confirmation,
        }
    }
}

impl TryFrom<VersionedScope> for ShippingScope {
    type Error = CapabilityError;

    fn try_from(value: VersionedScope) -> Result<Self, Self::Error> {
        match value {
            VersionedScope::V1 {
                allowed_carriers,
                allowed_services,
                require_delivery_confirmation,
            } => {
                let scope = Self {
                    allowed_carriers,
                    allowed_services,
                    require_delivery_confirmation,
                };
                scope.validate()?;
                Ok(scope)
            },
        }
    }
}
