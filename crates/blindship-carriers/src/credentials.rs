//! Carrier credentials and where they come from.

use std::collections::BTreeMap;

use async_trait::async_trait;
use blindship_core::CarrierId;

/// One set of carrier API credentials.
///
/// `Debug` reports which fields are present, never their values. The type is
/// deliberately not `Serialize`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CarrierAuth {
    /// API key; also the key a carrier presents to the broker.
    pub api_key: String,
    /// Account number (FedEx, DHL).
    pub account_number: Option<String>,
    /// Username (UPS).
    pub username: Option<String>,
    /// Password (UPS).
    pub password: Option<String>,
}

impl CarrierAuth {
    /// Credentials consisting of just an API key.
    #[must_use]
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set the account number.
    #[must_use]
    pub fn account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = Some(account_number.into());
        self
    }

    /// Set username and password.
    #[must_use]
    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl std::fmt::Debug for CarrierAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierAuth")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("has_account_number", &self.account_number.is_some())
            .field("has_username", &self.username.is_some())
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

/// Production and sandbox credentials for one carrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarrierCredentials {
    /// Live credentials.
    pub production: CarrierAuth,
    /// Sandbox credentials.
    pub test: CarrierAuth,
    /// Use `test` instead of `production`.
    pub use_test_mode: bool,
}

impl CarrierCredentials {
    /// The credentials currently in effect.
    #[must_use]
    pub fn active(&self) -> &CarrierAuth {
        if self.use_test_mode {
            &self.test
        } else {
            &self.production
        }
    }
}

/// Source of carrier credentials.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Credentials for `carrier`, if configured.
    async fn resolve(&self, carrier: &CarrierId) -> Option<CarrierCredentials>;
}

/// Credentials fixed at startup, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    credentials: BTreeMap<CarrierId, CarrierCredentials>,
}

impl StaticCredentialResolver {
    /// An empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace credentials for `carrier`.
    #[must_use]
    pub fn with(mut self, carrier: CarrierId, credentials: CarrierCredentials) -> Self {
        self.credentials.insert(carrier, credentials);
        self
    }

    /// Carriers with configured credentials.
    pub fn carriers(&self) -> impl Iterator<Item = &CarrierId> {
        self.credentials.keys()
    }
}

impl FromIterator<(CarrierId, CarrierCredentials)> for StaticCredentialResolver {
    fn from_iter<I: IntoIterator<Item = (CarrierId, CarrierCredentials)>>(iter: I) -> Self {
        Self {
            credentials: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, carrier: &CarrierId) -> Option<CarrierCredentials> {
        self.credentials.get(carrier).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = CarrierAuth::with_key("super-secret-key")
            .login("shipper", "hunter2")
            .account_number("ACC-1");
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("ACC-1"));
        assert!(debug.contains("has_api_key: true"));
    }

    #[test]
    fn test_active_credentials() {
        let creds = CarrierCredentials {
            production: CarrierAuth::with_key("live-key-0000"),
            test: CarrierAuth::with_key("test-key-0000"),
            use_test_mode: true,
        };
        assert_eq!(creds.active().api_key, "test-key-0000");

        let creds = CarrierCredentials {
            use_test_mode: false,
            ..creds
        };
        assert_eq!(creds.active().api_key, "live-key-0000");
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let usps = CarrierId::new("usps").unwrap();
        let resolver = StaticCredentialResolver::new().with(
            usps.clone(),
            CarrierCredentials {
                test: CarrierAuth::with_key("usps-test-key"),
                use_test_mode: true,
                ..CarrierCredentials::default()
            },
        );

        assert!(resolver.resolve(&usps).await.is_some());
        assert!(
            resolver
                .resolve(&CarrierId::new("dhl").unwrap())
                .await
                .is_none()
        );
    }
}
