//! Authentication of inbound carrier requests.

use std::collections::HashSet;
use std::sync::Arc;

use blindship_core::CarrierId;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::carrier::Carrier;
use crate::credentials::{CarrierAuth, CredentialResolver};
use crate::error::{CarrierError, CarrierResult};
use crate::registry::CarrierRegistry;

/// A carrier that proved it holds the configured key.
#[derive(Clone)]
pub struct AuthenticatedCarrier {
    /// Carrier id.
    pub id: CarrierId,
    /// Its adapter.
    pub carrier: Arc<dyn Carrier>,
    /// The active credentials, for outbound calls on its behalf.
    pub auth: CarrierAuth,
}

impl std::fmt::Debug for AuthenticatedCarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedCarrier")
            .field("id", &self.id)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// Checks a presented `(carrier id, key)` pair.
///
/// Every failure surfaces as [`CarrierError::NotAuthorized`]; the precise
/// reason is only logged.
///
/// Production credentials are probed against the carrier on first use. A
/// successful probe is remembered for the life of the authenticator; a
/// failed one is retried on the next request.
pub struct CarrierAuthenticator {
    registry: Arc<CarrierRegistry>,
    credentials: Arc<dyn CredentialResolver>,
    probed: RwLock<HashSet<CarrierId>>,
}

impl std::fmt::Debug for CarrierAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierAuthenticator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl CarrierAuthenticator {
    /// Create an authenticator over `registry` and `credentials`.
    #[must_use]
    pub fn new(registry: Arc<CarrierRegistry>, credentials: Arc<dyn CredentialResolver>) -> Self {
        Self {
            registry,
            credentials,
            probed: RwLock::new(HashSet::new()),
        }
    }

    /// The registry adapters are looked up in.
    #[must_use]
    pub fn registry(&self) -> &Arc<CarrierRegistry> {
        &self.registry
    }

    /// Authenticate `carrier` presenting `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::NotAuthorized`] if the carrier is unknown, has
    /// no credentials, its credentials fail the adapter's shape check, the
    /// key does not match, or the carrier rejects its production credentials.
    pub async fn authenticate(&self, carrier: &str, key: &str) -> CarrierResult<AuthenticatedCarrier> {
        let denied = || CarrierError::NotAuthorized {
            carrier: carrier.to_owned(),
        };

        let id = CarrierId::new(carrier).map_err(|_| {
            warn!(carrier, "Carrier authentication failed: malformed carrier id");
            denied()
        })?;
        let adapter = self.registry.get(&id).map_err(|_| {
            warn!(carrier = %id, "Carrier authentication failed: no adapter");
            denied()
        })?;
        let Some(credentials) = self.credentials.resolve(&id).await else {
            warn!(carrier = %id, "Carrier authentication failed: no credentials configured");
            return Err(denied());
        };

        let auth = credentials.active().clone();
        if let Err(e) = adapter.validate_credentials(&auth) {
            warn!(carrier = %id, error = %e, "Carrier authentication failed: configured credentials invalid");
            return Err(denied());
        }

        if !bool::from(key.as_bytes().ct_eq(auth.api_key.as_bytes())) {
            warn!(carrier = %id, "Carrier authentication failed: key mismatch");
            return Err(denied());
        }

        if !credentials.use_test_mode && !self.probed.read().await.contains(&id) {
            let probe = adapter.probe_credentials(&auth).await;
            if let Err(e) = probe {
                warn!(carrier = %id, error = %e, "Carrier authentication failed: credential probe rejected");
                return Err(denied());
            }
            info!(carrier = %id, "Production credentials verified with carrier");
            self.probed.write().await.insert(id.clone());
        }

        Ok(AuthenticatedCarrier {
            id,
            carrier: adapter,
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CarrierCredentials, StaticCredentialResolver};

    fn authenticator() -> CarrierAuthenticator {
        let creds = StaticCredentialResolver::new()
            .with(
                CarrierId::new("usps").unwrap(),
                CarrierCredentials {
                    production: CarrierAuth::with_key("usps-live-key-123"),
                    test: CarrierAuth::with_key("usps-test-key-123"),
                    use_test_mode: true,
                },
            )
            .with(
                CarrierId::new("fedex").unwrap(),
                CarrierCredentials {
                    // Missing the account number FedEx requires.
                    test: CarrierAuth::with_key("fedex-test-key-123"),
                    use_test_mode: true,
                    ..CarrierCredentials::default()
                },
            );
        CarrierAuthenticator::new(Arc::new(CarrierRegistry::sandbox()), Arc::new(creds))
    }

    #[tokio::test]
    async fn test_authenticate_with_active_key() {
        let auth = authenticator();
        let ok = auth.authenticate("usps", "usps-test-key-123").await.unwrap();
        assert_eq!(ok.id.as_str(), "usps");
        assert_eq!(ok.carrier.config().name, "USPS");

        // The production key is not active in test mode.
        assert!(matches!(
            auth.authenticate("usps", "usps-live-key-123").await,
            Err(CarrierError::NotAuthorized { .. })
        ));
    }

    /// Carrier whose live probe can be told to fail, counting probes.
    struct ProbedCarrier {
        config: crate::types::CarrierConfig,
        accept: bool,
        probes: std::sync::atomic::AtomicUsize,
    }

    impl ProbedCarrier {
        fn new(accept: bool) -> Self {
            Self {
                config: crate::types::CarrierConfig {
                    id: CarrierId::new("acme").unwrap(),
                    name: "Acme".into(),
                    base_url: "http://localhost".into(),
                    services: vec!["Ground".into()],
                    package_types: vec!["Package".into()],
                },
                accept,
                probes: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn probes(&self) -> usize {
            self.probes.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Carrier for ProbedCarrier {
        fn config(&self) -> &crate::types::CarrierConfig {
            &self.config
        }

        fn validate_credentials(&self, _auth: &CarrierAuth) -> CarrierResult<()> {
            Ok(())
        }

        async fn probe_credentials(&self, _auth: &CarrierAuth) -> CarrierResult<()> {
            self.probes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if self.accept {
                Ok(())
            } else {
                Err(CarrierError::InvalidCredentials {
                    carrier: "acme".into(),
                    reason: "revoked by carrier".into(),
                })
            }
        }

        async fn create_shipment(
            &self,
            _address: &blindship_core::AddressFields,
            _request: &crate::types::ShipmentRequest,
            _auth: &CarrierAuth,
        ) -> CarrierResult<crate::types::ShipmentResult> {
            Err(CarrierError::InvalidRequest("not used".into()))
        }

        async fn track_shipment(
            &self,
            _tracking_number: &str,
            _auth: &CarrierAuth,
        ) -> CarrierResult<crate::types::TrackingState> {
            Err(CarrierError::InvalidRequest("not used".into()))
        }
    }

    fn probed_authenticator(carrier: Arc<ProbedCarrier>, use_test_mode: bool) -> CarrierAuthenticator {
        let mut registry = CarrierRegistry::new();
        registry.register(carrier);
        let creds = StaticCredentialResolver::new().with(
            CarrierId::new("acme").unwrap(),
            CarrierCredentials {
                production: CarrierAuth::with_key("acme-live-key"),
                test: CarrierAuth::with_key("acme-test-key"),
                use_test_mode,
            },
        );
        CarrierAuthenticator::new(Arc::new(registry), Arc::new(creds))
    }

    #[tokio::test]
    async fn test_production_credentials_probed_once() {
        let carrier = Arc::new(ProbedCarrier::new(true));
        let auth = probed_authenticator(Arc::clone(&carrier), false);

        auth.authenticate("acme", "acme-live-key").await.unwrap();
        auth.authenticate("acme", "acme-live-key").await.unwrap();
        assert_eq!(carrier.probes(), 1);

        // A wrong key is rejected before any probe.
        assert!(auth.authenticate("acme", "nope").await.is_err());
        assert_eq!(carrier.probes(), 1);
    }

    #[tokio::test]
    async fn test_rejected_probe_denies_carrier() {
        let carrier = Arc::new(ProbedCarrier::new(false));
        let auth = probed_authenticator(Arc::clone(&carrier), false);

        for _ in 0..2 {
            let err = auth.authenticate("acme", "acme-live-key").await.unwrap_err();
            assert!(matches!(err, CarrierError::NotAuthorized { .. }));
        }
        // Failures are not remembered.
        assert_eq!(carrier.probes(), 2);
    }

    #[tokio::test]
    async fn test_test_mode_skips_probe() {
        let carrier = Arc::new(ProbedCarrier::new(false));
        let auth = probed_authenticator(Arc::clone(&carrier), true);

        auth.authenticate("acme", "acme-test-key").await.unwrap();
        assert_eq!(carrier.probes(), 0);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_uniform() {
        let auth = authenticator();
        for (carrier, key) in [
            ("usps", "wrong"),
            ("usps", ""),
            ("dhl", "anything-at-all"),
            ("ontrac", "anything-at-all"),
            ("not a carrier!", "x"),
            ("fedex", "fedex-test-key-123"),
        ] {
            let err = auth.authenticate(carrier, key).await.unwrap_err();
            assert!(
                matches!(err, CarrierError::NotAuthorized { .. }),
                "{carrier}: {err}"
            );
        }
    }
}
