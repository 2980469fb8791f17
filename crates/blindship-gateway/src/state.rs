//! The assembled broker shared by all request handlers.

use std::sync::Arc;
use std::time::Duration;

use blindship_audit::KvAccessLogStore;
use blindship_capabilities::{
    AddressBook, AddressResolver, IssuanceDefaults, KvAddressBook, KvPermissionStore,
};
use blindship_carriers::{CarrierAuthenticator, CarrierRegistry, CredentialResolver};
use blindship_config::BrokerConfig;
use blindship_shipments::{KvShipmentStore, ShipmentOrchestrator, ShipmentStore, TrackingIngestor};
use blindship_storage::KvStore;

use crate::config_bridge;
use crate::error::GatewayResult;

/// Every broker component, wired over one key-value store.
///
/// Cheap to clone; handed to axum as router state.
#[derive(Clone)]
pub struct AppState {
    /// Token issuance and address resolution.
    pub resolver: Arc<AddressResolver>,
    /// Owner address snapshots.
    pub address_book: Arc<dyn AddressBook>,
    /// Inbound carrier authentication.
    pub authenticator: Arc<CarrierAuthenticator>,
    /// Booking and tracking pulls.
    pub orchestrator: Arc<ShipmentOrchestrator>,
    /// Carrier tracking pushes.
    pub ingestor: Arc<TrackingIngestor>,
    /// Defaults for newly issued tokens.
    pub issuance: IssuanceDefaults,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("authenticator", &self.authenticator)
            .field("issuance", &self.issuance)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the broker over `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a component rejects its storage namespace.
    pub fn new(
        store: Arc<dyn KvStore>,
        registry: CarrierRegistry,
        credentials: Arc<dyn CredentialResolver>,
        carrier_timeout: Duration,
    ) -> GatewayResult<Self> {
        let address_book: Arc<dyn AddressBook> = Arc::new(KvAddressBook::new(Arc::clone(&store)));
        let permissions = KvPermissionStore::new(Arc::clone(&store))?;
        let resolver = Arc::new(AddressResolver::new(
            Arc::new(permissions),
            Arc::clone(&address_book),
            Arc::new(KvAccessLogStore::new(Arc::clone(&store))),
        ));
        let shipments: Arc<dyn ShipmentStore> = Arc::new(KvShipmentStore::new(store)?);
        let authenticator = Arc::new(CarrierAuthenticator::new(Arc::new(registry), credentials));

        Ok(Self {
            orchestrator: Arc::new(ShipmentOrchestrator::new(
                Arc::clone(&resolver),
                Arc::clone(&shipments),
                carrier_timeout,
            )),
            ingestor: Arc::new(TrackingIngestor::new(Arc::clone(&authenticator), shipments)),
            resolver,
            address_book,
            authenticator,
            issuance: IssuanceDefaults::default(),
        })
    }

    /// Override the issuance defaults.
    #[must_use]
    pub fn with_issuance_defaults(mut self, defaults: IssuanceDefaults) -> Self {
        self.issuance = defaults;
        self
    }

    /// Build the broker described by `config`, opening its storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be opened or the carrier sections
    /// are malformed.
    pub fn from_config(config: &BrokerConfig) -> GatewayResult<Self> {
        let store = config_bridge::open_store(&config.storage)?;
        Self::from_config_with_store(config, store)
    }

    /// Build the broker described by `config` over an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the carrier sections are malformed.
    pub fn from_config_with_store(
        config: &BrokerConfig,
        store: Arc<dyn KvStore>,
    ) -> GatewayResult<Self> {
        let registry = config_bridge::to_registry(config)?;
        let credentials = Arc::new(config_bridge::to_credential_resolver(config)?);
        let state = Self::new(
            store,
            registry,
            credentials,
            Duration::from_secs(config.timeouts.carrier_secs),
        )?;
        Ok(state.with_issuance_defaults(config_bridge::to_issuance_defaults(&config.tokens)))
    }
}

