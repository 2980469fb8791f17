//! A fully wired in-memory broker for end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use blindship_capabilities::{Permission, PermissionBuilder, ShippingScope};
use blindship_carriers::{
    Carrier, CarrierRegistry, DhlCarrier, FedexCarrier, StaticCredentialResolver, UpsCarrier,
    UspsCarrier,
};
use blindship_config::CorsSection;
use blindship_core::{OwnerId, PhysicalAddress};
use blindship_gateway::AppState;
use blindship_storage::MemoryKvStore;

use crate::fixtures::{test_address, test_carrier, test_credentials, test_owner};
use crate::mocks::FakeCarrier;

/// Base path the harness mounts the router under.
pub const TEST_BASE_PATH: &str = "/blind-shipping";

/// Builder for [`TestBroker`].
pub struct TestBrokerBuilder {
    registry: CarrierRegistry,
    credentials: StaticCredentialResolver,
    carrier_timeout: Duration,
}

impl TestBrokerBuilder {
    fn new() -> Self {
        Self {
            registry: CarrierRegistry::new(),
            credentials: StaticCredentialResolver::new(),
            carrier_timeout: Duration::from_secs(5),
        }
    }

    /// Register `carrier` with [`test_credentials`] for its id.
    #[must_use]
    pub fn with_carrier(mut self, carrier: Arc<dyn Carrier>) -> Self {
        let id = carrier.config().id.clone();
        self.credentials = self.credentials.with(id.clone(), test_credentials(id.as_str()));
        self.registry.register(carrier);
        self
    }

    /// Register a fake carrier. Keep a clone to inspect what it received.
    #[must_use]
    pub fn with_fake(self, fake: FakeCarrier) -> Self {
        self.with_carrier(Arc::new(fake))
    }

    /// Register all four sandbox adapters.
    #[must_use]
    pub fn with_sandbox_carriers(self) -> Self {
        self.with_carrier(Arc::new(UspsCarrier::new()))
            .with_carrier(Arc::new(FedexCarrier::new()))
            .with_carrier(Arc::new(UpsCarrier::new()))
            .with_carrier(Arc::new(DhlCarrier::new()))
    }

    /// Upper bound for one carrier call.
    #[must_use]
    pub fn carrier_timeout(mut self, timeout: Duration) -> Self {
        self.carrier_timeout = timeout;
        self
    }

    /// Wire the broker and record [`test_address`] for a fresh owner.
    ///
    /// # Panics
    ///
    /// Panics if the broker cannot be assembled.
    pub async fn build(self) -> TestBroker {
        let state = AppState::new(
            Arc::new(MemoryKvStore::new()),
            self.registry,
            Arc::new(self.credentials),
            self.carrier_timeout,
        )
        .expect("broker wiring");

        let owner = test_owner();
        let address = test_address();
        state
            .address_book
            .record(&owner, &address)
            .await
            .expect("record test address");

        TestBroker {
            state,
            owner,
            address,
        }
    }
}

/// An in-memory broker with one owner whose address is on file.
pub struct TestBroker {
    /// The wired components.
    pub state: AppState,
    /// The owner tokens are issued for.
    pub owner: OwnerId,
    /// The owner's recorded address.
    pub address: PhysicalAddress,
}

impl TestBroker {
    /// Start configuring a broker.
    #[must_use]
    pub fn builder() -> TestBrokerBuilder {
        TestBrokerBuilder::new()
    }

    /// A broker with the sandbox adapters registered.
    pub async fn sandbox() -> Self {
        Self::builder().with_sandbox_carriers().build().await
    }

    /// The HTTP router, mounted under [`TEST_BASE_PATH`].
    #[must_use]
    pub fn router(&self) -> Router {
        blindship_gateway::router(self.state.clone(), TEST_BASE_PATH, &CorsSection::default())
    }

    /// A builder for the harness owner with the given scope.
    ///
    /// # Panics
    ///
    /// Panics if the scope is invalid.
    #[must_use]
    pub fn permission(&self, carriers: &[&str], services: &[&str]) -> PermissionBuilder {
        let scope = ShippingScope::new(
            carriers.iter().copied().map(test_carrier),
            services.iter().copied(),
            false,
        )
        .expect("valid scope");
        PermissionBuilder::new(self.owner, scope).defaults(self.state.issuance)
    }

    /// Issue a permission built by [`TestBroker::permission`] or by hand.
    ///
    /// # Panics
    ///
    /// Panics if issuance fails.
    pub async fn issue(&self, builder: PermissionBuilder) -> Permission {
        self.state.resolver.issue(builder).await.expect("issue token")
    }

    /// Issue a default single-use token for `carriers` and `services`.
    pub async fn issue_token(&self, carriers: &[&str], services: &[&str]) -> String {
        self.issue(self.permission(carriers, services))
            .await
            .token
            .expose()
            .to_owned()
    }
}

/// Install a test tracing subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
