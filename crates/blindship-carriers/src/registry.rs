//! Carrier registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use blindship_core::CarrierId;
use tracing::debug;

use crate::adapters::{DhlCarrier, FedexCarrier, UpsCarrier, UspsCarrier};
use crate::carrier::Carrier;
use crate::error::{CarrierError, CarrierResult};

/// Maps carrier ids to adapters. Built once at startup and shared.
#[derive(Clone, Default)]
pub struct CarrierRegistry {
    carriers: BTreeMap<CarrierId, Arc<dyn Carrier>>,
}

impl std::fmt::Debug for CarrierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierRegistry")
            .field("carriers", &self.carriers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CarrierRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All four sandbox adapters.
    #[must_use]
    pub fn sandbox() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UspsCarrier::new()));
        registry.register(Arc::new(FedexCarrier::new()));
        registry.register(Arc::new(UpsCarrier::new()));
        registry.register(Arc::new(DhlCarrier::new()));
        registry
    }

    /// Sandbox adapters restricted to `enabled`. Unknown ids are skipped.
    #[must_use]
    pub fn sandbox_only<'a>(enabled: impl IntoIterator<Item = &'a CarrierId>) -> Self {
        let all = Self::sandbox();
        let mut registry = Self::new();
        for id in enabled {
            if let Ok(carrier) = all.get(id) {
                registry.register(carrier);
            }
        }
        registry
    }

    /// Register an adapter under its own id, replacing any previous one.
    pub fn register(&mut self, carrier: Arc<dyn Carrier>) {
        let id = carrier.config().id.clone();
        debug!(carrier = %id, "Registered carrier adapter");
        self.carriers.insert(id, carrier);
    }

    /// The adapter for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::UnsupportedCarrier`] if none is registered.
    pub fn get(&self, id: &CarrierId) -> CarrierResult<Arc<dyn Carrier>> {
        self.carriers
            .get(id)
            .cloned()
            .ok_or_else(|| CarrierError::UnsupportedCarrier(id.to_string()))
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &CarrierId) -> bool {
        self.carriers.contains_key(id)
    }

    /// Registered carrier ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<CarrierId> {
        self.carriers.keys().cloned().collect()
    }

    /// Number of registered carriers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    /// Whether no carrier is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }
}
