//! Read-only view of owners' address history.
//!
//! The resolver only ever asks for the latest snapshot. Recording is exposed
//! for the owner-facing side of the broker and for tests.

use std::sync::Arc;

use async_trait::async_trait;
use blindship_core::{OwnerId, PhysicalAddress};
use blindship_storage::{KvStore, ScopedKvStore, kv::encode_json};
use tracing::debug;
use uuid::Uuid;

use crate::error::CapabilityResult;

/// Source of owners' physical addresses.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// The owner's most recently recorded address, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn latest(&self, owner_id: &OwnerId) -> CapabilityResult<Option<PhysicalAddress>>;

    /// Record a new address snapshot for the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn record(&self, owner_id: &OwnerId, address: &PhysicalAddress) -> CapabilityResult<()>;
}

const NS_ADDRESS_PREFIX: &str = "addresses";

/// [`AddressBook`] on top of any [`KvStore`].
///
/// Snapshots are keyed `{created_at micros:020}-{uuid}` within a per-owner
/// namespace, so the lexicographically greatest key is the newest.
pub struct KvAddressBook {
    store: Arc<dyn KvStore>,
}

impl KvAddressBook {
    /// Create an address book backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn scope(&self, owner_id: &OwnerId) -> CapabilityResult<ScopedKvStore> {
        let namespace = format!("{NS_ADDRESS_PREFIX}:{}", owner_id.key());
        Ok(ScopedKvStore::new(Arc::clone(&self.store), namespace)?)
    }
}

impl std::fmt::Debug for KvAddressBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAddressBook").finish_non_exhaustive()
    }
}

fn snapshot_key(address: &PhysicalAddress) -> String {
    // Pre-epoch timestamps clamp to zero.
    let micros = u64::try_from(address.created_at.into_inner().timestamp_micros()).unwrap_or(0);
    format!("{micros:020}-{}", Uuid::new_v4())
}

#[async_trait]
impl AddressBook for KvAddressBook {
    async fn latest(&self, owner_id: &OwnerId) -> CapabilityResult<Option<PhysicalAddress>> {
        let scoped = self.scope(owner_id)?;
        let Some(newest) = scoped.list_keys().await?.into_iter().max() else {
            return Ok(None);
        };
        Ok(scoped.get_json(&newest).await?)
    }

    async fn record(&self, owner_id: &OwnerId, address: &PhysicalAddress) -> CapabilityResult<()> {
        let scoped = self.scope(owner_id)?;
        scoped
            .insert_new(&snapshot_key(address), encode_json(address)?)
            .await?;
        debug!(owner_id = %owner_id, "Recorded address snapshot");
        Ok(())
    }
}
