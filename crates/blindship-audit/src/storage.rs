//! Access log storage trait and `KvStore`-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use blindship_core::PermissionId;
use blindship_storage::{KvStore, ScopedKvStore, kv::encode_json};
use tracing::debug;

use crate::entry::AccessLogEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for the access log.
#[async_trait]
pub trait AccessLogStore: Send + Sync {
    /// Append an entry. Never overwrites an existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted.
    async fn append(&self, entry: &AccessLogEntry) -> AuditResult<()>;

    /// All entries for a permission, oldest access first.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn entries_for(&self, permission_id: &PermissionId) -> AuditResult<Vec<AccessLogEntry>>;

    /// Number of entries recorded for a permission.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn count_for(&self, permission_id: &PermissionId) -> AuditResult<usize>;
}

// -- Namespace prefix; one namespace per permission --

const NS_ACCESS_PREFIX: &str = "audit:access";

/// Access log on top of any [`KvStore`].
pub struct KvAccessLogStore {
    store: Arc<dyn KvStore>,
}

impl KvAccessLogStore {
    /// Create an access log backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn scope(&self, permission_id: &PermissionId) -> AuditResult<ScopedKvStore> {
        let namespace = format!("{NS_ACCESS_PREFIX}:{}", permission_id.key());
        Ok(ScopedKvStore::new(Arc::clone(&self.store), namespace)?)
    }
}

impl std::fmt::Debug for KvAccessLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAccessLogStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl AccessLogStore for KvAccessLogStore {
    async fn append(&self, entry: &AccessLogEntry) -> AuditResult<()> {
        let scoped = self.scope(&entry.permission_id)?;
        let inserted = scoped
            .insert_new(&entry.storage_key(), encode_json(entry)?)
            .await?;
        if !inserted {
            return Err(AuditError::DuplicateEntry {
                entry_id: entry.id.to_string(),
            });
        }
        debug!(
            permission_id = %entry.permission_id,
            carrier = %entry.carrier,
            access_number = entry.access_number,
            "Recorded address disclosure"
        );
        Ok(())
    }

    async fn entries_for(&self, permission_id: &PermissionId) -> AuditResult<Vec<AccessLogEntry>> {
        let scoped = self.scope(permission_id)?;
        let mut entries = Vec::new();
        for key in scoped.list_keys().await? {
            if let Some(entry) = scoped.get_json::<AccessLogEntry>(&key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn count_for(&self, permission_id: &PermissionId) -> AuditResult<usize> {
        Ok(self.scope(permission_id)?.list_keys().await?.len())
    }
}
