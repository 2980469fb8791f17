//! Permission storage.
//!
//! Records live in `caps:permissions` keyed by permission id; a unique index
//! in `caps:token_index` maps each token to its permission. The access counter
//! is only ever advanced through [`PermissionStore::record_access`], a
//! compare-and-swap loop over the stored record.

use std::sync::Arc;

use async_trait::async_trait;
use blindship_core::{OwnerId, PermissionId, Timestamp};
use blindship_storage::{KvStore, ScopedKvStore, StorageError};
use tracing::{debug, warn};

use crate::error::{CapabilityError, CapabilityResult};
use crate::permission::Permission;
use crate::token::ShippingToken;

// -- Namespace constants --

const NS_PERMISSIONS: &str = "caps:permissions";
const NS_TOKEN_INDEX: &str = "caps:token_index";

/// Compare-and-swap attempts before giving up on a contended record.
const MAX_CAS_ATTEMPTS: usize = 64;

/// Storage port for permission records.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Persist a newly issued permission.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::DuplicateToken`] if the token is already
    /// bound to another permission.
    async fn insert(&self, permission: &Permission) -> CapabilityResult<()>;

    /// Fetch a permission by id.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn get(&self, id: &PermissionId) -> CapabilityResult<Option<Permission>>;

    /// Fetch the permission backing `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn find_by_token(&self, token: &ShippingToken) -> CapabilityResult<Option<Permission>>;

    /// Atomically count one access.
    ///
    /// Re-checks expiry, revocation and the limit against the current record
    /// inside the atomic step, so concurrent callers can never push the
    /// counter past `max_access_count`. Returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns the usability error if the record no longer allows access,
    /// [`CapabilityError::TokenNotFound`] if it vanished, or a storage error.
    async fn record_access(&self, id: &PermissionId, now: Timestamp) -> CapabilityResult<Permission>;

    /// Revoke the permission backing `token`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::TokenNotFound`] for an unknown token.
    async fn revoke(&self, token: &ShippingToken) -> CapabilityResult<Permission>;

    /// All permissions issued by `owner_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn list_for_owner(&self, owner_id: &OwnerId) -> CapabilityResult<Vec<Permission>>;
}

/// [`PermissionStore`] on top of any [`KvStore`].
#[derive(Debug, Clone)]
pub struct KvPermissionStore {
    permissions: ScopedKvStore,
    token_index: ScopedKvStore,
}

impl KvPermissionStore {
    /// Create a permission store backed by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespaces are rejected by the store.
    pub fn new(store: Arc<dyn KvStore>) -> CapabilityResult<Self> {
        Ok(Self {
            permissions: ScopedKvStore::new(Arc::clone(&store), NS_PERMISSIONS)?,
            token_index: ScopedKvStore::new(store, NS_TOKEN_INDEX)?,
        })
    }

    /// Run a compare-and-swap update on one record.
    ///
    /// `update` mutates the freshly read record or returns an error that
    /// aborts the loop. Lost races and backend conflicts retry.
    async fn update<F>(&self, id: &PermissionId, mut update: F) -> CapabilityResult<Permission>
    where
        F: FnMut(&mut Permission) -> CapabilityResult<()> + Send,
    {
        let key = id.key();
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some((mut record, raw)) = self
                .permissions
                .get_json_with_raw::<Permission>(&key)
                .await?
            else {
                return Err(CapabilityError::TokenNotFound);
            };

            update(&mut record)?;

            match self
                .permissions
                .compare_and_swap_json(&key, Some(&raw), &record)
                .await
            {
                Ok(true) => return Ok(record),
                Ok(false) | Err(StorageError::Conflict(_)) => {
                    debug!(permission_id = %id, attempt, "permission update lost race, retrying");
                    tokio::task::yield_now().await;
                },
                Err(e) => return Err(e.into()),
            }
        }

        warn!(permission_id = %id, "permission update abandoned after repeated contention");
        Err(CapabilityError::StorageError(format!(
            "too much contention updating {id}"
        )))
    }
}

#[async_trait]
impl PermissionStore for KvPermissionStore {
    async fn insert(&self, permission: &Permission) -> CapabilityResult<()> {
        let key = permission.id.key();
        if !self
            .permissions
            .compare_and_swap_json(&key, None, permission)
            .await?
        {
            return Err(CapabilityError::InvalidPermission(format!(
                "{} already exists",
                permission.id
            )));
        }

        let indexed = self
            .token_index
            .insert_new(permission.token.expose(), key.clone().into_bytes())
            .await?;
        if !indexed {
            // Roll back the orphaned record.
            self.permissions.delete(&key).await?;
            return Err(CapabilityError::DuplicateToken);
        }

        debug!(
            permission_id = %permission.id,
            owner_id = %permission.owner_id,
            token = %permission.token,
            "Stored shipping permission"
        );
        Ok(())
    }

    async fn get(&self, id: &PermissionId) -> CapabilityResult<Option<Permission>> {
        Ok(self.permissions.get_json(&id.key()).await?)
    }

    async fn find_by_token(&self, token: &ShippingToken) -> CapabilityResult<Option<Permission>> {
        let Some(raw_id) = self.token_index.get(token.expose()).await? else {
            return Ok(None);
        };
        let id: PermissionId = std::str::from_utf8(&raw_id)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                CapabilityError::StorageError(format!("corrupt token index entry for {token}"))
            })?;
        self.get(&id).await
    }

    async fn record_access(&self, id: &PermissionId, now: Timestamp) -> CapabilityResult<Permission> {
        self.update(id, |record| record.apply_access(now)).await
    }

    async fn revoke(&self, token: &ShippingToken) -> CapabilityResult<Permission> {
        let permission = self
            .find_by_token(token)
            .await?
            .ok_or(CapabilityError::TokenNotFound)?;
        if permission.revoked {
            return Ok(permission);
        }

        let now = Timestamp::now();
        let revoked = self
            .update(&permission.id, |record| {
                if !record.revoked {
                    record.revoked = true;
                    record.revoked_at = Some(now);
                }
                Ok(())
            })
            .await?;
        debug!(permission_id = %revoked.id, "Revoked shipping permission");
        Ok(revoked)
    }

    async fn list_for_owner(&self, owner_id: &OwnerId) -> CapabilityResult<Vec<Permission>> {
        let mut found = Vec::new();
        for key in self.permissions.list_keys().await? {
            if let Some(p) = self.permissions.get_json::<Permission>(&key).await?
                && p.owner_id == *owner_id
            {
                found.push(p);
            }
        }
        found.sort_by_key(|p| p.issued_at);
        Ok(found)
    }
}
