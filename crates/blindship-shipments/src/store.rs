//! Shipment persistence.
//!
//! Records live in `shipments:records` keyed by shipment id; a unique index
//! in `shipments:tracking` maps `{carrier}:{tracking number}` to the id.
//! Every write is a compare-and-swap on the record's `version`.

use std::sync::Arc;

use async_trait::async_trait;
use blindship_core::{CarrierId, PermissionId, ShipmentId, Timestamp};
use blindship_storage::{KvStore, ScopedKvStore, StorageError};
use tracing::{debug, warn};

use crate::error::{ShipmentError, ShipmentResult};
use crate::model::Shipment;

const NS_RECORDS: &str = "shipments:records";
const NS_TRACKING: &str = "shipments:tracking";

/// Attempts before an update gives up on a contended shipment.
const MAX_UPDATE_ATTEMPTS: usize = 32;

/// Storage port for shipments.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Persist a new shipment.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or storage fails.
    async fn insert(&self, shipment: &Shipment) -> ShipmentResult<()>;

    /// Fetch by id.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn get(&self, id: &ShipmentId) -> ShipmentResult<Option<Shipment>>;

    /// Fetch by carrier and tracking number.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn find_by_tracking(
        &self,
        carrier: &CarrierId,
        tracking_number: &str,
    ) -> ShipmentResult<Option<Shipment>>;

    /// Replace the stored record if its version is still `expected_version`.
    ///
    /// Returns `false` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or storage fails.
    async fn replace(&self, expected_version: u64, shipment: &Shipment) -> ShipmentResult<bool>;

    /// Shipments booked with one permission, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    async fn list_for_permission(&self, permission_id: &PermissionId) -> ShipmentResult<Vec<Shipment>>;
}

/// Read, modify and write back one shipment, retrying lost races.
///
/// `modify` returns whether it changed anything; an unchanged shipment is
/// not written. Returns the resulting shipment and whether it was written.
///
/// # Errors
///
/// Returns [`ShipmentError::NotFound`], whatever `modify` returns, or
/// [`ShipmentError::Contention`] after repeated lost races.
pub async fn update_shipment<F>(
    store: &dyn ShipmentStore,
    id: &ShipmentId,
    mut modify: F,
) -> ShipmentResult<(Shipment, bool)>
where
    F: FnMut(&mut Shipment) -> ShipmentResult<bool> + Send,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let current = store
            .get(id)
            .await?
            .ok_or_else(|| ShipmentError::NotFound(id.to_string()))?;

        let mut next = current.clone();
        if !modify(&mut next)? {
            return Ok((current, false));
        }
        next.version = current.version.saturating_add(1);
        next.updated_at = Timestamp::now();

        if store.replace(current.version, &next).await? {
            return Ok((next, true));
        }
        debug!(shipment_id = %id, attempt, "shipment update lost race, retrying");
        tokio::task::yield_now().await;
    }

    warn!(shipment_id = %id, "shipment update abandoned after repeated contention");
    Err(ShipmentError::Contention(id.to_string()))
}

/// [`ShipmentStore`] on top of any [`KvStore`].
#[derive(Debug, Clone)]
pub struct KvShipmentStore {
    records: ScopedKvStore,
    tracking: ScopedKvStore,
}

impl KvShipmentStore {
    /// Create a shipment store backed by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespaces are rejected by the store.
    pub fn new(store: Arc<dyn KvStore>) -> ShipmentResult<Self> {
        Ok(Self {
            records: ScopedKvStore::new(Arc::clone(&store), NS_RECORDS)?,
            tracking: ScopedKvStore::new(store, NS_TRACKING)?,
        })
    }

    fn tracking_key(carrier: &CarrierId, tracking_number: &str) -> String {
        format!("{carrier}:{tracking_number}")
    }

    /// Claim the tracking index entry for `shipment`.
    ///
    /// Returns `true` if this call created the entry, `false` if the entry
    /// already pointed at this shipment (or there is no tracking number).
    async fn claim_tracking(&self, shipment: &Shipment) -> ShipmentResult<bool> {
        let Some(tracking_number) = &shipment.tracking_number else {
            return Ok(false);
        };
        let key = Self::tracking_key(&shipment.carrier, tracking_number);
        let id = shipment.id.key();
        if self.tracking.insert_new(&key, id.clone().into_bytes()).await? {
            return Ok(true);
        }
        if self.tracking.get(&key).await?.as_deref() == Some(id.as_bytes()) {
            return Ok(false);
        }
        Err(ShipmentError::TrackingConflict {
            carrier: shipment.carrier.to_string(),
            tracking_number: tracking_number.clone(),
        })
    }

    /// Undo a claim made by [`Self::claim_tracking`] whose record write lost.
    async fn release_tracking(&self, shipment: &Shipment) {
        let Some(tracking_number) = &shipment.tracking_number else {
            return;
        };
        let key = Self::tracking_key(&shipment.carrier, tracking_number);
        if let Err(e) = self.tracking.delete(&key).await {
            warn!(
                shipment_id = %shipment.id,
                tracking_number = %tracking_number,
                error = %e,
                "Failed to release tracking index entry"
            );
        }
    }
}

#[async_trait]
impl ShipmentStore for KvShipmentStore {
    async fn insert(&self, shipment: &Shipment) -> ShipmentResult<()> {
        let claimed = self.claim_tracking(shipment).await?;
        let inserted = self
            .records
            .compare_and_swap_json(&shipment.id.key(), None, shipment)
            .await;
        if !matches!(inserted, Ok(true)) {
            if claimed {
                self.release_tracking(shipment).await;
            }
            inserted?;
            return Err(ShipmentError::StorageError(format!(
                "{} already exists",
                shipment.id
            )));
        }
        debug!(
            shipment_id = %shipment.id,
            permission_id = %shipment.permission_id,
            carrier = %shipment.carrier,
            status = %shipment.status,
            "Stored shipment"
        );
        Ok(())
    }

    async fn get(&self, id: &ShipmentId) -> ShipmentResult<Option<Shipment>> {
        Ok(self.records.get_json(&id.key()).await?)
    }

    async fn find_by_tracking(
        &self,
        carrier: &CarrierId,
        tracking_number: &str,
    ) -> ShipmentResult<Option<Shipment>> {
        if tracking_number.is_empty() {
            return Ok(None);
        }
        let key = Self::tracking_key(carrier, tracking_number);
        let Some(raw_id) = self.tracking.get(&key).await? else {
            return Ok(None);
        };
        let id: ShipmentId = std::str::from_utf8(&raw_id)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ShipmentError::StorageError(format!("corrupt tracking index entry {key}"))
            })?;
        self.get(&id).await
    }

    async fn replace(&self, expected_version: u64, shipment: &Shipment) -> ShipmentResult<bool> {
        let key = shipment.id.key();
        let Some((stored, raw)) = self.records.get_json_with_raw::<Shipment>(&key).await? else {
            return Err(ShipmentError::NotFound(shipment.id.to_string()));
        };
        if stored.version != expected_version {
            return Ok(false);
        }

        // The index entry is claimed first so a committed record always
        // has one.
        let claimed = if stored.tracking_number == shipment.tracking_number {
            false
        } else {
            self.claim_tracking(shipment).await?
        };

        let swapped = self
            .records
            .compare_and_swap_json(&key, Some(&raw), shipment)
            .await;
        if !matches!(swapped, Ok(true)) && claimed {
            self.release_tracking(shipment).await;
        }
        match swapped {
            Ok(true) => Ok(true),
            Ok(false) | Err(StorageError::Conflict(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_for_permission(&self, permission_id: &PermissionId) -> ShipmentResult<Vec<Shipment>> {
        let mut found = Vec::new();
        for key in self.records.list_keys().await? {
            if let Some(s) = self.records.get_json::<Shipment>(&key).await?
                && s.permission_id == *permission_id
            {
                found.push(s);
            }
        }
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShipmentStatus;
    use blindship_core::OwnerId;
    use blindship_storage::MemoryKvStore;
    use serde_json::json;

    fn store() -> KvShipmentStore {
        KvShipmentStore::new(Arc::new(MemoryKvStore::new())).unwrap()
    }

    fn shipment(permission_id: PermissionId) -> Shipment {
        Shipment::processing(
            permission_id,
            OwnerId::new(),
            CarrierId::ups(),
            "Ground",
            json!({}),
            false,
        )
    }

    #[tokio::test]
    async fn test_insert_get_and_tracking_lookup() {
        let store = store();
        let s = shipment(PermissionId::new());
        store.insert(&s).await.unwrap();
        assert_eq!(store.get(&s.id).await.unwrap().unwrap(), s);

        let (updated, written) = update_shipment(&store, &s.id, |s| {
            s.tracking_number = Some("1ZTEST0001".into());
            s.status = ShipmentStatus::LabelCreated;
            Ok(true)
        })
        .await
        .unwrap();
        assert!(written);
        assert_eq!(updated.version, 1);

        let found = store
            .find_by_tracking(&CarrierId::ups(), "1ZTEST0001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, s.id);
        // The index is per carrier.
        assert!(
            store
                .find_by_tracking(&CarrierId::dhl(), "1ZTEST0001")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_replace_rejects_stale_version() {
        let store = store();
        let s = shipment(PermissionId::new());
        store.insert(&s).await.unwrap();

        let mut a = s.clone();
        a.version = 1;
        a.service = "Next Day Air".into();
        assert!(store.replace(0, &a).await.unwrap());

        let mut b = s.clone();
        b.version = 1;
        assert!(!store.replace(0, &b).await.unwrap());
        assert_eq!(store.get(&s.id).await.unwrap().unwrap().service, "Next Day Air");
    }

    #[tokio::test]
    async fn test_unchanged_update_is_not_written() {
        let store = store();
        let s = shipment(PermissionId::new());
        store.insert(&s).await.unwrap();

        let (same, written) = update_shipment(&store, &s.id, |_| Ok(false)).await.unwrap();
        assert!(!written);
        assert_eq!(same, s);
        assert_eq!(store.get(&s.id).await.unwrap().unwrap().version, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_serialize() {
        let store = Arc::new(store());
        let s = shipment(PermissionId::new());
        store.insert(&s).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let id = s.id;
            handles.push(tokio::spawn(async move {
                update_shipment(store.as_ref(), &id, |s| {
                    s.tracking_history.push(crate::model::TrackingRecord {
                        status: ShipmentStatus::Processing,
                        details: json!({ "writer": i }),
                        recorded_at: Timestamp::now(),
                    });
                    Ok(true)
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let final_state = store.get(&s.id).await.unwrap().unwrap();
        assert_eq!(final_state.version, 16);
        assert_eq!(final_state.tracking_history.len(), 16);
    }

    #[tokio::test]
    async fn test_reused_tracking_number_leaves_record_untouched() {
        let store = store();
        let first = shipment(PermissionId::new());
        let second = shipment(PermissionId::new());
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();

        let label = |s: &mut Shipment| -> ShipmentResult<bool> {
            s.tracking_number = Some("1ZREUSED".into());
            s.status = ShipmentStatus::LabelCreated;
            Ok(true)
        };
        update_shipment(&store, &first.id, label).await.unwrap();
        let err = update_shipment(&store, &second.id, label).await.unwrap_err();
        assert!(matches!(err, ShipmentError::TrackingConflict { .. }));
        assert_eq!(err.code(), "carrier_error");

        let unchanged = store.get(&second.id).await.unwrap().unwrap();
        assert_eq!(unchanged, second);
        let indexed = store
            .find_by_tracking(&CarrierId::ups(), "1ZREUSED")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(indexed.id, first.id);
    }

    #[tokio::test]
    async fn test_lost_swap_releases_tracking_claim() {
        let store = store();
        let s = shipment(PermissionId::new());
        store.insert(&s).await.unwrap();

        // Another writer commits between our read and our swap.
        let (stored, raw) = store
            .records
            .get_json_with_raw::<Shipment>(&s.id.key())
            .await
            .unwrap()
            .unwrap();
        let mut other = stored.clone();
        other.version = 1;
        other.service = "Next Day Air".into();
        assert!(store.replace(0, &other).await.unwrap());

        let mut ours = stored;
        ours.version = 1;
        ours.tracking_number = Some("1ZLOST".into());
        assert!(store.claim_tracking(&ours).await.unwrap());
        let swapped = store
            .records
            .compare_and_swap_json(&s.id.key(), Some(&raw), &ours)
            .await
            .unwrap();
        assert!(!swapped);
        store.release_tracking(&ours).await;

        assert!(
            store
                .find_by_tracking(&CarrierId::ups(), "1ZLOST")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_list_for_permission() {
        let store = store();
        let permission = PermissionId::new();
        store.insert(&shipment(permission)).await.unwrap();
        store.insert(&shipment(permission)).await.unwrap();
        store.insert(&shipment(PermissionId::new())).await.unwrap();

        assert_eq!(store.list_for_permission(&permission).await.unwrap().len(), 2);
    }
}
