//! Carrier-pushed tracking updates.

use std::sync::Arc;

use blindship_carriers::CarrierAuthenticator;
use blindship_core::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ShipmentError, ShipmentResult};
use crate::model::{Shipment, ShipmentStatus};
use crate::store::{ShipmentStore, update_shipment};

/// A tracking update as a carrier pushes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    /// Tracking number issued at booking.
    pub tracking_number: String,
    /// Carrier status; normalized before it is applied.
    pub status: String,
    /// Free-form carrier payload.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Result of ingesting one update.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The shipment after the update.
    pub shipment: Shipment,
    /// `false` when the update repeated the current state.
    pub changed: bool,
}

/// Applies authenticated tracking pushes to stored shipments.
pub struct TrackingIngestor {
    authenticator: Arc<CarrierAuthenticator>,
    store: Arc<dyn ShipmentStore>,
}

impl std::fmt::Debug for TrackingIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingIngestor")
            .field("authenticator", &self.authenticator)
            .finish_non_exhaustive()
    }
}

impl TrackingIngestor {
    /// Create an ingestor.
    #[must_use]
    pub fn new(authenticator: Arc<CarrierAuthenticator>, store: Arc<dyn ShipmentStore>) -> Self {
        Self {
            authenticator,
            store,
        }
    }

    /// Authenticate `carrier` and apply `update` to the shipment it names.
    ///
    /// Replaying an update is harmless: nothing is recorded twice.
    ///
    /// # Errors
    ///
    /// Returns a carrier authentication error, [`ShipmentError::InvalidRequest`]
    /// for an unknown status, [`ShipmentError::TrackingNotFound`], or
    /// [`ShipmentError::InvalidTransition`] for a backwards move.
    pub async fn ingest(
        &self,
        carrier: &str,
        key: &str,
        update: TrackingUpdate,
    ) -> ShipmentResult<IngestOutcome> {
        let carrier = self.authenticator.authenticate(carrier, key).await?;

        let tracking_number = update.tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(ShipmentError::InvalidRequest(
                "tracking number is required".into(),
            ));
        }
        let status = ShipmentStatus::normalize(&update.status).ok_or_else(|| {
            ShipmentError::InvalidRequest(format!("unknown tracking status '{}'", update.status))
        })?;

        let shipment = self
            .store
            .find_by_tracking(&carrier.id, tracking_number)
            .await?
            .ok_or_else(|| ShipmentError::TrackingNotFound {
                carrier: carrier.id.to_string(),
                tracking_number: tracking_number.to_owned(),
            })?;

        let details = update.details.unwrap_or(serde_json::Value::Null);
        let (shipment, changed) = update_shipment(self.store.as_ref(), &shipment.id, |s| {
            s.apply_tracking(status, details.clone(), Timestamp::now())
        })
        .await
        .inspect_err(|e| {
            warn!(
                shipment_id = %shipment.id,
                carrier = %carrier.id,
                code = e.code(),
                error = %e,
                "Tracking update rejected"
            );
        })?;

        if changed {
            info!(
                shipment_id = %shipment.id,
                carrier = %carrier.id,
                status = %shipment.status,
                "Tracking update applied"
            );
        }
        Ok(IngestOutcome { shipment, changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfirmationStatus;
    use crate::store::KvShipmentStore;
    use blindship_carriers::{
        CarrierAuth, CarrierCredentials, CarrierError, CarrierRegistry, StaticCredentialResolver,
    };
    use blindship_core::{CarrierId, OwnerId, PermissionId};
    use blindship_storage::MemoryKvStore;
    use serde_json::json;

    const KEY: &str = "usps-sandbox-key";

    struct Fixture {
        ingestor: TrackingIngestor,
        store: Arc<KvShipmentStore>,
    }

    async fn fixture(requires_confirmation: bool) -> (Fixture, Shipment) {
        let creds = StaticCredentialResolver::new().with(
            CarrierId::usps(),
            CarrierCredentials {
                test: CarrierAuth::with_key(KEY),
                use_test_mode: true,
                ..CarrierCredentials::default()
            },
        );
        let authenticator = Arc::new(CarrierAuthenticator::new(
            Arc::new(CarrierRegistry::sandbox()),
            Arc::new(creds),
        ));
        let store = Arc::new(KvShipmentStore::new(Arc::new(MemoryKvStore::new())).unwrap());

        let mut shipment = Shipment::processing(
            PermissionId::new(),
            OwnerId::new(),
            CarrierId::usps(),
            "Priority",
            json!({}),
            requires_confirmation,
        );
        shipment.status = ShipmentStatus::LabelCreated;
        shipment.tracking_number = Some("9400100000000000000001".into());
        store.insert(&shipment).await.unwrap();

        (
            Fixture {
                ingestor: TrackingIngestor::new(authenticator, Arc::clone(&store) as _),
                store,
            },
            shipment,
        )
    }

    fn update(status: &str, details: serde_json::Value) -> TrackingUpdate {
        TrackingUpdate {
            tracking_number: "9400100000000000000001".into(),
            status: status.into(),
            details: Some(details),
        }
    }

    #[tokio::test]
    async fn test_ingest_applies_and_is_idempotent() {
        let (f, shipment) = fixture(false).await;

        let first = f
            .ingestor
            .ingest("usps", KEY, update("In Transit", json!({"location": "Memphis"})))
            .await
            .unwrap();
        assert!(first.changed);
        assert_eq!(first.shipment.status, ShipmentStatus::InTransit);
        assert_eq!(first.shipment.tracking_details["location"], "Memphis");

        let replay = f
            .ingestor
            .ingest("usps", KEY, update("in_transit", json!({"location": "Memphis"})))
            .await
            .unwrap();
        assert!(!replay.changed);

        let stored = f.store.get(&shipment.id).await.unwrap().unwrap();
        assert_eq!(stored.tracking_history.len(), 1);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_key_and_unknown_status() {
        let (f, _) = fixture(false).await;

        let err = f
            .ingestor
            .ingest("usps", "wrong-key-wrong", update("delivered", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShipmentError::Carrier(CarrierError::NotAuthorized { .. })
        ));

        let err = f
            .ingestor
            .ingest("usps", KEY, update("teleported", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ShipmentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_ingest_unknown_tracking_number() {
        let (f, _) = fixture(false).await;
        let mut u = update("delivered", json!({}));
        u.tracking_number = "9400999".into();
        assert!(matches!(
            f.ingestor.ingest("usps", KEY, u).await,
            Err(ShipmentError::TrackingNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_ingest_refuses_backwards_move() {
        let (f, _) = fixture(false).await;
        f.ingestor
            .ingest("usps", KEY, update("out_for_delivery", json!({})))
            .await
            .unwrap();
        let err = f
            .ingestor
            .ingest("usps", KEY, update("accepted", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_delivery_opens_confirmation() {
        let (f, _) = fixture(true).await;
        let outcome = f
            .ingestor
            .ingest("usps", KEY, update("delivered", json!({"signedBy": "J. Doe"})))
            .await
            .unwrap();
        assert!(outcome.shipment.confirmation_required);
        assert_eq!(
            outcome.shipment.confirmation_status,
            Some(ConfirmationStatus::Pending)
        );
    }
}
