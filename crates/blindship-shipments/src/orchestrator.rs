//! Shipment orchestration: token to label.

use std::sync::Arc;
use std::time::Duration;

use blindship_capabilities::AddressResolver;
use blindship_carriers::{AuthenticatedCarrier, CarrierError, Money, ShipmentRequest, TrackingEvent};
use blindship_core::{CarrierId, PermissionId, ShipmentId, Timestamp};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ShipmentError, ShipmentResult};
use crate::model::{Shipment, ShipmentStatus};
use crate::store::{ShipmentStore, update_shipment};

/// Uniform outcome of a booking, whatever the carrier.
#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    /// Whether the carrier issued a label.
    pub success: bool,
    /// The broker's shipment id; present even for failed bookings.
    pub shipment_id: ShipmentId,
    /// Carrier tracking number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    /// Label download location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_url: Option<String>,
    /// Delivery estimate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<Timestamp>,
    /// Quoted cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Money>,
    /// Carrier id.
    pub carrier: CarrierId,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The typed carrier failure behind `error`.
    #[serde(skip)]
    pub carrier_error: Option<CarrierError>,
}

/// Tracking as presented to a carrier or app.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    /// Tracking number.
    pub tracking_number: String,
    /// Broker status after applying the carrier's report.
    pub status: ShipmentStatus,
    /// Latest delivery estimate.
    pub estimated_delivery: Option<Timestamp>,
    /// Carrier scans, newest first.
    pub tracking_history: Vec<TrackingEvent>,
}

/// Books shipments and keeps them in step with the carrier.
pub struct ShipmentOrchestrator {
    resolver: Arc<AddressResolver>,
    store: Arc<dyn ShipmentStore>,
    carrier_timeout: Duration,
}

impl std::fmt::Debug for ShipmentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentOrchestrator")
            .field("carrier_timeout", &self.carrier_timeout)
            .finish_non_exhaustive()
    }
}

impl ShipmentOrchestrator {
    /// Create an orchestrator. Carrier calls are cut off after
    /// `carrier_timeout`.
    #[must_use]
    pub fn new(
        resolver: Arc<AddressResolver>,
        store: Arc<dyn ShipmentStore>,
        carrier_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            store,
            carrier_timeout,
        }
    }

    /// The shipment store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ShipmentStore> {
        &self.store
    }

    /// Book a shipment for `token` with an authenticated carrier.
    ///
    /// The request is checked against the carrier's catalogue, the token is
    /// resolved (consuming one access), the shipment is stored as
    /// `processing`, and only then is the carrier called. The shipment ends
    /// `label_created` or `failed`; a carrier failure is reported in the
    /// response, not as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported request, a failed resolution, or a
    /// storage failure.
    pub async fn create_shipment(
        &self,
        carrier: &AuthenticatedCarrier,
        token: &str,
        request: ShipmentRequest,
    ) -> ShipmentResult<ShipmentResponse> {
        request.validate()?;
        carrier.carrier.config().check_request(&request)?;

        let resolution = self
            .resolver
            .resolve_for_service(token, &carrier.id, &request.service)
            .await?;

        let package_details = serde_json::to_value(&request)
            .map_err(|e| ShipmentError::SerializationError(e.to_string()))?;
        let shipment = Shipment::processing(
            resolution.permission_id,
            resolution.owner_id,
            carrier.id.clone(),
            request.service.clone(),
            package_details,
            resolution.requires_confirmation,
        );
        self.store.insert(&shipment).await?;

        let booked = match tokio::time::timeout(
            self.carrier_timeout,
            carrier
                .carrier
                .create_shipment(&resolution.address, &request, &carrier.auth),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CarrierError::Timeout {
                carrier: carrier.id.to_string(),
                secs: self.carrier_timeout.as_secs(),
            }),
        };

        let carrier_error = match booked {
            Ok(booking) => {
                let recorded = update_shipment(self.store.as_ref(), &shipment.id, |s| {
                    s.mark_label_created(&booking)?;
                    Ok(true)
                })
                .await;
                match recorded {
                    Ok((saved, _)) => {
                        info!(
                            shipment_id = %saved.id,
                            permission_id = %saved.permission_id,
                            carrier = %carrier.id,
                            service = %saved.service,
                            "Shipment label created"
                        );
                        return Ok(ShipmentResponse {
                            success: true,
                            shipment_id: saved.id,
                            tracking_number: saved.tracking_number,
                            label_url: saved.label_url,
                            estimated_delivery: saved.estimated_delivery,
                            cost: saved.cost,
                            carrier: carrier.id.clone(),
                            error: None,
                            carrier_error: None,
                        });
                    },
                    Err(conflict @ ShipmentError::TrackingConflict { .. }) => {
                        error!(
                            shipment_id = %shipment.id,
                            carrier = %carrier.id,
                            tracking_number = %booking.tracking_number,
                            "Carrier reused a tracking number held by another shipment"
                        );
                        CarrierError::Backend {
                            carrier: carrier.id.to_string(),
                            message: conflict.to_string(),
                        }
                    },
                    Err(e) => {
                        error!(
                            shipment_id = %shipment.id,
                            carrier = %carrier.id,
                            tracking_number = %booking.tracking_number,
                            error = %e,
                            "Carrier booked a label the broker could not record"
                        );
                        return Err(e);
                    },
                }
            },
            Err(e) => e,
        };

        let message = carrier_error.to_string();
        update_shipment(self.store.as_ref(), &shipment.id, |s| {
            s.mark_failed(&message)?;
            Ok(true)
        })
        .await?;
        warn!(
            shipment_id = %shipment.id,
            permission_id = %shipment.permission_id,
            carrier = %carrier.id,
            code = carrier_error.code(),
            error = %carrier_error,
            "Shipment booking failed"
        );
        Ok(ShipmentResponse {
            success: false,
            shipment_id: shipment.id,
            tracking_number: None,
            label_url: None,
            estimated_delivery: None,
            cost: None,
            carrier: carrier.id.clone(),
            error: Some(message),
            carrier_error: Some(carrier_error),
        })
    }

    /// Pull tracking from the carrier and apply it to the stored shipment.
    ///
    /// A report that would move the shipment backwards is not applied; the
    /// stored status is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::TrackingNotFound`] if the broker never booked
    /// this tracking number with this carrier, or the carrier's failure.
    pub async fn track(
        &self,
        carrier: &AuthenticatedCarrier,
        tracking_number: &str,
    ) -> ShipmentResult<TrackingView> {
        let shipment = self
            .store
            .find_by_tracking(&carrier.id, tracking_number)
            .await?
            .ok_or_else(|| ShipmentError::TrackingNotFound {
                carrier: carrier.id.to_string(),
                tracking_number: tracking_number.to_owned(),
            })?;

        let state = tokio::time::timeout(
            self.carrier_timeout,
            carrier.carrier.track_shipment(tracking_number, &carrier.auth),
        )
        .await
        .map_err(|_| CarrierError::Timeout {
            carrier: carrier.id.to_string(),
            secs: self.carrier_timeout.as_secs(),
        })??;

        let newest_first = state.newest_first();
        let mut status = shipment.status;
        if let Some(reported) = ShipmentStatus::normalize(&state.status) {
            let details = serde_json::json!({
                "source": "carrier_pull",
                "carrier_status": state.status,
                "location": newest_first.first().and_then(|e| e.location.clone()),
            });
            let estimated = state.estimated_delivery;
            let outcome = update_shipment(self.store.as_ref(), &shipment.id, |s| {
                let changed = s.apply_tracking(reported, details.clone(), Timestamp::now())?;
                if changed && estimated.is_some() {
                    s.estimated_delivery = estimated;
                }
                Ok(changed)
            })
            .await;
            match outcome {
                Ok((saved, _)) => status = saved.status,
                Err(ShipmentError::InvalidTransition { from, to }) => {
                    debug!(
                        shipment_id = %shipment.id,
                        %from,
                        %to,
                        "Ignoring stale carrier tracking report"
                    );
                },
                Err(e) => return Err(e),
            }
        } else {
            warn!(
                shipment_id = %shipment.id,
                carrier = %carrier.id,
                carrier_status = %state.status,
                "Carrier reported an unknown status"
            );
        }

        Ok(TrackingView {
            tracking_number: state.tracking_number,
            status,
            estimated_delivery: state.estimated_delivery,
            tracking_history: newest_first,
        })
    }

    /// Cancel a shipment that has not started moving. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`] or
    /// [`ShipmentError::InvalidTransition`].
    pub async fn cancel(&self, id: &ShipmentId) -> ShipmentResult<Shipment> {
        let (shipment, changed) = update_shipment(self.store.as_ref(), id, Shipment::cancel).await?;
        if changed {
            info!(shipment_id = %id, carrier = %shipment.carrier, "Shipment cancelled");
        }
        Ok(shipment)
    }

    /// Record the owner's confirmation of a delivery. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`] or
    /// [`ShipmentError::ConfirmationNotPending`].
    pub async fn confirm_delivery(&self, id: &ShipmentId) -> ShipmentResult<Shipment> {
        let (shipment, changed) =
            update_shipment(self.store.as_ref(), id, Shipment::confirm_delivery).await?;
        if changed {
            info!(shipment_id = %id, "Delivery confirmed by owner");
        }
        Ok(shipment)
    }

    /// A shipment by id.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::NotFound`].
    pub async fn get(&self, id: &ShipmentId) -> ShipmentResult<Shipment> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ShipmentError::NotFound(id.to_string()))
    }

    /// Shipments booked with one permission, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn shipments_for_permission(
        &self,
        permission_id: &PermissionId,
    ) -> ShipmentResult<Vec<Shipment>> {
        self.store.list_for_permission(permission_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvShipmentStore;
    use async_trait::async_trait;
    use blindship_audit::KvAccessLogStore;
    use blindship_capabilities::{
        AddressBook, CapabilityError, KvAddressBook, KvPermissionStore, PermissionBuilder,
        ShippingScope,
    };
    use blindship_carriers::{
        Carrier, CarrierAuth, CarrierConfig, CarrierResult, TrackingState, UpsCarrier,
    };
    use blindship_core::{AddressFields, OwnerId, PhysicalAddress};
    use blindship_storage::{KvStore, MemoryKvStore};

    /// A carrier that never answers in time, always fails, or always
    /// hands out the same tracking number.
    struct BrokenCarrier {
        config: CarrierConfig,
        hang: bool,
        fixed_tracking: Option<&'static str>,
    }

    impl BrokenCarrier {
        fn new(hang: bool) -> Self {
            Self {
                config: CarrierConfig {
                    id: CarrierId::dhl(),
                    name: "Broken".into(),
                    base_url: "http://localhost".into(),
                    services: vec!["Express".into()],
                    package_types: vec!["Package".into()],
                },
                hang,
                fixed_tracking: None,
            }
        }

        fn reusing(tracking_number: &'static str) -> Self {
            Self {
                fixed_tracking: Some(tracking_number),
                ..Self::new(false)
            }
        }
    }

    #[async_trait]
    impl Carrier for BrokenCarrier {
        fn config(&self) -> &CarrierConfig {
            &self.config
        }

        fn validate_credentials(&self, _auth: &CarrierAuth) -> CarrierResult<()> {
            Ok(())
        }

        async fn create_shipment(
            &self,
            _address: &AddressFields,
            _request: &ShipmentRequest,
            _auth: &CarrierAuth,
        ) -> CarrierResult<blindship_carriers::ShipmentResult> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if let Some(tracking_number) = self.fixed_tracking {
                return Ok(blindship_carriers::ShipmentResult {
                    tracking_number: tracking_number.to_owned(),
                    label_url: format!("http://localhost/{tracking_number}.pdf"),
                    estimated_delivery: Timestamp::now(),
                    cost: Money::usd(1200),
                    carrier_details: serde_json::json!({}),
                });
            }
            Err(CarrierError::Backend {
                carrier: "dhl".into(),
                message: "upstream 503".into(),
            })
        }

        async fn track_shipment(
            &self,
            _tracking_number: &str,
            _auth: &CarrierAuth,
        ) -> CarrierResult<TrackingState> {
            Err(CarrierError::Backend {
                carrier: "dhl".into(),
                message: "upstream 503".into(),
            })
        }
    }

    struct Fixture {
        orchestrator: ShipmentOrchestrator,
        resolver: Arc<AddressResolver>,
        owner: OwnerId,
    }

    async fn fixture(timeout: Duration) -> Fixture {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let book = Arc::new(KvAddressBook::new(Arc::clone(&kv)));
        let resolver = Arc::new(AddressResolver::new(
            Arc::new(KvPermissionStore::new(Arc::clone(&kv)).unwrap()),
            Arc::clone(&book) as Arc<dyn AddressBook>,
            Arc::new(KvAccessLogStore::new(Arc::clone(&kv))),
        ));
        let owner = OwnerId::new();
        book.record(
            &owner,
            &PhysicalAddress::new("123 Main St", "Anytown", "CA", "90210", "US"),
        )
        .await
        .unwrap();
        let store = Arc::new(KvShipmentStore::new(kv).unwrap());
        Fixture {
            orchestrator: ShipmentOrchestrator::new(Arc::clone(&resolver), store, timeout),
            resolver,
            owner,
        }
    }

    async fn token(f: &Fixture, carriers: &[CarrierId], max: u32, confirm: bool) -> String {
        let scope = ShippingScope::new(
            carriers.to_vec(),
            ["Ground", "Express", "Warp"],
            confirm,
        )
        .unwrap();
        let permission = f
            .resolver
            .issue(PermissionBuilder::new(f.owner, scope).max_access_count(max))
            .await
            .unwrap();
        permission.token.expose().to_owned()
    }

    fn ups() -> AuthenticatedCarrier {
        AuthenticatedCarrier {
            id: CarrierId::ups(),
            carrier: Arc::new(UpsCarrier::new()),
            auth: CarrierAuth::with_key("ups-sandbox-key").login("shipper", "secret"),
        }
    }

    fn broken(hang: bool) -> AuthenticatedCarrier {
        dhl(BrokenCarrier::new(hang))
    }

    fn dhl(carrier: BrokenCarrier) -> AuthenticatedCarrier {
        AuthenticatedCarrier {
            id: CarrierId::dhl(),
            carrier: Arc::new(carrier),
            auth: CarrierAuth::default(),
        }
    }

    #[tokio::test]
    async fn test_create_shipment_books_label() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::ups()], 5, false).await;

        let response = f
            .orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Ground", "Package"))
            .await
            .unwrap();
        assert!(response.success);
        let tracking = response.tracking_number.clone().unwrap();
        assert!(tracking.starts_with("1Z"));

        let stored = f.orchestrator.get(&response.shipment_id).await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::LabelCreated);
        assert_eq!(stored.tracking_number.as_deref(), Some(tracking.as_str()));
        assert_eq!(stored.package_details["service"], "Ground");

        // The response never carries the address.
        let body = serde_json::to_string(&response).unwrap();
        assert!(!body.contains("Main St"));
        assert!(!body.contains("90210"));

        let shipments = f
            .orchestrator
            .shipments_for_permission(&stored.permission_id)
            .await
            .unwrap();
        assert_eq!(shipments.len(), 1);
    }

    #[tokio::test]
    async fn test_carrier_failure_marks_failed() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::dhl()], 5, false).await;

        let response = f
            .orchestrator
            .create_shipment(&broken(false), &token, ShipmentRequest::new("Express", "Package"))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.error.as_deref().unwrap().contains("upstream 503"));
        assert!(matches!(
            response.carrier_error,
            Some(CarrierError::Backend { .. })
        ));

        let stored = f.orchestrator.get(&response.shipment_id).await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::Failed);
        assert!(stored.carrier_details["error"].is_string());
    }

    #[tokio::test]
    async fn test_carrier_timeout_marks_failed() {
        let f = fixture(Duration::from_millis(20)).await;
        let token = token(&f, &[CarrierId::dhl()], 5, false).await;

        let response = f
            .orchestrator
            .create_shipment(&broken(true), &token, ShipmentRequest::new("Express", "Package"))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(matches!(
            response.carrier_error,
            Some(CarrierError::Timeout { .. })
        ));
        let stored = f.orchestrator.get(&response.shipment_id).await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::Failed);
    }

    #[tokio::test]
    async fn test_reused_tracking_number_marks_failed() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::dhl()], 5, false).await;
        let carrier = dhl(BrokenCarrier::reusing("DHL0000000001"));

        let first = f
            .orchestrator
            .create_shipment(&carrier, &token, ShipmentRequest::new("Express", "Package"))
            .await
            .unwrap();
        assert!(first.success);

        let second = f
            .orchestrator
            .create_shipment(&carrier, &token, ShipmentRequest::new("Express", "Package"))
            .await
            .unwrap();
        assert!(!second.success);
        assert!(matches!(
            second.carrier_error,
            Some(CarrierError::Backend { .. })
        ));

        let stored = f.orchestrator.get(&second.shipment_id).await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::Failed);
        assert!(stored.tracking_number.is_none());
        assert!(
            stored.carrier_details["error"]
                .as_str()
                .unwrap()
                .contains("DHL0000000001")
        );

        // The tracking number still leads to the first shipment.
        let found = f
            .orchestrator
            .store()
            .find_by_tracking(&CarrierId::dhl(), "DHL0000000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.shipment_id);
    }

    #[tokio::test]
    async fn test_unsupported_service_consumes_nothing() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::ups()], 1, false).await;

        let err = f
            .orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Warp", "Package"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShipmentError::Carrier(CarrierError::UnsupportedService { .. })
        ));

        // The single access is still available.
        f.orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Ground", "Package"))
            .await
            .unwrap();
        let err = f
            .orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Ground", "Package"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShipmentError::Capability(CapabilityError::AccessLimitReached { .. })
        ));
        assert_eq!(err.code(), "access_limit_reached");
    }

    #[tokio::test]
    async fn test_track_applies_carrier_status() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::ups()], 5, false).await;
        let response = f
            .orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Ground", "Package"))
            .await
            .unwrap();
        let tracking = response.tracking_number.unwrap();

        let view = f.orchestrator.track(&ups(), &tracking).await.unwrap();
        assert_eq!(view.status, ShipmentStatus::InTransit);
        assert!(view.tracking_history.len() >= 2);
        assert!(view.tracking_history[0].timestamp >= view.tracking_history[1].timestamp);

        // Pulling again records nothing new.
        f.orchestrator.track(&ups(), &tracking).await.unwrap();
        let stored = f.orchestrator.get(&response.shipment_id).await.unwrap();
        assert_eq!(stored.status, ShipmentStatus::InTransit);
        assert_eq!(stored.tracking_history.len(), 1);
    }

    #[tokio::test]
    async fn test_track_unknown_number() {
        let f = fixture(Duration::from_secs(5)).await;
        let err = f.orchestrator.track(&ups(), "1ZNOTOURS").await.unwrap_err();
        assert!(matches!(err, ShipmentError::TrackingNotFound { .. }));
        assert_eq!(err.code(), "shipment_not_found");
    }

    #[tokio::test]
    async fn test_cancel_and_confirm() {
        let f = fixture(Duration::from_secs(5)).await;
        let token = token(&f, &[CarrierId::ups()], 5, true).await;
        let response = f
            .orchestrator
            .create_shipment(&ups(), &token, ShipmentRequest::new("Ground", "Package"))
            .await
            .unwrap();

        assert!(matches!(
            f.orchestrator.confirm_delivery(&response.shipment_id).await,
            Err(ShipmentError::ConfirmationNotPending(_))
        ));

        let cancelled = f.orchestrator.cancel(&response.shipment_id).await.unwrap();
        assert_eq!(cancelled.status, ShipmentStatus::Cancelled);
        let again = f.orchestrator.cancel(&response.shipment_id).await.unwrap();
        assert_eq!(again.version, cancelled.version);

        assert!(matches!(
            f.orchestrator.get(&ShipmentId::new()).await,
            Err(ShipmentError::NotFound(_))
        ));
    }
}
