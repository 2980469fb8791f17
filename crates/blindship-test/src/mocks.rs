//! Fake carriers for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blindship_carriers::{
    Carrier, CarrierAuth, CarrierConfig, CarrierError, CarrierResult, Money, ShipmentRequest,
    ShipmentResult, TrackingEvent, TrackingState,
};
use blindship_core::{AddressFields, CarrierId, Timestamp};

/// How a [`FakeCarrier`] answers `create_shipment`.
#[derive(Debug, Clone)]
enum Behavior {
    Book,
    Decline(String),
    Fail(String),
    Hang(Duration),
}

/// Scriptable in-memory carrier.
///
/// Books every shipment by default, minting `FAKE000001`, `FAKE000002`, ...
/// Every address it receives is recorded so tests can check exactly what
/// was disclosed.
#[derive(Debug, Clone)]
pub struct FakeCarrier {
    config: CarrierConfig,
    behavior: Behavior,
    tracking_status: String,
    booked: Arc<AtomicUsize>,
    addresses: Arc<Mutex<Vec<AddressFields>>>,
}

impl FakeCarrier {
    /// A carrier with id `id` offering `Ground` and `Express` for `Package`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid carrier id.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            config: CarrierConfig {
                id: CarrierId::new(id).expect("valid carrier id"),
                name: format!("Fake {id}"),
                base_url: "http://fake.invalid".into(),
                services: vec!["Ground".into(), "Express".into()],
                package_types: vec!["Package".into()],
            },
            behavior: Behavior::Book,
            tracking_status: "in_transit".into(),
            booked: Arc::new(AtomicUsize::new(0)),
            addresses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Decline every booking (a 4xx-style carrier answer).
    #[must_use]
    pub fn declining(mut self, reason: impl Into<String>) -> Self {
        self.behavior = Behavior::Decline(reason.into());
        self
    }

    /// Fail every booking with a backend error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Take `delay` before answering any booking.
    #[must_use]
    pub fn slow(mut self, delay: Duration) -> Self {
        self.behavior = Behavior::Hang(delay);
        self
    }

    /// Status reported by `track_shipment`.
    #[must_use]
    pub fn with_tracking_status(mut self, status: impl Into<String>) -> Self {
        self.tracking_status = status.into();
        self
    }

    /// Number of shipments booked so far.
    #[must_use]
    pub fn booked(&self) -> usize {
        self.booked.load(Ordering::SeqCst)
    }

    /// Addresses received, in call order.
    #[must_use]
    pub fn received_addresses(&self) -> Vec<AddressFields> {
        self.addresses
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn id(&self) -> String {
        self.config.id.to_string()
    }
}

#[async_trait]
impl Carrier for FakeCarrier {
    fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn validate_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()> {
        if auth.api_key.is_empty() {
            return Err(CarrierError::InvalidCredentials {
                carrier: self.id(),
                reason: "api key is required".into(),
            });
        }
        Ok(())
    }

    async fn create_shipment(
        &self,
        address: &AddressFields,
        request: &ShipmentRequest,
        auth: &CarrierAuth,
    ) -> CarrierResult<ShipmentResult> {
        self.validate_credentials(auth)?;
        if let Ok(mut guard) = self.addresses.lock() {
            guard.push(address.clone());
        }

        match &self.behavior {
            Behavior::Book => {},
            Behavior::Decline(reason) => {
                return Err(CarrierError::Declined {
                    carrier: self.id(),
                    reason: reason.clone(),
                });
            },
            Behavior::Fail(message) => {
                return Err(CarrierError::Backend {
                    carrier: self.id(),
                    message: message.clone(),
                });
            },
            Behavior::Hang(delay) => tokio::time::sleep(*delay).await,
        }

        let n = self.booked.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        let tracking_number = format!("FAKE{n:06}");
        Ok(ShipmentResult {
            label_url: format!("https://labels.fake.invalid/{tracking_number}.pdf"),
            estimated_delivery: Timestamp::from_now(chrono::Duration::days(2)),
            cost: Money::usd(999),
            carrier_details: serde_json::json!({ "service": request.service, "fake": true }),
            tracking_number,
        })
    }

    async fn track_shipment(
        &self,
        tracking_number: &str,
        auth: &CarrierAuth,
    ) -> CarrierResult<TrackingState> {
        self.validate_credentials(auth)?;
        if !tracking_number.starts_with("FAKE") {
            return Err(CarrierError::Declined {
                carrier: self.id(),
                reason: "unknown tracking number".into(),
            });
        }
        Ok(TrackingState {
            tracking_number: tracking_number.to_owned(),
            status: self.tracking_status.clone(),
            estimated_delivery: None,
            history: vec![
                TrackingEvent {
                    status: "label_created".into(),
                    location: Some("Origin".into()),
                    timestamp: hours_ago(6),
                },
                TrackingEvent {
                    status: self.tracking_status.clone(),
                    location: Some("Hub".into()),
                    timestamp: hours_ago(1),
                },
            ],
        })
    }
}

fn hours_ago(hours: i64) -> Timestamp {
    Timestamp::from_now(chrono::Duration::hours(hours.saturating_neg()))
}
