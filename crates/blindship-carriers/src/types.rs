//! Carrier-neutral request and response types.

use blindship_core::{CarrierId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{CarrierError, CarrierResult};

/// Static description of a carrier adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierConfig {
    /// Carrier id.
    pub id: CarrierId,
    /// Display name.
    pub name: String,
    /// API endpoint the adapter talks to.
    pub base_url: String,
    /// Services the carrier offers.
    pub services: Vec<String>,
    /// Package types the carrier accepts.
    pub package_types: Vec<String>,
}

impl CarrierConfig {
    /// Whether `service` is offered (case-insensitive).
    #[must_use]
    pub fn supports_service(&self, service: &str) -> bool {
        self.services
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service.trim()))
    }

    /// Whether `package_type` is accepted (case-insensitive).
    #[must_use]
    pub fn supports_package_type(&self, package_type: &str) -> bool {
        self.package_types
            .iter()
            .any(|p| p.eq_ignore_ascii_case(package_type.trim()))
    }

    /// Check a request against this carrier's catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::UnsupportedService`] or
    /// [`CarrierError::UnsupportedPackageType`].
    pub fn check_request(&self, request: &ShipmentRequest) -> CarrierResult<()> {
        if !self.supports_service(&request.service) {
            return Err(CarrierError::UnsupportedService {
                carrier: self.id.to_string(),
                service: request.service.clone(),
            });
        }
        if !self.supports_package_type(&request.package_type) {
            return Err(CarrierError::UnsupportedPackageType {
                carrier: self.id.to_string(),
                package_type: request.package_type.clone(),
            });
        }
        Ok(())
    }
}

/// Weight units accepted in shipment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    /// Ounces.
    Oz,
    /// Pounds.
    Lb,
    /// Grams.
    G,
    /// Kilograms.
    Kg,
}

/// Package weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    /// Magnitude.
    pub value: f64,
    /// Unit.
    pub unit: WeightUnit,
}

impl Weight {
    /// The weight in pounds.
    #[must_use]
    pub fn pounds(&self) -> f64 {
        match self.unit {
            WeightUnit::Lb => self.value,
            WeightUnit::Oz => self.value / 16.0,
            WeightUnit::G => self.value / 453.592_37,
            WeightUnit::Kg => self.value / 0.453_592_37,
        }
    }

    /// Whole pounds billed for this weight: rounded up, at least one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn billable_pounds(&self) -> u64 {
        let pounds = self.pounds().ceil();
        if pounds.is_finite() && pounds >= 1.0 {
            pounds as u64
        } else {
            1
        }
    }
}

/// Dimension units accepted in shipment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionUnit {
    /// Inches.
    In,
    /// Centimetres.
    Cm,
}

/// Package dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Length.
    pub length: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Unit.
    pub unit: DimensionUnit,
}

/// What the app asks the carrier to ship. Never contains the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    /// Carrier service, e.g. `Priority`.
    pub service: String,
    /// Package type, e.g. `Flat Rate Box`.
    #[serde(alias = "package_type")]
    pub package_type: String,
    /// Package weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Weight>,
    /// Package dimensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Caller reference printed on the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Contents description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ShipmentRequest {
    /// Create a request for `service` and `package_type`.
    #[must_use]
    pub fn new(service: impl Into<String>, package_type: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            package_type: package_type.into(),
            weight: None,
            dimensions: None,
            reference: None,
            description: None,
        }
    }

    /// Set the weight.
    #[must_use]
    pub fn with_weight(mut self, value: f64, unit: WeightUnit) -> Self {
        self.weight = Some(Weight { value, unit });
        self
    }

    /// Set the caller reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Basic sanity checks independent of any carrier.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::InvalidRequest`] for blank fields or
    /// non-positive measurements.
    pub fn validate(&self) -> CarrierResult<()> {
        if self.service.trim().is_empty() {
            return Err(CarrierError::InvalidRequest("service is required".into()));
        }
        if self.package_type.trim().is_empty() {
            return Err(CarrierError::InvalidRequest(
                "packageType is required".into(),
            ));
        }
        if let Some(w) = &self.weight
            && !(w.value.is_finite() && w.value > 0.0)
        {
            return Err(CarrierError::InvalidRequest(
                "weight must be positive".into(),
            ));
        }
        if let Some(d) = &self.dimensions
            && ![d.length, d.width, d.height]
                .iter()
                .all(|v| v.is_finite() && *v > 0.0)
        {
            return Err(CarrierError::InvalidRequest(
                "dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// An amount of money in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Money {
    /// Amount in cents.
    pub amount_cents: u64,
    /// ISO currency code.
    pub currency: String,
}

impl Money {
    /// US dollars.
    #[must_use]
    pub fn usd(amount_cents: u64) -> Self {
        Self {
            amount_cents,
            currency: "USD".into(),
        }
    }

    /// The amount in major units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

impl Serialize for Money {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Money", 3)?;
        s.serialize_field("amount", &self.amount())?;
        s.serialize_field("amount_cents", &self.amount_cents)?;
        s.serialize_field("currency", &self.currency)?;
        s.end()
    }
}

/// A booked shipment as returned by the carrier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentResult {
    /// Carrier tracking number.
    pub tracking_number: String,
    /// Where the label can be downloaded.
    pub label_url: String,
    /// Carrier's delivery estimate.
    pub estimated_delivery: Timestamp,
    /// Quoted cost.
    pub cost: Money,
    /// Raw carrier response, stored opaquely.
    pub carrier_details: serde_json::Value,
}

/// One tracking scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Carrier status string, un-normalized.
    pub status: String,
    /// Scan location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Scan time.
    pub timestamp: Timestamp,
}

/// Tracking snapshot pulled from a carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingState {
    /// Tracking number.
    pub tracking_number: String,
    /// Current carrier status string, un-normalized.
    pub status: String,
    /// Latest delivery estimate.
    pub estimated_delivery: Option<Timestamp>,
    /// Scans, oldest first.
    pub history: Vec<TrackingEvent>,
}

impl TrackingState {
    /// Scans, newest first, for presentation.
    #[must_use]
    pub fn newest_first(&self) -> Vec<TrackingEvent> {
        self.history.iter().rev().cloned().collect()
    }
}
