//! UPS sandbox adapter.

use async_trait::async_trait;
use blindship_core::{AddressFields, CarrierId};
use serde::Serialize;
use tracing::debug;

use super::sandbox;
use crate::carrier::Carrier;
use crate::credentials::CarrierAuth;
use crate::error::CarrierResult;
use crate::types::{CarrierConfig, ShipmentRequest, ShipmentResult, TrackingState};

const BASE_RATE_CENTS: u64 = 1550;
const PER_LB_CENTS: u64 = 225;
const DELIVERY_DAYS: i64 = 3;
const TRACKING_PREFIX: &str = "1Z";

/// UPS Shipping API request, reduced to coded fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ShipmentRequestBody<'a> {
    service_code: &'static str,
    packaging_code: &'static str,
    ship_to_state: &'a str,
    ship_to_country: &'a str,
    description: Option<&'a str>,
}

/// United Parcel Service.
#[derive(Debug)]
pub struct UpsCarrier {
    config: CarrierConfig,
}

impl Default for UpsCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl UpsCarrier {
    /// Create the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CarrierConfig {
                id: CarrierId::ups(),
                name: "UPS".into(),
                base_url: "https://onlinetools.ups.com/api".into(),
                services: ["Ground", "Next Day Air", "2nd Day Air", "3 Day Select"]
                    .map(String::from)
                    .to_vec(),
                package_types: ["Package", "Box", "Envelope", "Tube", "Pak"]
                    .map(String::from)
                    .to_vec(),
            },
        }
    }
}

fn service_code(service: &str) -> &'static str {
    match service.to_ascii_lowercase().as_str() {
        "next day air" => "01",
        "2nd day air" => "02",
        "3 day select" => "12",
        _ => "03",
    }
}

fn packaging_code(package_type: &str) -> &'static str {
    match package_type.to_ascii_lowercase().as_str() {
        "envelope" => "01",
        "tube" => "03",
        "pak" => "04",
        "box" => "21",
        _ => "02",
    }
}

#[async_trait]
impl Carrier for UpsCarrier {
    fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn validate_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()> {
        sandbox::require_api_key(&self.config.id, auth)?;
        sandbox::require_field(&self.config.id, auth.username.as_ref(), "username")?;
        sandbox::require_field(&self.config.id, auth.password.as_ref(), "password")
    }

    async fn create_shipment(
        &self,
        address: &AddressFields,
        request: &ShipmentRequest,
        auth: &CarrierAuth,
    ) -> CarrierResult<ShipmentResult> {
        self.validate_credentials(auth)?;
        self.config.check_request(request)?;

        let body = ShipmentRequestBody {
            service_code: service_code(&request.service),
            packaging_code: packaging_code(&request.package_type),
            ship_to_state: &address.state,
            ship_to_country: &address.country,
            description: request.description.as_deref(),
        };
        debug!(
            carrier = "ups",
            service_code = body.service_code,
            packaging_code = body.packaging_code,
            "Sandbox shipment request"
        );

        let tracking_number = sandbox::mint_alphanumeric(TRACKING_PREFIX, 9);
        let cost = sandbox::quote(BASE_RATE_CENTS, PER_LB_CENTS, request.weight.as_ref());
        Ok(ShipmentResult {
            label_url: sandbox::label_url(&self.config.id, &tracking_number),
            estimated_delivery: sandbox::days_from_now(DELIVERY_DAYS),
            carrier_details: serde_json::json!({
                "mode": "sandbox",
                "Service": {"Code": body.service_code},
                "Packaging": {"Code": body.packaging_code},
                "Description": body.description,
                "Domestic": body.ship_to_country.eq_ignore_ascii_case("US")
                    && !body.ship_to_state.is_empty(),
                "TotalCharges": {"MonetaryValue": cost.amount(), "CurrencyCode": cost.currency},
            }),
            tracking_number,
            cost,
        })
    }

    async fn track_shipment(
        &self,
        tracking_number: &str,
        auth: &CarrierAuth,
    ) -> CarrierResult<TrackingState> {
        self.validate_credentials(auth)?;
        if !tracking_number.starts_with(TRACKING_PREFIX) {
            return Err(sandbox::unknown_tracking_number(&self.config.id));
        }
        Ok(TrackingState {
            tracking_number: tracking_number.to_owned(),
            status: "in_transit".into(),
            estimated_delivery: Some(sandbox::days_from_now(3)),
            history: vec![
                sandbox::scan("information_received", "SHIPPER LOCATION, CA", 36),
                sandbox::scan("in_transit", "UPS FACILITY, SUNNYVALE, CA", 12),
            ],
        })
    }
}
