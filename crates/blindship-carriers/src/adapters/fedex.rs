//! FedEx sandbox adapter.

use async_trait::async_trait;
use blindship_core::{AddressFields, CarrierId};
use serde::Serialize;
use tracing::debug;

use super::sandbox;
use crate::carrier::Carrier;
use crate::credentials::CarrierAuth;
use crate::error::CarrierResult;
use crate::types::{CarrierConfig, ShipmentRequest, ShipmentResult, TrackingState};

const BASE_RATE_CENTS: u64 = 1275;
const PER_LB_CENTS: u64 = 200;
const DELIVERY_DAYS: i64 = 2;
const TRACKING_PREFIX: &str = "7891";

/// Body of a FedEx Ship API request, minus the recipient block.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShipRequest<'a> {
    account_number: &'a str,
    service_type: &'static str,
    packaging_type: &'static str,
    recipient_country_code: &'a str,
    total_weight_lb: Option<f64>,
    customer_reference: Option<&'a str>,
}

/// FedEx.
#[derive(Debug)]
pub struct FedexCarrier {
    config: CarrierConfig,
}

impl Default for FedexCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl FedexCarrier {
    /// Create the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CarrierConfig {
                id: CarrierId::fedex(),
                name: "FedEx".into(),
                base_url: "https://apis.fedex.com".into(),
                services: ["Ground", "2Day", "Express", "Overnight"]
                    .map(String::from)
                    .to_vec(),
                package_types: ["Package", "Box", "Envelope", "Pak", "Tube"]
                    .map(String::from)
                    .to_vec(),
            },
        }
    }
}

fn service_type(service: &str) -> &'static str {
    match service.to_ascii_lowercase().as_str() {
        "2day" => "FEDEX_2_DAY",
        "express" => "FEDEX_EXPRESS_SAVER",
        "overnight" => "PRIORITY_OVERNIGHT",
        _ => "FEDEX_GROUND",
    }
}

fn packaging_type(package_type: &str) -> &'static str {
    match package_type.to_ascii_lowercase().as_str() {
        "box" => "FEDEX_BOX",
        "envelope" => "FEDEX_ENVELOPE",
        "pak" => "FEDEX_PAK",
        "tube" => "FEDEX_TUBE",
        _ => "YOUR_PACKAGING",
    }
}

#[async_trait]
impl Carrier for FedexCarrier {
    fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn validate_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()> {
        sandbox::require_api_key(&self.config.id, auth)?;
        sandbox::require_field(&self.config.id, auth.account_number.as_ref(), "account number")
    }

    async fn create_shipment(
        &self,
        address: &AddressFields,
        request: &ShipmentRequest,
        auth: &CarrierAuth,
    ) -> CarrierResult<ShipmentResult> {
        self.validate_credentials(auth)?;
        self.config.check_request(request)?;

        let ship = ShipRequest {
            account_number: auth.account_number.as_deref().unwrap_or_default(),
            service_type: service_type(&request.service),
            packaging_type: packaging_type(&request.package_type),
            recipient_country_code: &address.country,
            total_weight_lb: request.weight.map(|w| w.pounds()),
            customer_reference: request.reference.as_deref(),
        };
        debug!(
            carrier = "fedex",
            service_type = ship.service_type,
            packaging_type = ship.packaging_type,
            "Sandbox ship request"
        );

        let tracking_number = sandbox::mint_digits(TRACKING_PREFIX, 11);
        let cost = sandbox::quote(BASE_RATE_CENTS, PER_LB_CENTS, request.weight.as_ref());
        Ok(ShipmentResult {
            label_url: sandbox::label_url(&self.config.id, &tracking_number),
            estimated_delivery: sandbox::days_from_now(DELIVERY_DAYS),
            carrier_details: serde_json::json!({
                "mode": "sandbox",
                "serviceType": ship.service_type,
                "packagingType": ship.packaging_type,
                "totalWeightLb": ship.total_weight_lb,
                "customerReference": ship.customer_reference,
                "international": !ship.recipient_country_code.eq_ignore_ascii_case("US"),
                "accountSuffix": ship
                    .account_number
                    .get(ship.account_number.len().saturating_sub(4)..)
                    .unwrap_or_default(),
                "totalNetCharge": cost.amount(),
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
            status: "picked_up".into(),
            estimated_delivery: Some(sandbox::days_from_now(2)),
            history: vec![
                sandbox::scan("label_created", "SENDER LOCATION, CA", 24),
                sandbox::scan("picked_up", "SAN JOSE, CA", 12),
            ],
        })
    }
}
