//! USPS sandbox adapter.

use async_trait::async_trait;
use blindship_core::{AddressFields, CarrierId};
use serde::Serialize;
use tracing::debug;

use super::sandbox;
use crate::carrier::Carrier;
use crate::credentials::CarrierAuth;
use crate::error::CarrierResult;
use crate::types::{CarrierConfig, ShipmentRequest, ShipmentResult, TrackingState, WeightUnit};

const BASE_RATE_CENTS: u64 = 595;
const PER_LB_CENTS: u64 = 150;
const DELIVERY_DAYS: i64 = 3;
const TRACKING_PREFIX: &str = "9400";
const ORIGIN_ZIP: &str = "12345";

/// Rate request in the shape of the USPS Web Tools `RateV4` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RateRequest<'a> {
    service: &'a str,
    zip_origination: &'static str,
    zip_destination: &'a str,
    pounds: f64,
    ounces: f64,
    container: &'a str,
    size: &'static str,
}

/// United States Postal Service.
#[derive(Debug)]
pub struct UspsCarrier {
    config: CarrierConfig,
}

impl Default for UspsCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl UspsCarrier {
    /// Create the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CarrierConfig {
                id: CarrierId::usps(),
                name: "USPS".into(),
                base_url: "https://secure.shippingapis.com/ShippingAPI.dll".into(),
                services: ["Priority", "First-Class", "Ground", "Express"]
                    .map(String::from)
                    .to_vec(),
                package_types: [
                    "Package",
                    "Flat Rate Box",
                    "Flat Rate Envelope",
                    "Large Package",
                    "Letter",
                ]
                .map(String::from)
                .to_vec(),
            },
        }
    }

    fn rate_request<'a>(
        address: &'a AddressFields,
        request: &'a ShipmentRequest,
    ) -> RateRequest<'a> {
        let (pounds, ounces) = match request.weight {
            Some(w) if w.unit == WeightUnit::Oz => (0.0, w.value),
            Some(w) => (w.pounds(), 0.0),
            None => (0.0, 0.0),
        };
        RateRequest {
            service: &request.service,
            zip_origination: ORIGIN_ZIP,
            zip_destination: &address.postal_code,
            pounds,
            ounces,
            container: &request.package_type,
            size: "REGULAR",
        }
    }
}

/// Postal zone 1-9 from the leading ZIP digits of origin and destination.
fn zone(origin: &str, destination: &str) -> u8 {
    let digit = |zip: &str| {
        zip.bytes()
            .next()
            .filter(u8::is_ascii_digit)
            .map_or(0, |b| b.saturating_sub(b'0'))
    };
    digit(origin).abs_diff(digit(destination)).saturating_add(1)
}

#[async_trait]
impl Carrier for UspsCarrier {
    fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn validate_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()> {
        sandbox::require_api_key(&self.config.id, auth)
    }

    async fn create_shipment(
        &self,
        address: &AddressFields,
        request: &ShipmentRequest,
        auth: &CarrierAuth,
    ) -> CarrierResult<ShipmentResult> {
        self.validate_credentials(auth)?;
        self.config.check_request(request)?;

        let rate = Self::rate_request(address, request);
        debug!(
            carrier = "usps",
            service = rate.service,
            container = rate.container,
            "Sandbox rate request"
        );

        let tracking_number = sandbox::mint_digits(TRACKING_PREFIX, 18);
        let cost = sandbox::quote(BASE_RATE_CENTS, PER_LB_CENTS, request.weight.as_ref());
        Ok(ShipmentResult {
            label_url: sandbox::label_url(&self.config.id, &tracking_number),
            estimated_delivery: sandbox::days_from_now(DELIVERY_DAYS),
            carrier_details: serde_json::json!({
                "mode": "sandbox",
                "api": "RateV4",
                "service": rate.service,
                "container": rate.container,
                "size": rate.size,
                "pounds": rate.pounds,
                "ounces": rate.ounces,
                "zone": zone(rate.zip_origination, rate.zip_destination),
                "postage": cost.amount(),
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
            estimated_delivery: Some(sandbox::days_from_now(2)),
            history: vec![
                sandbox::scan("accepted", "Shipping Partner Facility, SANTA CLARA, CA", 48),
                sandbox::scan("in_transit", "USPS Regional Facility, SAN FRANCISCO CA", 24),
            ],
        })
    }
}
