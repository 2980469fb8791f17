//! DHL sandbox adapter.

use async_trait::async_trait;
use blindship_core::{AddressFields, CarrierId};
use serde::Serialize;
use tracing::debug;

use super::sandbox;
use crate::carrier::Carrier;
use crate::credentials::CarrierAuth;
use crate::error::CarrierResult;
use crate::types::{CarrierConfig, ShipmentRequest, ShipmentResult, TrackingState};

const BASE_RATE_CENTS: u64 = 1875;
const PER_LB_CENTS: u64 = 300;
const DELIVERY_DAYS: i64 = 3;
const TRACKING_PREFIX: &str = "DHL";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentOrder<'a> {
    product_code: &'static str,
    account_number: &'a str,
    is_customs_declarable: bool,
    receiver_country_code: &'a str,
    weight_kg: Option<f64>,
}

/// DHL.
#[derive(Debug)]
pub struct DhlCarrier {
    config: CarrierConfig,
}

impl Default for DhlCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl DhlCarrier {
    /// Create the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CarrierConfig {
                id: CarrierId::dhl(),
                name: "DHL".into(),
                base_url: "https://api.dhl.com".into(),
                services: ["Express", "Parcel", "Freight", "Express Easy"]
                    .map(String::from)
                    .to_vec(),
                package_types: ["Package", "Parcel", "Pallet", "Document"]
                    .map(String::from)
                    .to_vec(),
            },
        }
    }
}

fn product_code(service: &str) -> &'static str {
    match service.to_ascii_lowercase().as_str() {
        "express" => "EXPRESS_WORLDWIDE",
        "freight" => "FREIGHT",
        "express easy" => "EXPRESS_EASY",
        _ => "PARCEL_CONNECT",
    }
}

#[async_trait]
impl Carrier for DhlCarrier {
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

        let order = ShipmentOrder {
            product_code: product_code(&request.service),
            account_number: auth.account_number.as_deref().unwrap_or_default(),
            is_customs_declarable: !request.package_type.eq_ignore_ascii_case("Document"),
            receiver_country_code: &address.country,
            weight_kg: request.weight.map(|w| w.pounds() * 0.453_592_37),
        };
        debug!(
            carrier = "dhl",
            product_code = order.product_code,
            "Sandbox shipment order"
        );

        let tracking_number = sandbox::mint_alphanumeric(TRACKING_PREFIX, 9);
        let cost = sandbox::quote(BASE_RATE_CENTS, PER_LB_CENTS, request.weight.as_ref());
        Ok(ShipmentResult {
            label_url: sandbox::label_url(&self.config.id, &tracking_number),
            estimated_delivery: sandbox::days_from_now(DELIVERY_DAYS),
            carrier_details: serde_json::json!({
                "mode": "sandbox",
                "productCode": order.product_code,
                "isCustomsDeclarable": order.is_customs_declarable,
                "crossBorder": !order.receiver_country_code.eq_ignore_ascii_case("US"),
                "weightKg": order.weight_kg,
                "billingAccountSet": !order.account_number.is_empty(),
                "totalPrice": [{"price": cost.amount(), "priceCurrency": cost.currency}],
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
                sandbox::scan("information_received", "SHIPPING DEPARTMENT, FREMONT, CA", 48),
                sandbox::scan("picked_up", "DHL FACILITY, FREMONT, CA", 30),
                sandbox::scan("in_transit", "DHL HUB, OAKLAND, CA", 10),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CarrierError;

    fn address() -> AddressFields {
        blindship_core::PhysicalAddress::new("5 Rue Neuve", "Lyon", "ARA", "69001", "FR").fields()
    }

    fn auth() -> CarrierAuth {
        CarrierAuth::with_key("dhl-sandbox-key").account_number("DE-123456")
    }

    #[tokio::test]
    async fn test_create_document_shipment() {
        let dhl = DhlCarrier::new();
        let request = ShipmentRequest::new("Express", "Document");
        let result = dhl.create_shipment(&address(), &request, &auth()).await.unwrap();

        assert!(result.tracking_number.starts_with("DHL"));
        assert_eq!(result.tracking_number.len(), 12);
        assert_eq!(result.cost.amount_cents, BASE_RATE_CENTS);
        assert_eq!(result.carrier_details["productCode"], "EXPRESS_WORLDWIDE");
        assert_eq!(result.carrier_details["isCustomsDeclarable"], false);
        assert_eq!(result.carrier_details["crossBorder"], true);
    }

    #[tokio::test]
    async fn test_rejects_missing_account() {
        let dhl = DhlCarrier::new();
        let request = ShipmentRequest::new("Parcel", "Parcel");
        assert!(matches!(
            dhl.create_shipment(&address(), &request, &CarrierAuth::with_key("dhl-sandbox-key"))
                .await,
            Err(CarrierError::InvalidCredentials { .. })
        ));
    }

    #[tokio::test]
    async fn test_track_history_oldest_first() {
        let dhl = DhlCarrier::new();
        let state = dhl.track_shipment("DHLABC123XYZ", &auth()).await.unwrap();
        let statuses: Vec<_> = state.history.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, ["information_received", "picked_up", "in_transit"]);
    }
}
