//! Endpoint handlers.
//!
//! Bodies are read as raw bytes and parsed here, so malformed JSON and a
//! missing `Content-Type` get the same error envelope as every other
//! failure. Carrier credentials come from the `x-carrier-id` and
//! `x-carrier-key` headers, falling back to `carrierId` and `carrierKey` in
//! the body.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use blindship_carriers::{AuthenticatedCarrier, ShipmentRequest};
use blindship_shipments::TrackingUpdate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{Span, info};

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;

const CARRIER_ID_HEADER: &str = "x-carrier-id";
const CARRIER_KEY_HEADER: &str = "x-carrier-key";

/// Carrier credentials as they may appear in a body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BodyCredentials {
    #[serde(rename = "carrierId", alias = "carrier_id")]
    carrier_id: Option<String>,
    #[serde(rename = "carrierKey", alias = "carrier_key")]
    carrier_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResolveBody {
    token: Option<String>,
    #[serde(flatten)]
    credentials: BodyCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateBody {
    token: Option<String>,
    shipment: Option<serde_json::Value>,
    #[serde(flatten)]
    credentials: BodyCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrackingBody {
    #[serde(alias = "trackingNumber")]
    tracking_number: Option<String>,
    status: Option<String>,
    details: Option<serde_json::Value>,
    #[serde(flatten)]
    credentials: BodyCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrackBody {
    #[serde(alias = "trackingNumber")]
    tracking_number: Option<String>,
    #[serde(flatten)]
    credentials: BodyCredentials,
}

fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> GatewayResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody(e.to_string()))
}

/// Non-blank value or `None`.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    present(
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    )
}

/// Collects absent required fields so one response can name them all.
struct Required {
    fields: &'static [&'static str],
    missing: Vec<&'static str>,
}

impl Required {
    fn new(fields: &'static [&'static str]) -> Self {
        Self {
            fields,
            missing: Vec::new(),
        }
    }

    fn take<T>(&mut self, name: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.missing.push(name);
        }
        value
    }

    fn check(self) -> GatewayResult<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::MissingParameters {
                required: self.fields,
                missing: self.missing,
            })
        }
    }
}

fn carrier_credentials(
    headers: &HeaderMap,
    body: BodyCredentials,
    required: &mut Required,
) -> (Option<String>, Option<String>) {
    let id = header(headers, CARRIER_ID_HEADER).or_else(|| present(body.carrier_id));
    let key = header(headers, CARRIER_KEY_HEADER).or_else(|| present(body.carrier_key));
    (
        required.take("carrierId", id),
        required.take("carrierKey", key),
    )
}

async fn authenticate(state: &AppState, id: &str, key: &str) -> GatewayResult<AuthenticatedCarrier> {
    let carrier = state.authenticator.authenticate(id, key).await?;
    Span::current().record("carrier", carrier.id.as_str());
    Ok(carrier)
}

/// `POST /resolve`: disclose the recipient address to an authorized carrier.
pub(crate) async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    let body: ResolveBody = parse_body(&body)?;
    let mut required = Required::new(&["token", "carrierId", "carrierKey"]);
    let token = required.take("token", present(body.token));
    let (id, key) = carrier_credentials(&headers, body.credentials, &mut required);
    required.check()?;
    let (Some(token), Some(id), Some(key)) = (token, id, key) else {
        return Err(GatewayError::Internal("required fields vanished".into()));
    };

    let carrier = authenticate(&state, &id, &key).await?;
    let resolution = state.resolver.resolve(&token, &carrier.id).await?;

    Ok(Json(json!({
        "recipient": { "address": resolution.address },
        "requires_confirmation": resolution.requires_confirmation,
    })))
}

/// `POST /create`: book a shipment to the token's address.
pub(crate) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    let body: CreateBody = parse_body(&body)?;
    let mut required = Required::new(&["token", "carrierId", "carrierKey", "shipment"]);
    let token = required.take("token", present(body.token));
    let shipment = required.take("shipment", body.shipment.filter(|s| !s.is_null()));
    let (id, key) = carrier_credentials(&headers, body.credentials, &mut required);
    required.check()?;
    let (Some(token), Some(shipment), Some(id), Some(key)) = (token, shipment, id, key) else {
        return Err(GatewayError::Internal("required fields vanished".into()));
    };

    let carrier = authenticate(&state, &id, &key).await?;
    let request: ShipmentRequest = serde_json::from_value(shipment)
        .map_err(|e| GatewayError::InvalidBody(format!("shipment: {e}")))?;

    let response = state
        .orchestrator
        .create_shipment(&carrier, &token, request)
        .await?;
    if let Some(source) = response.carrier_error {
        return Err(GatewayError::BookingFailed {
            shipment_id: response.shipment_id,
            source,
        });
    }

    Ok(Json(json!({
        "shipment_id": response.shipment_id,
        "tracking_number": response.tracking_number,
        "label_url": response.label_url,
        "carrier": response.carrier,
        "estimated_delivery": response.estimated_delivery,
        "cost": response.cost,
    })))
}

/// `POST /tracking`: carrier webhook for status pushes.
pub(crate) async fn tracking(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    let body: TrackingBody = parse_body(&body)?;
    let mut required = Required::new(&["carrierId", "carrierKey", "tracking_number", "status"]);
    let tracking_number = required.take("tracking_number", present(body.tracking_number));
    let status = required.take("status", present(body.status));
    let (id, key) = carrier_credentials(&headers, body.credentials, &mut required);
    required.check()?;
    let (Some(tracking_number), Some(status), Some(id), Some(key)) =
        (tracking_number, status, id, key)
    else {
        return Err(GatewayError::Internal("required fields vanished".into()));
    };

    Span::current().record("carrier", id.as_str());
    let outcome = state
        .ingestor
        .ingest(
            &id,
            &key,
            TrackingUpdate {
                tracking_number,
                status,
                details: body.details,
            },
        )
        .await?;

    let message = if outcome.changed {
        "Tracking status updated successfully"
    } else {
        "Tracking status already recorded"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "status": outcome.shipment.status,
    })))
}

/// `POST /track`: pull the carrier's tracking state.
pub(crate) async fn track(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    let body: TrackBody = parse_body(&body)?;
    let mut required = Required::new(&["carrierId", "carrierKey", "tracking_number"]);
    let tracking_number = required.take("tracking_number", present(body.tracking_number));
    let (id, key) = carrier_credentials(&headers, body.credentials, &mut required);
    required.check()?;
    let (Some(tracking_number), Some(id), Some(key)) = (tracking_number, id, key) else {
        return Err(GatewayError::Internal("required fields vanished".into()));
    };

    let carrier = authenticate(&state, &id, &key).await?;
    let view = state.orchestrator.track(&carrier, &tracking_number).await?;
    info!(carrier = %carrier.id, status = %view.status, "Tracking pulled");
    Ok(Json(view))
}

/// `GET /health`.
pub(crate) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "carriers": state.authenticator.registry().ids(),
    }))
}

/// Fallback for unmatched routes.
pub(crate) async fn unknown_endpoint() -> GatewayError {
    GatewayError::UnknownEndpoint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_credential_aliases() {
        let body: ResolveBody =
            parse_body(&Bytes::from_static(br#"{"token":"ship_x","carrier_id":"usps","carrierKey":"k"}"#))
                .unwrap();
        assert_eq!(body.token.as_deref(), Some("ship_x"));
        assert_eq!(body.credentials.carrier_id.as_deref(), Some("usps"));
        assert_eq!(body.credentials.carrier_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_empty_body_is_default() {
        let body: TrackBody = parse_body(&Bytes::new()).unwrap();
        assert!(body.tracking_number.is_none());
        assert!(matches!(
            parse_body::<TrackBody>(&Bytes::from_static(b"{not json")),
            Err(GatewayError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_headers_win_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert(CARRIER_ID_HEADER, "ups".parse().unwrap());
        let mut required = Required::new(&["carrierId", "carrierKey"]);
        let (id, key) = carrier_credentials(
            &headers,
            BodyCredentials {
                carrier_id: Some("usps".into()),
                carrier_key: Some("   ".into()),
            },
            &mut required,
        );
        assert_eq!(id.as_deref(), Some("ups"));
        assert!(key.is_none());
        assert!(matches!(
            required.check(),
            Err(GatewayError::MissingParameters { missing, .. }) if missing == vec!["carrierKey"]
        ));
    }
}
