//! Gateway errors and their HTTP rendering.
//!
//! Every failure leaves the broker as `{"error": <code>, "details": ...}`.
//! Server-side failures carry no details; they are logged instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blindship_capabilities::CapabilityError;
use blindship_carriers::CarrierError;
use blindship_core::ShipmentId;
use blindship_shipments::ShipmentError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Endpoints listed in the 404 envelope.
pub const AVAILABLE_ENDPOINTS: &[&str] = &["/resolve", "/create", "/track", "/tracking", "/health"];

/// Errors surfaced by the HTTP gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required request fields are absent.
    #[error("missing required parameters: {}", missing.join(", "))]
    MissingParameters {
        /// Every field the endpoint requires.
        required: &'static [&'static str],
        /// The ones that were absent.
        missing: Vec<&'static str>,
    },

    /// The body is not valid JSON or has the wrong shape.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// No route matched.
    #[error("unknown endpoint")]
    UnknownEndpoint,

    /// Token issuance or resolution failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Carrier authentication or a carrier call failed.
    #[error(transparent)]
    Carrier(#[from] CarrierError),

    /// The carrier rejected a booking; the shipment is recorded as failed.
    #[error("shipment {shipment_id} failed: {source}")]
    BookingFailed {
        /// The failed shipment.
        shipment_id: ShipmentId,
        /// Why the carrier failed.
        source: CarrierError,
    },

    /// Shipment operation failed.
    #[error(transparent)]
    Shipment(#[from] ShipmentError),

    /// Configuration could not be loaded or applied.
    #[error(transparent)]
    Config(#[from] blindship_config::ConfigError),

    /// Storage could not be opened.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<blindship_storage::StorageError> for GatewayError {
    fn from(e: blindship_storage::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl GatewayError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameters { .. } => "missing_parameters",
            Self::InvalidBody(_) => "invalid_request",
            Self::UnknownEndpoint => "unknown_endpoint",
            Self::Capability(e) => e.code(),
            Self::Carrier(e) | Self::BookingFailed { source: e, .. } => e.code(),
            Self::Shipment(e) => e.code(),
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameters { .. } | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::UnknownEndpoint => StatusCode::NOT_FOUND,
            Self::Capability(e) => capability_status(e),
            Self::Carrier(e) | Self::BookingFailed { source: e, .. } => carrier_status(e),
            Self::Shipment(e) => shipment_status(e),
            Self::Config(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MissingParameters { required, missing } => Some(json!({
                "required": required,
                "missing": missing,
            })),
            Self::UnknownEndpoint => Some(json!({ "available_endpoints": AVAILABLE_ENDPOINTS })),
            Self::BookingFailed { shipment_id, source } => Some(json!({
                "shipment_id": shipment_id,
                "message": source.to_string(),
            })),
            // Carrier credential failures say nothing about why.
            Self::Carrier(
                CarrierError::NotAuthorized { .. }
                | CarrierError::InvalidCredentials { .. }
                | CarrierError::MissingCredentials { .. },
            )
            | Self::Shipment(ShipmentError::Carrier(
                CarrierError::NotAuthorized { .. }
                | CarrierError::InvalidCredentials { .. }
                | CarrierError::MissingCredentials { .. },
            )) => None,
            Self::Capability(e) | Self::Shipment(ShipmentError::Capability(e)) => {
                capability_details(e)
            },
            other if other.status().is_server_error() && !other.is_upstream() => None,
            other => Some(json!({ "message": other.to_string() })),
        }
    }

    fn is_upstream(&self) -> bool {
        match self {
            Self::Carrier(e) | Self::BookingFailed { source: e, .. } => e.is_upstream(),
            Self::Shipment(ShipmentError::Carrier(e)) => e.is_upstream(),
            _ => false,
        }
    }
}

/// Caller-safe details for a capability failure.
///
/// Permission and owner ids stay in the logs.
fn capability_details(e: &CapabilityError) -> Option<serde_json::Value> {
    match e {
        CapabilityError::AccessLimitReached { max, .. } => Some(json!({ "max_access_count": max })),
        CapabilityError::CarrierNotAuthorized { carrier, .. } => Some(json!({ "carrier": carrier })),
        CapabilityError::ServiceNotAuthorized { service, .. } => Some(json!({ "service": service })),
        CapabilityError::InvalidPermission(reason) => Some(json!({ "message": reason })),
        _ => None,
    }
}

fn capability_status(e: &CapabilityError) -> StatusCode {
    match e {
        CapabilityError::InvalidTokenFormat | CapabilityError::InvalidPermission(_) => {
            StatusCode::BAD_REQUEST
        },
        CapabilityError::TokenNotFound | CapabilityError::AddressNotFound { .. } => {
            StatusCode::NOT_FOUND
        },
        CapabilityError::TokenExpired { .. } | CapabilityError::TokenRevoked { .. } => {
            StatusCode::GONE
        },
        CapabilityError::AccessLimitReached { .. }
        | CapabilityError::CarrierNotAuthorized { .. }
        | CapabilityError::ServiceNotAuthorized { .. } => StatusCode::FORBIDDEN,
        CapabilityError::DuplicateToken => StatusCode::CONFLICT,
        CapabilityError::StorageError(_) | CapabilityError::SerializationError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

fn carrier_status(e: &CarrierError) -> StatusCode {
    match e {
        CarrierError::NotAuthorized { .. }
        | CarrierError::InvalidCredentials { .. }
        | CarrierError::MissingCredentials { .. } => StatusCode::UNAUTHORIZED,
        CarrierError::UnsupportedCarrier(_)
        | CarrierError::UnsupportedService { .. }
        | CarrierError::UnsupportedPackageType { .. }
        | CarrierError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CarrierError::Declined { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CarrierError::Timeout { .. } | CarrierError::Backend { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn shipment_status(e: &ShipmentError) -> StatusCode {
    match e {
        ShipmentError::NotFound(_) | ShipmentError::TrackingNotFound { .. } => {
            StatusCode::NOT_FOUND
        },
        ShipmentError::InvalidTransition { .. } | ShipmentError::ConfirmationNotPending(_) => {
            StatusCode::CONFLICT
        },
        ShipmentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ShipmentError::Capability(e) => capability_status(e),
        ShipmentError::Carrier(e) => carrier_status(e),
        ShipmentError::TrackingConflict { .. } => StatusCode::BAD_GATEWAY,
        ShipmentError::Contention(_)
        | ShipmentError::StorageError(_)
        | ShipmentError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            error!(status = status.as_u16(), code, error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), code, error = %self, "Request rejected");
        }

        let body = match self.details() {
            Some(details) => json!({ "error": code, "details": details }),
            None => json!({ "error": code }),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
