//! Shipment error types.

use blindship_capabilities::CapabilityError;
use blindship_carriers::CarrierError;
use thiserror::Error;

use crate::model::ShipmentStatus;

/// Errors raised while creating, updating or querying shipments.
#[derive(Debug, Error)]
pub enum ShipmentError {
    /// No shipment with this id.
    #[error("shipment not found: {0}")]
    NotFound(String),

    /// No shipment matches this carrier and tracking number.
    #[error("no {carrier} shipment with tracking number {tracking_number}")]
    TrackingNotFound {
        /// Carrier id.
        carrier: String,
        /// Tracking number looked up.
        tracking_number: String,
    },

    /// The status change is not allowed from the current state.
    #[error("cannot move shipment from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ShipmentStatus,
        /// Requested status.
        to: ShipmentStatus,
    },

    /// Delivery confirmation was requested but none is pending.
    #[error("no delivery confirmation pending for {0}")]
    ConfirmationNotPending(String),

    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Token resolution failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The carrier gateway failed.
    #[error(transparent)]
    Carrier(#[from] CarrierError),

    /// The carrier issued a tracking number another shipment already holds.
    #[error("tracking number {tracking_number} already belongs to another {carrier} shipment")]
    TrackingConflict {
        /// Carrier id.
        carrier: String,
        /// The reused tracking number.
        tracking_number: String,
    },

    /// Gave up after repeated concurrent modification.
    #[error("too much contention updating {0}")]
    Contention(String),

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl ShipmentError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::TrackingNotFound { .. } => "shipment_not_found",
            Self::InvalidTransition { .. } | Self::ConfirmationNotPending(_) => {
                "invalid_transition"
            },
            Self::InvalidRequest(_) => "invalid_request",
            Self::Capability(e) => e.code(),
            Self::Carrier(e) => e.code(),
            Self::TrackingConflict { .. } => "carrier_error",
            Self::Contention(_) | Self::StorageError(_) | Self::SerializationError(_) => {
                "internal_error"
            },
        }
    }
}

impl From<blindship_storage::StorageError> for ShipmentError {
    fn from(e: blindship_storage::StorageError) -> Self {
        match e {
            blindship_storage::StorageError::Serialization(msg) => Self::SerializationError(msg),
            other => Self::StorageError(other.to_string()),
        }
    }
}

/// Result type for shipment operations.
pub type ShipmentResult<T> = Result<T, ShipmentError>;
