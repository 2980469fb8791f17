//! Carrier-related error types.

use thiserror::Error;

/// Errors raised by the carrier gateway.
///
/// Messages never include credentials.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// No adapter is registered for this carrier.
    #[error("unsupported carrier: {0}")]
    UnsupportedCarrier(String),

    /// An inbound carrier failed authentication.
    #[error("carrier {carrier} is not authorized")]
    NotAuthorized {
        /// The carrier id that was presented.
        carrier: String,
    },

    /// Configured credentials fail the carrier's shape rules.
    #[error("invalid credentials for {carrier}: {reason}")]
    InvalidCredentials {
        /// Carrier id.
        carrier: String,
        /// Which rule failed.
        reason: String,
    },

    /// No credentials are configured for this carrier.
    #[error("no credentials configured for {carrier}")]
    MissingCredentials {
        /// Carrier id.
        carrier: String,
    },

    /// The carrier does not offer the requested service.
    #[error("{carrier} does not offer service {service:?}")]
    UnsupportedService {
        /// Carrier id.
        carrier: String,
        /// Requested service.
        service: String,
    },

    /// The carrier does not accept the requested package type.
    #[error("{carrier} does not accept package type {package_type:?}")]
    UnsupportedPackageType {
        /// Carrier id.
        carrier: String,
        /// Requested package type.
        package_type: String,
    },

    /// The shipment request itself is malformed.
    #[error("invalid shipment request: {0}")]
    InvalidRequest(String),

    /// The carrier refused the request.
    #[error("{carrier} declined the request: {reason}")]
    Declined {
        /// Carrier id.
        carrier: String,
        /// Carrier-supplied reason.
        reason: String,
    },

    /// The carrier did not answer in time.
    #[error("{carrier} did not respond within {secs}s")]
    Timeout {
        /// Carrier id.
        carrier: String,
        /// The timeout that elapsed.
        secs: u64,
    },

    /// Transport or carrier-side failure.
    #[error("{carrier} backend error: {message}")]
    Backend {
        /// Carrier id.
        carrier: String,
        /// Failure description.
        message: String,
    },
}

impl CarrierError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. }
            | Self::InvalidCredentials { .. }
            | Self::MissingCredentials { .. } => "carrier_not_authorized",
            Self::UnsupportedCarrier(_)
            | Self::UnsupportedService { .. }
            | Self::UnsupportedPackageType { .. }
            | Self::InvalidRequest(_) => "invalid_request",
            Self::Declined { .. } | Self::Timeout { .. } | Self::Backend { .. } => "carrier_error",
        }
    }

    /// Whether the failure happened on the carrier's side of the call.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend { .. })
    }
}

/// Result type for carrier operations.
pub type CarrierResult<T> = Result<T, CarrierError>;
