//! Capability-related error types.

use thiserror::Error;

/// Errors that can occur while issuing or resolving shipping tokens.
///
/// Messages never include the token itself.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The presented string is not a shipping token.
    #[error("invalid shipping token format")]
    InvalidTokenFormat,

    /// No permission is backed by the presented token.
    #[error("shipping token not found")]
    TokenNotFound,

    /// Token has expired.
    #[error("shipping token expired: {permission_id}")]
    TokenExpired {
        /// The expired permission.
        permission_id: String,
    },

    /// Token has been revoked.
    #[error("shipping token revoked: {permission_id}")]
    TokenRevoked {
        /// The revoked permission.
        permission_id: String,
    },

    /// The token's access counter reached its maximum.
    #[error("access limit reached for {permission_id} ({max} accesses)")]
    AccessLimitReached {
        /// The exhausted permission.
        permission_id: String,
        /// The configured maximum.
        max: u32,
    },

    /// The carrier is not in the token's scope.
    #[error("carrier {carrier} is not authorized by {permission_id}")]
    CarrierNotAuthorized {
        /// The carrier that presented the token.
        carrier: String,
        /// The permission checked.
        permission_id: String,
    },

    /// The requested service is not in the token's scope.
    #[error("service {service:?} is not authorized by {permission_id}")]
    ServiceNotAuthorized {
        /// The requested service.
        service: String,
        /// The permission checked.
        permission_id: String,
    },

    /// The owner has no address on file.
    #[error("no address on file for {owner_id}")]
    AddressNotFound {
        /// The owner looked up.
        owner_id: String,
    },

    /// The scope or limits given at issuance are invalid.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    /// The generated or supplied token is already in use.
    #[error("shipping token already issued")]
    DuplicateToken,

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl CapabilityError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTokenFormat => "invalid_token_format",
            Self::TokenNotFound => "token_not_found",
            Self::TokenExpired { .. } => "token_expired",
            Self::TokenRevoked { .. } => "token_revoked",
            Self::AccessLimitReached { .. } => "access_limit_reached",
            Self::CarrierNotAuthorized { .. } => "carrier_not_authorized",
            Self::ServiceNotAuthorized { .. } => "service_not_authorized",
            Self::AddressNotFound { .. } => "address_not_found",
            Self::InvalidPermission(_) => "invalid_request",
            Self::DuplicateToken => "duplicate_token",
            Self::StorageError(_) | Self::SerializationError(_) => "internal_error",
        }
    }
}

impl From<blindship_storage::StorageError> for CapabilityError {
    fn from(e: blindship_storage::StorageError) -> Self {
        match e {
            blindship_storage::StorageError::Serialization(msg) => Self::SerializationError(msg),
            other => Self::StorageError(other.to_string()),
        }
    }
}

impl From<blindship_audit::AuditError> for CapabilityError {
    fn from(e: blindship_audit::AuditError) -> Self {
        Self::StorageError(e.to_string())
    }
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
