//! Carrier trait.
//!
//! Defines the interface every carrier adapter implements.

use async_trait::async_trait;
use blindship_core::AddressFields;

use crate::credentials::CarrierAuth;
use crate::error::CarrierResult;
use crate::types::{CarrierConfig, ShipmentRequest, ShipmentResult, TrackingState};

/// A shipping carrier.
///
/// Adapters build their carrier-specific wire request internally; callers
/// only ever deal in the neutral types of this crate.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Static description: id, name, services and package types.
    fn config(&self) -> &CarrierConfig;

    /// Cheap, offline check that `auth` has the shape this carrier needs.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError::InvalidCredentials`](crate::CarrierError::InvalidCredentials)
    /// naming the failed rule.
    fn validate_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()>;

    /// Verify `auth` against the carrier itself.
    ///
    /// Defaults to the shape check.
    ///
    /// # Errors
    ///
    /// Returns an error if the carrier rejects the credentials.
    async fn probe_credentials(&self, auth: &CarrierAuth) -> CarrierResult<()> {
        self.validate_credentials(auth)
    }

    /// Book a shipment to `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is unsupported, the credentials are
    /// invalid, or the carrier fails.
    async fn create_shipment(
        &self,
        address: &AddressFields,
        request: &ShipmentRequest,
        auth: &CarrierAuth,
    ) -> CarrierResult<ShipmentResult>;

    /// Pull the current tracking state of `tracking_number`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number is unknown or the carrier fails.
    async fn track_shipment(
        &self,
        tracking_number: &str,
        auth: &CarrierAuth,
    ) -> CarrierResult<TrackingState>;
}
