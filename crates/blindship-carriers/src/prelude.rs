//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_carriers::prelude::*;` to import all essential types.

// Errors
pub use crate::{CarrierError, CarrierResult};

// Carriers
pub use crate::{Carrier, CarrierConfig, CarrierRegistry};

// Credentials
pub use crate::{
    AuthenticatedCarrier, CarrierAuth, CarrierAuthenticator, CarrierCredentials,
    CredentialResolver, StaticCredentialResolver,
};

// Requests and results
pub use crate::{Money, ShipmentRequest, ShipmentResult, TrackingEvent, TrackingState};
