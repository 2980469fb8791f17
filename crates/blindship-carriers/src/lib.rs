//! Blindship Carriers - the carrier gateway.
//!
//! A [`Carrier`] is one shipping company behind a uniform interface. The
//! [`CarrierRegistry`] maps [`CarrierId`](blindship_core::CarrierId)s to
//! adapters; it is built once at startup and handed to whoever needs it, so
//! no call site ever branches on a carrier id.
//!
//! Credentials come from a [`CredentialResolver`]. The
//! [`CarrierAuthenticator`] uses the same credentials to check inbound
//! requests from carriers: the presented key must equal the active key,
//! compared in constant time.
//!
//! # Example
//!
//! ```
//! use blindship_carriers::prelude::*;
//! use blindship_core::CarrierId;
//!
//! let registry = CarrierRegistry::sandbox();
//! let usps = registry.get(&CarrierId::usps()).unwrap();
//! assert!(usps.config().supports_service("Priority"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod adapters;
mod auth;
mod carrier;
mod credentials;
mod error;
mod registry;
mod types;

pub use adapters::{DhlCarrier, FedexCarrier, UpsCarrier, UspsCarrier};
pub use auth::{AuthenticatedCarrier, CarrierAuthenticator};
pub use carrier::Carrier;
pub use credentials::{CarrierAuth, CarrierCredentials, CredentialResolver, StaticCredentialResolver};
pub use error::{CarrierError, CarrierResult};
pub use registry::CarrierRegistry;
pub use types::{
    CarrierConfig, DimensionUnit, Dimensions, Money, ShipmentRequest, ShipmentResult,
    TrackingEvent, TrackingState, Weight, WeightUnit,
};
