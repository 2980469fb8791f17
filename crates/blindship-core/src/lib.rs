//! Blindship Core - Foundation types for the blind-shipping capability broker.
//!
//! This crate provides:
//! - Strongly typed identifiers for owners, permissions, shipments and carriers
//! - A `Timestamp` wrapper used for every persisted instant
//! - The owner's [`PhysicalAddress`] and the minimal [`AddressFields`]
//!   projection that is the only address data a carrier ever receives

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod address;
pub mod types;

pub use address::{AddressField, AddressFields, PhysicalAddress};
pub use types::{CarrierId, InvalidCarrierId, OwnerId, PermissionId, ShipmentId, Timestamp};
