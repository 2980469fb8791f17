//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_core::prelude::*;` to import all essential types.

// Identifiers
pub use crate::{CarrierId, OwnerId, PermissionId, ShipmentId};

// Time
pub use crate::Timestamp;

// Addresses
pub use crate::{AddressField, AddressFields, PhysicalAddress};
