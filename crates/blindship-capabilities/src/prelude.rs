//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_capabilities::prelude::*;` to import all essential types.

// Errors
pub use crate::{CapabilityError, CapabilityResult};

// Tokens and permissions
pub use crate::{IssuanceDefaults, Permission, PermissionBuilder, ShippingScope, ShippingToken};

// Storage
pub use crate::{AddressBook, KvAddressBook, KvPermissionStore, PermissionStore};

// Resolution
pub use crate::{AddressResolver, Resolution};
