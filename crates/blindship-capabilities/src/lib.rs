//! Blindship Capabilities - shipping tokens and blind address resolution.
//!
//! An address owner issues a **shipping token** (`ship_…`) to an app. The
//! token is backed by a [`Permission`] record that says which carriers may
//! redeem it, for which services, until when and how many times. A carrier
//! presenting the token gets the owner's current [`AddressFields`] and
//! nothing else; every disclosure is counted atomically and written to the
//! access log.
//!
//! # Resolution order
//!
//! [`AddressResolver`] checks, first failure wins:
//!
//! 1. token format (`ship_` prefix)
//! 2. token exists
//! 3. not expired
//! 4. not revoked
//! 5. access limit not reached
//! 6. carrier is in scope
//!
//! then fetches the address, increments the counter with a store-side
//! compare-and-swap and appends the access log entry.
//!
//! [`AddressFields`]: blindship_core::AddressFields

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod address_book;
mod error;
mod permission;
mod resolver;
mod scope;
mod store;
mod token;

pub use address_book::{AddressBook, KvAddressBook};
pub use error::{CapabilityError, CapabilityResult};
pub use permission::{IssuanceDefaults, Permission, PermissionBuilder};
pub use resolver::{AddressResolver, Resolution};
pub use scope::ShippingScope;
pub use store::{KvPermissionStore, PermissionStore};
pub use token::ShippingToken;
