//! Test fixtures for common types.

use blindship_carriers::{CarrierAuth, CarrierCredentials};
use blindship_core::{CarrierId, OwnerId, PhysicalAddress};

/// Create a test owner ID.
#[must_use]
pub fn test_owner() -> OwnerId {
    OwnerId::new()
}

/// The address every test owner lives at.
#[must_use]
pub fn test_address() -> PhysicalAddress {
    PhysicalAddress::new("742 Evergreen Terrace", "Springfield", "OR", "97403", "US")
}

/// A second address, for "owner moved" scenarios.
#[must_use]
pub fn test_new_address() -> PhysicalAddress {
    PhysicalAddress::new("31 Spooner Street", "Quahog", "RI", "02903", "US")
}

/// Parse a carrier id.
///
/// # Panics
///
/// Panics if `id` is not a valid carrier id.
#[must_use]
pub fn test_carrier(id: &str) -> CarrierId {
    CarrierId::new(id).expect("valid carrier id")
}

/// The key a carrier registered by the harness authenticates with.
#[must_use]
pub fn carrier_key(id: &str) -> String {
    format!("{id}-test-key")
}

/// Sandbox-mode credentials whose active key is [`carrier_key`].
///
/// Carries an account number and a login so every sandbox adapter's shape
/// check passes.
#[must_use]
pub fn test_credentials(id: &str) -> CarrierCredentials {
    CarrierCredentials {
        production: CarrierAuth::default(),
        test: CarrierAuth::with_key(carrier_key(id))
            .account_number("000111222")
            .login("blindship", "sandbox-password"),
        use_test_mode: true,
    }
}
