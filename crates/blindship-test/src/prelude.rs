//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_test::prelude::*;` to import all essential types.

// Fixtures
pub use crate::fixtures::{
    carrier_key, test_address, test_carrier, test_credentials, test_new_address, test_owner,
};

// Harness
pub use crate::harness::{TEST_BASE_PATH, TestBroker, TestBrokerBuilder, init_tracing};

// Mocks
pub use crate::mocks::FakeCarrier;
