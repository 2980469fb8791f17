#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the Blindship broker.
//!
//! A single [`BrokerConfig`] is read from `blindship.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! base_path = "/blind-shipping"
//!
//! [cors]
//! allowed_origins = ["https://dashboard.example.com"]
//!
//! [timeouts]
//! carrier_secs = 20
//!
//! [storage]
//! backend = "surrealkv"
//! path = "/var/lib/blindship"
//!
//! [carriers.usps]
//! use_test_mode = true
//! test = { api_key = "${USPS_TEST_KEY}" }
//! ```
//!
//! String values of the form `${VAR}` are replaced with the environment
//! variable `VAR` at load time; a reference to an unset variable is an error.
//!
//! # Design
//!
//! This crate has **no dependencies on other internal blindship crates**.
//! Sections are plain data; conversion into domain types (carrier
//! credentials, log configuration) happens in the gateway at startup.

/// `${VAR}` reference resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;
