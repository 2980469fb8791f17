//! Blindship Gateway - the broker's HTTP surface.
//!
//! All endpoints live under a configurable base path (default
//! `/blind-shipping`):
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/resolve` | Disclose a token's address to an authorized carrier |
//! | `POST` | `/create` | Book a shipment and return the label |
//! | `POST` | `/tracking` | Carrier webhook for status pushes |
//! | `POST` | `/track` | Pull tracking from the carrier |
//! | `GET` | `/health` | Liveness and registered carriers |
//!
//! Failures use a single envelope, `{"error": <code>, "details": ...}`; see
//! [`GatewayError`] for the status mapping.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;
mod error;
mod handlers;
mod router;
mod state;

pub use error::{AVAILABLE_ENDPOINTS, GatewayError, GatewayResult};
pub use router::{router, serve};
pub use state::AppState;
