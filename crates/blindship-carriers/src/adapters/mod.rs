//! Sandbox carrier adapters.
//!
//! Each adapter validates credentials with its carrier's rules, builds its
//! carrier-specific request, and answers with a locally minted tracking
//! number and a deterministic quote.

mod dhl;
mod fedex;
mod sandbox;
mod ups;
mod usps;

pub use dhl::DhlCarrier;
pub use fedex::FedexCarrier;
pub use ups::UpsCarrier;
pub use usps::UspsCarrier;
