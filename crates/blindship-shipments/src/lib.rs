//! Blindship Shipments - booking and tracking.
//!
//! The [`ShipmentOrchestrator`] turns a shipping token into a label: it
//! resolves the token for the booking carrier, records the shipment as
//! `processing`, calls the carrier and stores the outcome. The
//! [`TrackingIngestor`] applies status pushes from carriers. Both write
//! through [`update_shipment`], a compare-and-swap loop on the record's
//! version, so concurrent updates never lose each other.
//!
//! Status only moves forward along the delivery path; see
//! [`ShipmentStatus::can_transition_to`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod ingestor;
mod model;
mod orchestrator;
mod store;

pub use error::{ShipmentError, ShipmentResult};
pub use ingestor::{IngestOutcome, TrackingIngestor, TrackingUpdate};
pub use model::{ConfirmationStatus, Shipment, ShipmentStatus, TrackingRecord};
pub use orchestrator::{ShipmentOrchestrator, ShipmentResponse, TrackingView};
pub use store::{KvShipmentStore, ShipmentStore, update_shipment};
