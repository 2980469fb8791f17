//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_shipments::prelude::*;` to import all essential types.

// Errors
pub use crate::{ShipmentError, ShipmentResult};

// Records
pub use crate::{ConfirmationStatus, Shipment, ShipmentStatus, TrackingRecord};

// Storage
pub use crate::{KvShipmentStore, ShipmentStore};

// Operations
pub use crate::{
    IngestOutcome, ShipmentOrchestrator, ShipmentResponse, TrackingIngestor, TrackingUpdate,
    TrackingView,
};
