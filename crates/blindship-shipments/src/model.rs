//! The shipment record and its status machine.

use std::fmt;

use blindship_carriers::Money;
use blindship_core::{CarrierId, OwnerId, PermissionId, ShipmentId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{ShipmentError, ShipmentResult};

/// Where a shipment is in its life.
///
/// The delivery path is `created → processing → label_created → in_transit →
/// out_for_delivery → delivered`. `exception`, `failed` and `cancelled` end
/// a shipment from any open state; `cancelled` only before the parcel moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Record created.
    Created,
    /// Waiting on the carrier.
    Processing,
    /// Carrier issued a label.
    LabelCreated,
    /// Moving through the carrier network.
    InTransit,
    /// On the delivery vehicle.
    OutForDelivery,
    /// Delivered.
    Delivered,
    /// Carrier reported a problem.
    Exception,
    /// Booking failed.
    Failed,
    /// Cancelled before pickup.
    Cancelled,
}

impl ShipmentStatus {
    /// Every status.
    pub const ALL: [Self; 9] = [
        Self::Created,
        Self::Processing,
        Self::LabelCreated,
        Self::InTransit,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Exception,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::LabelCreated => "label_created",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Exception => "exception",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map a carrier status string onto a broker status.
    ///
    /// Accepts the broker's own names plus carrier synonyms (`accepted`,
    /// `picked_up`, `information_received`), case-insensitively.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match raw.as_str() {
            "accepted" | "picked_up" => Some(Self::InTransit),
            "information_received" => Some(Self::LabelCreated),
            other => Self::ALL.into_iter().find(|s| s.as_str() == other),
        }
    }

    /// Whether no further status change is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Exception | Self::Failed | Self::Cancelled
        )
    }

    /// Whether a cancellation is still possible.
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Created | Self::Processing | Self::LabelCreated)
    }

    /// Position on the delivery path, `None` for the terminal side states.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Created => Some(0),
            Self::Processing => Some(1),
            Self::LabelCreated => Some(2),
            Self::InTransit => Some(3),
            Self::OutForDelivery => Some(4),
            Self::Delivered => Some(5),
            Self::Exception | Self::Failed | Self::Cancelled => None,
        }
    }

    /// Whether moving from `self` to `next` is allowed. Staying put is.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Cancelled => self.is_cancellable(),
            Self::Exception | Self::Failed => true,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    fn check_transition(self, next: Self) -> ShipmentResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ShipmentError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner confirmation of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Waiting on the owner.
    Pending,
    /// Owner confirmed receipt.
    Confirmed,
}

/// One distinct tracking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Status after normalization.
    pub status: ShipmentStatus,
    /// Carrier payload.
    pub details: serde_json::Value,
    /// When the broker recorded it.
    pub recorded_at: Timestamp,
}

/// A shipment booked through the broker. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Unique id.
    pub id: ShipmentId,
    /// Permission whose token booked it.
    pub permission_id: PermissionId,
    /// Address owner.
    pub owner_id: OwnerId,
    /// Carrier.
    pub carrier: CarrierId,
    /// Carrier service.
    pub service: String,
    /// Carrier tracking number, once booked.
    pub tracking_number: Option<String>,
    /// Current status.
    pub status: ShipmentStatus,
    /// The shipment request as submitted.
    pub package_details: serde_json::Value,
    /// Raw carrier booking response, or `{error}`.
    pub carrier_details: serde_json::Value,
    /// Latest carrier tracking payload plus `last_updated`.
    pub tracking_details: serde_json::Value,
    /// Distinct tracking events, oldest first.
    pub tracking_history: Vec<TrackingRecord>,
    /// Label download location.
    pub label_url: Option<String>,
    /// Carrier's delivery estimate.
    pub estimated_delivery: Option<Timestamp>,
    /// Quoted cost.
    pub cost: Option<Money>,
    /// Whether the token demanded owner confirmation on delivery.
    pub requires_confirmation: bool,
    /// Set once a confirmable shipment is delivered.
    pub confirmation_required: bool,
    /// Confirmation progress.
    pub confirmation_status: Option<ConfirmationStatus>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Bumped on every write; guards compare-and-swap updates.
    pub version: u64,
}

impl Shipment {
    /// A new shipment in `processing`, about to be handed to the carrier.
    #[must_use]
    pub fn processing(
        permission_id: PermissionId,
        owner_id: OwnerId,
        carrier: CarrierId,
        service: impl Into<String>,
        package_details: serde_json::Value,
        requires_confirmation: bool,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: ShipmentId::new(),
            permission_id,
            owner_id,
            carrier,
            service: service.into(),
            tracking_number: None,
            status: ShipmentStatus::Processing,
            package_details,
            carrier_details: serde_json::Value::Null,
            tracking_details: serde_json::Value::Null,
            tracking_history: Vec::new(),
            label_url: None,
            estimated_delivery: None,
            cost: None,
            requires_confirmation,
            confirmation_required: false,
            confirmation_status: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Record a successful booking.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`] unless the shipment is
    /// still being booked.
    pub fn mark_label_created(
        &mut self,
        booking: &blindship_carriers::ShipmentResult,
    ) -> ShipmentResult<()> {
        self.status.check_transition(ShipmentStatus::LabelCreated)?;
        self.status = ShipmentStatus::LabelCreated;
        self.tracking_number = Some(booking.tracking_number.clone());
        self.label_url = Some(booking.label_url.clone());
        self.estimated_delivery = Some(booking.estimated_delivery);
        self.cost = Some(booking.cost.clone());
        self.carrier_details = booking.carrier_details.clone();
        Ok(())
    }

    /// Record a failed booking.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`] if already terminal.
    pub fn mark_failed(&mut self, error: &str) -> ShipmentResult<()> {
        self.status.check_transition(ShipmentStatus::Failed)?;
        self.status = ShipmentStatus::Failed;
        self.carrier_details = serde_json::json!({ "error": error });
        Ok(())
    }

    /// Apply a tracking event. Returns `false` if it repeats the current
    /// state and nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`] for a backwards move or
    /// for leaving a terminal state.
    pub fn apply_tracking(
        &mut self,
        status: ShipmentStatus,
        details: serde_json::Value,
        now: Timestamp,
    ) -> ShipmentResult<bool> {
        let repeat = self.status == status
            && self
                .tracking_history
                .last()
                .is_some_and(|last| last.status == status && last.details == details);
        if repeat {
            return Ok(false);
        }
        self.status.check_transition(status)?;

        self.tracking_details = with_last_updated(&details, now);
        self.tracking_history.push(TrackingRecord {
            status,
            details,
            recorded_at: now,
        });
        self.status = status;

        if status == ShipmentStatus::Delivered
            && self.requires_confirmation
            && self.confirmation_status.is_none()
        {
            self.confirmation_required = true;
            self.confirmation_status = Some(ConfirmationStatus::Pending);
        }
        Ok(true)
    }

    /// Cancel. Returns `false` if already cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::InvalidTransition`] once the parcel moved.
    pub fn cancel(&mut self) -> ShipmentResult<bool> {
        if self.status == ShipmentStatus::Cancelled {
            return Ok(false);
        }
        self.status.check_transition(ShipmentStatus::Cancelled)?;
        self.status = ShipmentStatus::Cancelled;
        Ok(true)
    }

    /// Record the owner's confirmation. Returns `false` if already confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`ShipmentError::ConfirmationNotPending`] if no confirmation
    /// was asked for.
    pub fn confirm_delivery(&mut self) -> ShipmentResult<bool> {
        match self.confirmation_status {
            Some(ConfirmationStatus::Pending) => {
                self.confirmation_status = Some(ConfirmationStatus::Confirmed);
                Ok(true)
            },
            Some(ConfirmationStatus::Confirmed) => Ok(false),
            None => Err(ShipmentError::ConfirmationNotPending(self.id.to_string())),
        }
    }
}

/// `details` as an object with `last_updated` added.
fn with_last_updated(details: &serde_json::Value, now: Timestamp) -> serde_json::Value {
    let mut merged = match details {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".into(), other.clone());
            map
        },
    };
    merged.insert(
        "last_updated".into(),
        serde_json::Value::String(now.to_rfc3339()),
    );
    serde_json::Value::Object(merged)
}
