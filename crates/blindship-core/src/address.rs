//! Physical addresses and the shipping projection handed to carriers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Timestamp;

/// An owner's physical address as stored by the address book.
///
/// The broker never hands this out directly; carriers only ever see the
/// [`AddressFields`] projection returned by [`PhysicalAddress::fields`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalAddress {
    /// Street line.
    pub street_address: String,
    /// City.
    pub city: String,
    /// State, province or region.
    pub state: String,
    /// Postal or ZIP code.
    pub postal_code: String,
    /// Country.
    pub country: String,
    /// When this snapshot was recorded.
    pub created_at: Timestamp,
}

impl PhysicalAddress {
    /// Create a new address snapshot stamped with the current time.
    #[must_use]
    pub fn new(
        street_address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street_address: street_address.into(),
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            country: country.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Override the snapshot time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    /// The minimal shipping projection of this address.
    #[must_use]
    pub fn fields(&self) -> AddressFields {
        AddressFields {
            street_address: self.street_address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

/// The address data disclosed to a carrier. Carries no owner identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    /// Street line.
    pub street_address: String,
    /// City.
    pub city: String,
    /// State, province or region.
    pub state: String,
    /// Postal or ZIP code.
    pub postal_code: String,
    /// Country.
    pub country: String,
}

impl AddressFields {
    /// The fields this projection discloses, for access logging.
    #[must_use]
    pub fn disclosed(&self) -> Vec<AddressField> {
        AddressField::ALL.to_vec()
    }

    /// Look up a single field by name.
    #[must_use]
    pub fn get(&self, field: AddressField) -> &str {
        match field {
            AddressField::StreetAddress => &self.street_address,
            AddressField::City => &self.city,
            AddressField::State => &self.state,
            AddressField::PostalCode => &self.postal_code,
            AddressField::Country => &self.country,
        }
    }
}

/// Name of one disclosed address field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    /// `street_address`
    StreetAddress,
    /// `city`
    City,
    /// `state`
    State,
    /// `postal_code`
    PostalCode,
    /// `country`
    Country,
}

impl AddressField {
    /// Every field, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::StreetAddress,
        Self::City,
        Self::State,
        Self::PostalCode,
        Self::Country,
    ];

    /// Wire name of the field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreetAddress => "street_address",
            Self::City => "city",
            Self::State => "state",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PhysicalAddress {
        PhysicalAddress::new("1 Main St", "Springfield", "IL", "62701", "US")
    }

    #[test]
    fn test_fields_projection_drops_metadata() {
        let fields = sample().fields();
        let json = serde_json::to_value(&fields).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 5);
        assert!(!obj.contains_key("created_at"));
        assert_eq!(obj["postal_code"], "62701");
    }

    #[test]
    fn test_disclosed_lists_every_field() {
        let fields = sample().fields();
        let disclosed = fields.disclosed();
        assert_eq!(disclosed.len(), 5);
        assert_eq!(fields.get(AddressField::City), "Springfield");
    }

    #[test]
    fn test_field_serde_names() {
        let json = serde_json::to_string(&AddressField::StreetAddress).unwrap();
        assert_eq!(json, "\"street_address\"");
        assert_eq!(AddressField::PostalCode.to_string(), "postal_code");
    }
}
