//! Helpers shared by the sandbox adapters.

use blindship_core::{CarrierId, Timestamp};
use chrono::Duration;
use rand::Rng;

use crate::credentials::CarrierAuth;
use crate::error::{CarrierError, CarrierResult};
use crate::types::{Money, TrackingEvent, Weight};

/// API keys must be longer than this.
const MIN_KEY_LEN: usize = 10;

const ALNUM: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub(crate) fn invalid(carrier: &CarrierId, reason: &str) -> CarrierError {
    CarrierError::InvalidCredentials {
        carrier: carrier.to_string(),
        reason: reason.to_owned(),
    }
}

pub(crate) fn require_api_key(carrier: &CarrierId, auth: &CarrierAuth) -> CarrierResult<()> {
    if auth.api_key.trim().len() > MIN_KEY_LEN {
        Ok(())
    } else {
        Err(invalid(carrier, "api key must be longer than 10 characters"))
    }
}

pub(crate) fn require_field(
    carrier: &CarrierId,
    value: Option<&String>,
    name: &str,
) -> CarrierResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(invalid(carrier, &format!("{name} is required"))),
    }
}

/// `prefix` followed by `len` random digits.
pub(crate) fn mint_digits(prefix: &str, len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(prefix.len().saturating_add(len));
    out.push_str(prefix);
    for _ in 0..len {
        out.push(char::from(b'0'.saturating_add(rng.gen_range(0..10u8))));
    }
    out
}

/// `prefix` followed by `len` random uppercase alphanumerics.
pub(crate) fn mint_alphanumeric(prefix: &str, len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(prefix.len().saturating_add(len));
    out.push_str(prefix);
    for _ in 0..len {
        let idx = rng.gen_range(0..ALNUM.len());
        out.push(char::from(ALNUM[idx]));
    }
    out
}

/// Base rate for the first pound plus `per_lb_cents` for each further
/// billable pound. No weight bills as one pound.
pub(crate) fn quote(base_cents: u64, per_lb_cents: u64, weight: Option<&Weight>) -> Money {
    let extra = weight
        .map(Weight::billable_pounds)
        .unwrap_or(1)
        .saturating_sub(1);
    Money::usd(base_cents.saturating_add(per_lb_cents.saturating_mul(extra)))
}

pub(crate) fn label_url(carrier: &CarrierId, tracking_number: &str) -> String {
    format!("https://sandbox.labels.blindship.dev/{carrier}/{tracking_number}.pdf")
}

pub(crate) fn days_from_now(days: i64) -> Timestamp {
    Timestamp::from_now(Duration::days(days))
}

/// A scan `hours_ago` hours in the past.
pub(crate) fn scan(status: &str, location: &str, hours_ago: i64) -> TrackingEvent {
    TrackingEvent {
        status: status.to_owned(),
        location: Some(location.to_owned()),
        timestamp: Timestamp::from_now(Duration::hours(hours_ago.saturating_neg())),
    }
}

pub(crate) fn unknown_tracking_number(carrier: &CarrierId) -> CarrierError {
    CarrierError::Declined {
        carrier: carrier.to_string(),
        reason: "unknown tracking number".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WeightUnit;

    #[test]
    fn test_mint_formats() {
        let n = mint_digits("9400", 18);
        assert_eq!(n.len(), 22);
        assert!(n.starts_with("9400"));
        assert!(n.bytes().all(|b| b.is_ascii_digit()));

        let n = mint_alphanumeric("1Z", 9);
        assert_eq!(n.len(), 11);
        assert!(n[2..].bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_quote_is_deterministic() {
        assert_eq!(quote(595, 150, None).amount_cents, 595);
        let heavy = Weight {
            value: 4.2,
            unit: WeightUnit::Lb,
        };
        assert_eq!(quote(595, 150, Some(&heavy)).amount_cents, 1195);
        assert_eq!(quote(595, 150, Some(&heavy)), quote(595, 150, Some(&heavy)));
    }

    #[test]
    fn test_credential_rules() {
        let usps = CarrierId::new("usps").unwrap();
        assert!(require_api_key(&usps, &CarrierAuth::with_key("0123456789")).is_err());
        assert!(require_api_key(&usps, &CarrierAuth::with_key("0123456789a")).is_ok());
        assert!(require_field(&usps, None, "account number").is_err());
        assert!(require_field(&usps, Some(&"  ".to_owned()), "account number").is_err());
    }
}
