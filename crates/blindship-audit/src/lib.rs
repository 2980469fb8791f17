//! Blindship Audit - the append-only record of address disclosures.
//!
//! Every successful token resolution discloses an address to a carrier.
//! This crate records each disclosure as an [`AccessLogEntry`] naming the
//! permission, the carrier, exactly which fields were revealed and which
//! access (by counter value) it was.
//!
//! Entries are never updated or deleted. Each entry gets its own storage key,
//! so concurrent resolutions of different (or the same) tokens append without
//! contending on a shared index.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod storage;

pub use entry::{AccessLogEntry, AccessLogId, AccessPurpose};
pub use error::{AuditError, AuditResult};
pub use storage::{AccessLogStore, KvAccessLogStore};
