//! Blindship Storage - namespaced key-value persistence.
//!
//! Every durable record in the broker (permissions, addresses, access logs,
//! shipments) lives behind the [`KvStore`] port:
//!
//! - [`MemoryKvStore`] (always available) for tests and ephemeral brokers
//! - `SurrealKvStore` (behind the **`kv`** feature) for an embedded,
//!   ACID-compliant LSM-tree store on disk
//!
//! The port exposes an atomic [`KvStore::compare_and_swap`]. Components that
//! need read-modify-write semantics (access counters, shipment versions,
//! unique indexes) build their loops on it rather than on `get` + `set`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
