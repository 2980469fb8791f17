//! Prelude module - commonly used types for convenient import.
//!
//! Use `use blindship_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Entries
pub use crate::{AccessLogEntry, AccessLogId, AccessPurpose};

// Storage
pub use crate::{AccessLogStore, KvAccessLogStore};
