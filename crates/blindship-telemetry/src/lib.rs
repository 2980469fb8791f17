//! Blindship Telemetry - Logging and request correlation for the broker.
//!
//! This crate provides:
//! - Configurable `tracing` subscriber setup (pretty, compact, json, full;
//!   stdout, stderr or a rolling file)
//! - A per-request [`RequestContext`] whose span carries the request id,
//!   endpoint and carrier so every log line of a request can be correlated
//!
//! # Example
//!
//! ```rust,no_run
//! use blindship_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), blindship_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("blindship_capabilities=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("gateway").with_operation("resolve");
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("Resolving shipping token");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
