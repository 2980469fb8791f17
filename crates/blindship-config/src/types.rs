//! Configuration types for the Blindship broker.
//!
//! Every struct implements [`Default`] so that a bare `[section]` header (or
//! no file at all) yields a working in-memory broker on localhost.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the broker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// HTTP listener and route prefix.
    pub server: ServerSection,
    /// Cross-origin policy for the HTTP surface.
    pub cors: CorsSection,
    /// Timeout budgets.
    pub timeouts: TimeoutsSection,
    /// Durable storage backend.
    pub storage: StorageSection,
    /// Token issuance defaults.
    pub tokens: TokensSection,
    /// Logging level, format and target.
    pub logging: LoggingSection,
    /// Per-carrier credentials, keyed by carrier id (`usps`, `fedex`, ...).
    pub carriers: BTreeMap<String, CarrierSection>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Socket address to bind.
    pub bind: String,
    /// Path prefix under which all endpoints are mounted.
    pub base_path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: default_base_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

/// Allowed browser origins. `["*"]` allows any origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSection {
    /// Origins allowed to call the broker from a browser.
    pub allowed_origins: Vec<String>,
}

impl CorsSection {
    /// Whether any origin is allowed.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
        }
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Timeout budgets, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Upper bound for one carrier call (label creation, tracking pull).
    pub carrier_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            carrier_secs: default_carrier_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Which [`KvStore`](https://docs.rs/blindship-storage) backs the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// Embedded `SurrealKV` directory.
    Surrealkv,
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend kind.
    pub backend: StorageBackend,
    /// Data directory (required for `surrealkv`).
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Token defaults
// ---------------------------------------------------------------------------

/// Defaults applied when a token is issued without explicit limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensSection {
    /// Days until an issued token expires.
    pub default_expiry_days: u32,
    /// Maximum address resolutions per token.
    pub default_max_access_count: u32,
}

impl Default for TokensSection {
    fn default() -> Self {
        Self {
            default_expiry_days: 7,
            default_max_access_count: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings, mirrored into the telemetry `LogConfig` at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base filter level.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// `stderr`, `stdout` or `file`.
    pub target: String,
    /// Log directory when `target = "file"`.
    pub directory: Option<PathBuf>,
    /// Extra filter directives (`blindship_carriers=debug`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            target: "stderr".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Carriers
// ---------------------------------------------------------------------------

/// One carrier's credential sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierSection {
    /// Disabled carriers are not registered at all.
    pub enabled: bool,
    /// Use the `test` credentials instead of `production`.
    pub use_test_mode: bool,
    /// Production credentials.
    pub production: CarrierAuthSection,
    /// Sandbox credentials.
    pub test: CarrierAuthSection,
}

impl CarrierSection {
    /// The credential set selected by `use_test_mode`.
    #[must_use]
    pub fn active(&self) -> &CarrierAuthSection {
        if self.use_test_mode {
            &self.test
        } else {
            &self.production
        }
    }
}

impl Default for CarrierSection {
    fn default() -> Self {
        Self {
            enabled: true,
            use_test_mode: true,
            production: CarrierAuthSection::default(),
            test: CarrierAuthSection::default(),
        }
    }
}

/// Raw credential fields for one environment of one carrier.
///
/// Secrets are redacted from `Debug` and never serialized back out.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CarrierAuthSection {
    /// API key presented by the carrier and used for outbound calls.
    pub api_key: Option<String>,
    /// Shipper account number (FedEx, DHL).
    pub account_number: Option<String>,
    /// Account username (UPS).
    pub username: Option<String>,
    /// Account password (UPS).
    pub password: Option<String>,
}

impl std::fmt::Debug for CarrierAuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierAuthSection")
            .field("has_api_key", &self.api_key.is_some())
            .field("account_number", &self.account_number)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

impl Serialize for CarrierAuthSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CarrierAuthSection", 2)?;
        // api_key and password are intentionally omitted.
        state.serialize_field("account_number", &self.account_number)?;
        state.serialize_field("username", &self.username)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_bind() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_base_path() -> String {
    "/blind-shipping".to_owned()
}

fn default_carrier_secs() -> u64 {
    30
}
