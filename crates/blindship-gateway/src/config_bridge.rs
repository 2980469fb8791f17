//! Bridge from [`BrokerConfig`] sections to domain types.
//!
//! The config crate knows nothing about carriers, storage or telemetry; the
//! conversions live here so the binary and the tests build the broker the
//! same way.

use std::path::PathBuf;
use std::sync::Arc;

use blindship_capabilities::IssuanceDefaults;
use blindship_carriers::{CarrierAuth, CarrierCredentials, CarrierRegistry, StaticCredentialResolver};
use blindship_config::{
    BrokerConfig, CarrierAuthSection, LoggingSection, StorageBackend, StorageSection, TokensSection,
};
use blindship_core::CarrierId;
use blindship_storage::{KvStore, MemoryKvStore, SurrealKvStore};
use blindship_telemetry::{LogConfig, LogFormat, LogTarget};
use tracing::{info, warn};

use crate::error::{GatewayError, GatewayResult};

/// Convert the `[logging]` section into a telemetry [`LogConfig`].
#[must_use]
pub fn to_log_config(logging: &LoggingSection) -> LogConfig {
    let format = match logging.format.as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };
    let target = match logging.target.as_str() {
        "stdout" => LogTarget::Stdout,
        "file" => LogTarget::File(
            logging
                .directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("logs")),
        ),
        _ => LogTarget::Stderr,
    };

    let mut log_config = LogConfig::new(&logging.level)
        .with_format(format)
        .with_target(target);
    for directive in &logging.directives {
        log_config = log_config.with_directive(directive);
    }
    log_config
}

/// Convert the `[tokens]` section into issuance defaults.
#[must_use]
pub fn to_issuance_defaults(tokens: &TokensSection) -> IssuanceDefaults {
    IssuanceDefaults {
        expiry_days: tokens.default_expiry_days,
        max_access_count: tokens.default_max_access_count,
    }
}

fn to_carrier_auth(section: &CarrierAuthSection) -> CarrierAuth {
    CarrierAuth {
        api_key: section.api_key.clone().unwrap_or_default(),
        account_number: section.account_number.clone(),
        username: section.username.clone(),
        password: section.password.clone(),
    }
}

fn enabled_carriers(config: &BrokerConfig) -> GatewayResult<Vec<CarrierId>> {
    config
        .carriers
        .iter()
        .filter(|(_, section)| section.enabled)
        .map(|(id, _)| {
            CarrierId::new(id).map_err(|e| GatewayError::Internal(format!("carriers.{id}: {e}")))
        })
        .collect()
}

/// Build the credential resolver from the enabled `[carriers.*]` sections.
///
/// # Errors
///
/// Returns an error if a carrier id is malformed.
pub fn to_credential_resolver(config: &BrokerConfig) -> GatewayResult<StaticCredentialResolver> {
    let mut resolver = StaticCredentialResolver::new();
    for (id, section) in &config.carriers {
        if !section.enabled {
            continue;
        }
        let carrier =
            CarrierId::new(id).map_err(|e| GatewayError::Internal(format!("carriers.{id}: {e}")))?;
        if section.active().api_key.as_deref().is_none_or(str::is_empty) {
            warn!(carrier = %carrier, test_mode = section.use_test_mode, "Carrier has no active api key and cannot authenticate");
        }
        resolver = resolver.with(
            carrier,
            CarrierCredentials {
                production: to_carrier_auth(&section.production),
                test: to_carrier_auth(&section.test),
                use_test_mode: section.use_test_mode,
            },
        );
    }
    Ok(resolver)
}

/// Build the carrier registry.
///
/// Only enabled carriers are registered; with no `[carriers.*]` section at
/// all, every sandbox adapter is.
///
/// # Errors
///
/// Returns an error if a carrier id is malformed.
pub fn to_registry(config: &BrokerConfig) -> GatewayResult<CarrierRegistry> {
    if config.carriers.is_empty() {
        return Ok(CarrierRegistry::sandbox());
    }
    let enabled = enabled_carriers(config)?;
    Ok(CarrierRegistry::sandbox_only(&enabled))
}

/// Open the configured key-value store.
///
/// # Errors
///
/// Returns an error if the `surrealkv` directory cannot be opened.
pub fn open_store(storage: &StorageSection) -> GatewayResult<Arc<dyn KvStore>> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; state is lost on restart");
            Ok(Arc::new(MemoryKvStore::new()))
        },
        StorageBackend::Surrealkv => {
            let path = storage.path.as_ref().ok_or_else(|| {
                GatewayError::Storage("storage.path is required for surrealkv".into())
            })?;
            std::fs::create_dir_all(path)
                .map_err(|e| GatewayError::Storage(format!("{}: {e}", path.display())))?;
            let store = SurrealKvStore::open(path)?;
            info!(path = %path.display(), "Using SurrealKV storage");
            Ok(Arc::new(store))
        },
    }
}
