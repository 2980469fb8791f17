//! Post-load configuration validation.

use std::net::SocketAddr;

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{BrokerConfig, StorageBackend};

/// Carrier ids the broker ships adapters for.
pub const KNOWN_CARRIERS: &[&str] = &["usps", "fedex", "ups", "dhl"];

/// Upper bound for `timeouts.carrier_secs`.
const MAX_CARRIER_SECS: u64 = 300;

/// Validate a deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &BrokerConfig) -> ConfigResult<()> {
    validate_server(config)?;
    validate_cors(config)?;
    validate_timeouts(config)?;
    validate_storage(config)?;
    validate_tokens(config)?;
    validate_logging(config)?;
    validate_carriers(config)?;
    Ok(())
}

fn validate_server(config: &BrokerConfig) -> ConfigResult<()> {
    let s = &config.server;

    if s.bind.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::invalid(
            "server.bind",
            format!("'{}' is not a socket address (host:port)", s.bind),
        ));
    }

    let base = s.base_path.as_str();
    if base.is_empty() || base == "/" {
        return Err(ConfigError::invalid(
            "server.base_path",
            "base path must not be empty",
        ));
    }
    if !base.starts_with('/') || base.ends_with('/') {
        return Err(ConfigError::invalid(
            "server.base_path",
            format!("'{base}' must start with '/' and must not end with '/'"),
        ));
    }
    Ok(())
}

fn validate_cors(config: &BrokerConfig) -> ConfigResult<()> {
    if config.cors.allowed_origins.is_empty() {
        return Err(ConfigError::invalid(
            "cors.allowed_origins",
            "list at least one origin, or \"*\"",
        ));
    }
    if config.cors.is_wildcard() && config.cors.allowed_origins.len() > 1 {
        return Err(ConfigError::invalid(
            "cors.allowed_origins",
            "\"*\" cannot be combined with explicit origins",
        ));
    }
    Ok(())
}

fn validate_timeouts(config: &BrokerConfig) -> ConfigResult<()> {
    let secs = config.timeouts.carrier_secs;
    if secs == 0 || secs > MAX_CARRIER_SECS {
        return Err(ConfigError::invalid(
            "timeouts.carrier_secs",
            format!("must be between 1 and {MAX_CARRIER_SECS}"),
        ));
    }
    Ok(())
}

fn validate_storage(config: &BrokerConfig) -> ConfigResult<()> {
    if config.storage.backend == StorageBackend::Surrealkv && config.storage.path.is_none() {
        return Err(ConfigError::invalid(
            "storage.path",
            "required when backend = \"surrealkv\"",
        ));
    }
    Ok(())
}

fn validate_tokens(config: &BrokerConfig) -> ConfigResult<()> {
    if config.tokens.default_expiry_days == 0 {
        return Err(ConfigError::invalid(
            "tokens.default_expiry_days",
            "must be at least 1",
        ));
    }
    if config.tokens.default_max_access_count == 0 {
        return Err(ConfigError::invalid(
            "tokens.default_max_access_count",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_logging(config: &BrokerConfig) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(ConfigError::invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }

    match l.target.as_str() {
        "stdout" | "stderr" => Ok(()),
        "file" if l.directory.is_some() => Ok(()),
        "file" => Err(ConfigError::invalid(
            "logging.directory",
            "required when target = \"file\"",
        )),
        other => Err(ConfigError::invalid(
            "logging.target",
            format!("unsupported target '{other}'; expected one of: stdout, stderr, file"),
        )),
    }
}

fn validate_carriers(config: &BrokerConfig) -> ConfigResult<()> {
    for (id, section) in &config.carriers {
        if !KNOWN_CARRIERS.contains(&id.as_str()) {
            return Err(ConfigError::invalid(
                format!("carriers.{id}"),
                format!(
                    "unknown carrier; expected one of: {}",
                    KNOWN_CARRIERS.join(", ")
                ),
            ));
        }
        if section.enabled && section.active().api_key.is_none() {
            let mode = if section.use_test_mode { "test" } else { "production" };
            warn!(
                carrier = %id,
                mode,
                "carrier enabled without an active api_key; its requests will be rejected"
            );
        }
    }
    Ok(())
}
