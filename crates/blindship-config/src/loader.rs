//! Config file loading.
//!
//! 1. Read the file (or take a string)
//! 2. Parse into a raw TOML tree
//! 3. Resolve `${VAR}` references
//! 4. Deserialize into [`BrokerConfig`]
//! 5. Validate

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::Path;

use tracing::info;

use crate::env::{collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::types::BrokerConfig;
use crate::validate;

impl BrokerConfig {
    /// Load, resolve and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, a
    /// `${VAR}` reference is unset, or validation fails.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml_str(&contents, &path.display().to_string(), &collect_env_vars())?;
        info!(path = %path.display(), carriers = config.carriers.len(), "loaded broker config");
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// See [`BrokerConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let config = Self::default();
                validate::validate(&config)?;
                Ok(config)
            },
        }
    }

    /// Parse a config document with an explicit environment.
    ///
    /// `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on parse, resolution or validation failure.
    pub fn from_toml_str<S: BuildHasher>(
        contents: &str,
        origin: &str,
        env_vars: &HashMap<String, String, S>,
    ) -> ConfigResult<Self> {
        let mut raw: toml::Value = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: origin.to_owned(),
            source: e,
        })?;
        resolve_env_references(&mut raw, env_vars)?;

        let config: Self = raw.try_into().map_err(|e| ConfigError::ParseError {
            path: origin.to_owned(),
            source: e,
        })?;
        validate::validate(&config)?;
        Ok(config)
    }

    /// Validate this configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageBackend;

    const SAMPLE: &str = r#"
[server]
bind = "0.0.0.0:9000"
base_path = "/ship"

[cors]
allowed_origins = ["https://dash.example.com"]

[timeouts]
carrier_secs = 5

[storage]
backend = "surrealkv"
path = "/var/lib/blindship"

[carriers.usps]
use_test_mode = true
test = { api_key = "${USPS_KEY}" }

[carriers.ups]
use_test_mode = false
production = { api_key = "ups-live-key-0001", username = "shipper", password = "${UPS_PASS}" }
"#;

    fn env() -> HashMap<String, String> {
        HashMap::from([
            ("USPS_KEY".to_owned(), "usps-test-key-999".to_owned()),
            ("UPS_PASS".to_owned(), "pa55word".to_owned()),
        ])
    }

    #[test]
    fn test_from_toml_str_full_document() {
        let config = BrokerConfig::from_toml_str(SAMPLE, "<test>", &env()).unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.base_path, "/ship");
        assert!(!config.cors.is_wildcard());
        assert_eq!(config.timeouts.carrier_secs, 5);
        assert_eq!(config.storage.backend, StorageBackend::Surrealkv);

        let usps = &config.carriers["usps"];
        assert_eq!(usps.active().api_key.as_deref(), Some("usps-test-key-999"));
        let ups = &config.carriers["ups"];
        assert_eq!(ups.active().password.as_deref(), Some("pa55word"));
    }

    #[test]
    fn test_missing_env_reference_fails_load() {
        let err = BrokerConfig::from_toml_str(SAMPLE, "<test>", &HashMap::<String, String>::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { .. }));
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = BrokerConfig::from_toml_str("[server", "broken.toml", &env()).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blindship.toml");
        std::fs::write(&path, "[server]\nbase_path = \"/bs\"\n").unwrap();

        let config = BrokerConfig::load(&path).unwrap();
        assert_eq!(config.server.base_path, "/bs");
    }

    #[test]
    fn test_load_missing_file() {
        let err = BrokerConfig::load("/nonexistent/blindship.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = BrokerConfig::load_or_default(None).unwrap();
        assert_eq!(config.server.base_path, "/blind-shipping");
    }
}
