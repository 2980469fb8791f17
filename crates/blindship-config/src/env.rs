//! `${VAR}` reference resolution.
//!
//! Carrier secrets are normally kept out of the config file and referenced as
//! `api_key = "${USPS_API_KEY}"`. Resolution runs on the raw TOML tree before
//! deserialization, so any string field may use a reference.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Resolve `${VAR}` references within every string value of the tree.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] for a reference to an unset variable or
/// an unterminated `${`.
pub fn resolve_env_references<S: BuildHasher>(
    val: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<()> {
    match val {
        toml::Value::String(s) => {
            *s = resolve_string_refs(s, env_vars)?;
        },
        toml::Value::Table(table) => {
            for (_, child) in table.iter_mut() {
                resolve_env_references(child, env_vars)?;
            }
        },
        toml::Value::Array(arr) => {
            for child in arr.iter_mut() {
                resolve_env_references(child, env_vars)?;
            }
        },
        _ => {},
    }
    Ok(())
}

/// Replace `${VAR}` references in a string with their values.
fn resolve_string_refs<S: BuildHasher>(
    input: &str,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start.saturating_add(2)..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::EnvError {
                var_name: after.to_owned(),
                message: "unterminated ${ reference".to_owned(),
            });
        };
        let var_name = &after[..end];
        let Some(value) = env_vars.get(var_name) else {
            return Err(ConfigError::EnvError {
                var_name: var_name.to_owned(),
                message: "referenced in config but not set".to_owned(),
            });
        };
        debug!(var = var_name, "resolved env var reference in config");
        result.push_str(value);
        rest = &after[end.saturating_add(1)..];
    }
    result.push_str(rest);

    Ok(result)
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
