//! JSON-based configuration.
//!
//! Supports a config file (longjrm.json) with environment variable
//! expansion. The descriptor wire format is JSON, so the config file
//! is too.
//!
//! Example configuration:
//! ```json
//! {
//!   "connections": {
//!     "warehouse": {
//!       "type": "postgres",
//!       "host": "db.internal", "port": 5432,
//!       "user": "app", "password": "${WAREHOUSE_PASSWORD}",
//!       "database": "orders"
//!     },
//!     "scratch": { "type": "sqlite", "database": ":memory:" }
//!   },
//!   "default_connection": "warehouse",
//!   "connect_timeout": 10,
//!   "fetch_limit": 1000,
//!   "min_pool_size": 1,
//!   "max_pool_size": 10,
//!   "max_cached": 4,
//!   "pool_timeout": 30
//! }
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::connection::ConnectionDescriptor;
use crate::error::JrmError;

/// Which pool backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolBackend {
    /// Pre-allocated pool with liveness probing and idle recycling.
    #[default]
    Eager,
    /// Soft pool; connections are reset to autocommit on return.
    Cached,
}

/// Root configuration: named connection descriptors plus the knobs
/// every operation consults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JrmConfig {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionDescriptor>,

    /// Name used when the caller does not pick one.
    pub default_connection: Option<String>,

    /// Connect timeout, seconds.
    pub connect_timeout: u64,

    /// Cap applied to query results when the caller sets none.
    pub fetch_limit: u64,

    /// Eager pool: connections kept ready.
    pub min_pool_size: u32,

    /// Eager pool: hard ceiling.
    pub max_pool_size: u32,

    /// Cached pool: idle connections retained on return.
    pub max_cached: usize,

    /// Checkout timeout, seconds.
    pub pool_timeout: u64,

    /// Eager pool: recycle connections idle longer than this, seconds.
    pub idle_timeout: u64,

    /// Pool backend selection.
    pub pool_backend: PoolBackend,
}

impl Default for JrmConfig {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            default_connection: None,
            connect_timeout: 10,
            fetch_limit: 1000,
            min_pool_size: 1,
            max_pool_size: 10,
            max_cached: 4,
            pool_timeout: 30,
            idle_timeout: 600,
            pool_backend: PoolBackend::Eager,
        }
    }
}

impl JrmConfig {
    /// Parse from a JSON string, expanding `${ENV_VAR}` references.
    pub fn from_json_str(json: &str) -> Result<Self, JrmError> {
        let expanded = expand_env_vars(json)?;
        let config: JrmConfig = serde_json::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, JrmError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(JrmError::FileNotFound(path.to_path_buf()));
        }
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// A config holding a single descriptor, for programmatic setup.
    pub fn single(name: impl Into<String>, descriptor: ConnectionDescriptor) -> Self {
        let name = name.into();
        let mut config = Self::default();
        config.connections.insert(name.clone(), descriptor);
        config.default_connection = Some(name);
        config
    }

    fn validate(&self) -> Result<(), JrmError> {
        for (name, descriptor) in &self.connections {
            descriptor
                .validate()
                .map_err(|e| JrmError::Config(format!("connection {name:?}: {e}")))?;
        }
        if let Some(name) = &self.default_connection {
            if !self.connections.contains_key(name) {
                return Err(JrmError::Config(format!(
                    "default connection {name:?} is not defined"
                )));
            }
        }
        Ok(())
    }

    /// Resolve a descriptor by name, falling back to the default.
    pub fn connection(&self, name: Option<&str>) -> Result<&ConnectionDescriptor, JrmError> {
        let name = name
            .or(self.default_connection.as_deref())
            .ok_or_else(|| JrmError::Config("no connection name and no default".into()))?;
        self.connections
            .get(name)
            .ok_or_else(|| JrmError::Config(format!("unknown connection {name:?}")))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Expand `${VAR}` references from the process environment. Unset
/// variables are an error, not an empty string.
pub fn expand_env_vars(input: &str) -> Result<String, JrmError> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(JrmError::Config(format!(
            "missing environment variable {name}"
        ))),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::connection::BackendType;

    #[test]
    fn defaults_are_sane() {
        let config = JrmConfig::default();
        assert_eq!(config.fetch_limit, 1000);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.pool_backend, PoolBackend::Eager);
    }

    #[test]
    fn parse_and_resolve() {
        let config = JrmConfig::from_json_str(
            r#"{
                "connections": {
                    "main": { "type": "sqlite", "database": ":memory:" }
                },
                "default_connection": "main",
                "fetch_limit": 50
            }"#,
        )
        .unwrap();
        assert_eq!(config.fetch_limit, 50);
        let d = config.connection(None).unwrap();
        assert_eq!(d.backend, BackendType::Sqlite);
        assert!(config.connection(Some("nope")).is_err());
    }

    #[test]
    fn unknown_default_rejected() {
        let err = JrmConfig::from_json_str(r#"{"default_connection": "ghost"}"#).unwrap_err();
        assert!(matches!(err, JrmError::Config(_)));
    }

    #[test]
    fn env_expansion() {
        env::set_var("JRM_TEST_PASSWORD", "hunter2");
        let out = expand_env_vars(r#"{"password": "${JRM_TEST_PASSWORD}"}"#).unwrap();
        assert_eq!(out, r#"{"password": "hunter2"}"#);
        assert!(expand_env_vars("${JRM_TEST_UNSET_VARIABLE}").is_err());
    }

    #[test]
    fn single_helper() {
        let config = JrmConfig::single("mem", ConnectionDescriptor::sqlite(":memory:"));
        assert!(config.connection(None).is_ok());
    }
}
