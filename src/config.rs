//! Trust store configuration management.
//!
//! This module handles loading and merging the trust store settings from
//! TOML files and environment variables. Settings can be specified in
//! multiple places with clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (loaded with [`TrustStoreConfig::from_file`])
//! 3. Environment variables (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! path = "/etc/ssl/private/truststore.p12"
//! password = "changeit"
//! format = "pkcs12"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Environment variable holding the trust store path.
pub const ENV_TRUSTSTORE_PATH: &str = "TRUSTSTORE_PATH";
/// Environment variable holding the trust store password.
pub const ENV_TRUSTSTORE_PASSWORD: &str = "TRUSTSTORE_PASSWORD";
/// Environment variable holding the trust store container format.
pub const ENV_TRUSTSTORE_FORMAT: &str = "TRUSTSTORE_FORMAT";

const DEFAULT_FORMAT: &str = "pkcs12";

/// Trust store settings for a file-backed certificate source.
///
/// All fields are optional to support partial configuration and merging.
/// An absent or blank `path` or `password` means "not configured": the
/// certificate source then yields an empty collection instead of failing.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrustStoreConfig {
    /// Filesystem path of the trust store file
    pub path: Option<String>,
    /// Password protecting the trust store
    pub password: Option<String>,
    /// Container format: "pkcs12" (default) or "pem"
    pub format: Option<String>,
}

impl TrustStoreConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(TrustStoreConfig)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: TrustStoreConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Reads configuration from the `TRUSTSTORE_PATH`, `TRUSTSTORE_PASSWORD`
    /// and `TRUSTSTORE_FORMAT` environment variables.
    ///
    /// Unset variables yield `None` fields, so the result can be merged on
    /// top of file-based configuration.
    pub fn from_env() -> Self {
        TrustStoreConfig {
            path: env::var(ENV_TRUSTSTORE_PATH).ok(),
            password: env::var(ENV_TRUSTSTORE_PASSWORD).ok(),
            format: env::var(ENV_TRUSTSTORE_FORMAT).ok(),
        }
    }

    /// Creates a default configuration: no path, no password, "pkcs12" format.
    pub fn default() -> Self {
        TrustStoreConfig {
            path: None,
            password: None,
            format: Some(DEFAULT_FORMAT.to_string()),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    pub fn merge_with(mut self, other: TrustStoreConfig) -> Self {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.format.is_some() {
            self.format = other.format;
        }
        self
    }

    /// The configured path, or `None` when absent or blank.
    pub fn path(&self) -> Option<&str> {
        non_blank(&self.path)
    }

    /// The configured password, or `None` when absent or blank.
    pub fn password(&self) -> Option<&str> {
        non_blank(&self.password)
    }

    /// The configured container format, falling back to "pkcs12" when
    /// absent or blank.
    pub fn format(&self) -> &str {
        non_blank(&self.format).unwrap_or(DEFAULT_FORMAT)
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// Useful for bootstrapping a new configuration file.
    pub fn example_toml() -> String {
        let example = TrustStoreConfig {
            path: Some("/etc/ssl/private/truststore.p12".to_string()),
            password: Some("changeit".to_string()),
            format: Some(DEFAULT_FORMAT.to_string()),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v.as_str()),
        _ => None,
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
