//! Layered application configuration.
//!
//! Settings come from a TOML file, overridden by `LINKBOARD__`-prefixed
//! environment variables (e.g. `LINKBOARD__BACKEND_URL`). Command line flags
//! are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::http::DEFAULT_BACKEND_URL;
use crate::provider::BackendConfig;
use crate::store::FileStore;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "LINKBOARD";

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "linkboard.toml";

/// Errors raised while loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ::config::ConfigError),

    /// The configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// IO error while writing the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the integrations backend
    pub backend_url: String,
    /// Credential store file; defaults to the user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// User identifier sent with authorization requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Organization identifier sent with authorization requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Authorization window liveness poll, in milliseconds
    pub poll_interval_ms: u64,
    /// Shell connectivity check interval, in milliseconds
    pub shell_interval_ms: u64,
    /// Delay between a success notification and the success callback
    pub success_delay_ms: u64,
    /// Per-request backend timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            store_path: None,
            user: None,
            org: None,
            poll_interval_ms: 200,
            shell_interval_ms: 2000,
            success_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Default config file location, e.g. `~/.config/linkboard/linkboard.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("linkboard").join(CONFIG_FILE_NAME))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(default) = Self::default_path() {
                    builder = builder.add_source(
                        File::from(default)
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend_url must not be empty".to_string()));
        }
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("shell_interval_ms", self.shell_interval_ms),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Credential store location.
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(FileStore::default_path)
    }

    /// Window liveness poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Shell connectivity check interval.
    pub fn shell_interval(&self) -> Duration {
        Duration::from_millis(self.shell_interval_ms)
    }

    /// Delay before the success callback.
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_delay_ms)
    }

    /// Settings for the HTTP backend client.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(self.backend_url.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}
