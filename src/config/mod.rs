mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use loader::{load_config, parse_config};

/// Searched in order when no config path is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["config.yaml", "config.yml", "config/config.yaml"];

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Selection strategy name (e.g. "RoundRobin")
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Services to be load balanced; replicas are flattened in order
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

/// A named service and its backend replicas
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Replica addresses in `scheme://host:port` form
    #[serde(default)]
    pub replicas: Vec<String>,
}

/// Upstream client settings shared by every backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardingConfig {
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Seconds to wait for the response head; unset means no timeout
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

fn default_strategy() -> String {
    "RoundRobin".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pool_max_idle() -> usize {
    10
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            timeout_seconds: None,
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Parse configuration from an in-memory YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        parse_config(content)
    }

    /// Load configuration from `config_path`, or from the first default
    /// location under the working directory when no path is given
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => Self::load_from_dir(Path::new(".")),
        }
    }

    /// Load the first of [`DEFAULT_CONFIG_PATHS`] that exists under `base`
    pub fn load_from_dir(base: &Path) -> Result<Self, ConfigError> {
        for candidate in DEFAULT_CONFIG_PATHS {
            let path = base.join(candidate);
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Err(ConfigError::NotFound(format!(
            "No config file found in {}. Tried: {}",
            base.display(),
            DEFAULT_CONFIG_PATHS.join(", ")
        )))
    }

    /// Total number of replica addresses across all services
    pub fn replica_count(&self) -> usize {
        self.services.iter().map(|s| s.replicas.len()).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}
