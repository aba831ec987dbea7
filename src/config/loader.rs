use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from YAML text
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
}
