use std::fs;
use std::path::Path;

use streamwatch_types::{AppConfig, ConfigError, ServerEntry};

use crate::error::AppResult;

/// Load and validate the configuration file.
///
/// A missing file, malformed YAML, a missing `servers` section or any invalid
/// value rejects the whole file.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::NotFound { path: display }.into());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::parse(&display, &e))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::parse(&display, &e))?;

    if value.get("servers").is_none() {
        return Err(ConfigError::ParseError {
            path: display,
            message: "missing 'servers' section".to_string(),
        }
        .into());
    }

    let config: AppConfig =
        serde_yaml::from_value(value).map_err(|e| ConfigError::parse(&display, &e))?;
    config.check()?;
    Ok(config)
}

/// Like `load_config`, but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> AppResult<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::warn!("[Config] {} not found, using defaults", path.display());
        Ok(AppConfig::default())
    }
}

/// Only the server declarations of the configuration file.
pub fn load_server_entries(path: &Path) -> AppResult<Vec<ServerEntry>> {
    Ok(load_config(path)?.servers)
}
