//! Configuration management for wptagent-image
//!
//! Config is JSON with comments allowed (parsed with jsonc-parser). A
//! missing file means defaults; an unreadable or invalid one is an error.

pub mod paths;
pub mod schema;
pub mod validation;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use paths::{CONFIG_PATH_ENV, get_config_dir, get_config_path};
pub use schema::{Config, join_image_path};
pub use validation::{
    ValidationError, ValidationWarning, display_validation_error, display_validation_warning,
    validate_config,
};

/// Errors loading or saving the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config in {path}: {message}")]
    Schema { path: PathBuf, message: String },
}

/// Load the config from an explicit path
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &text)
}

/// Load the config from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    load_config_from(&path)
}

/// Load the config, falling back to defaults when no file exists
pub fn load_config_or_default() -> Result<Config, ConfigError> {
    let Some(path) = get_config_path() else {
        debug!("No config directory available, using defaults");
        return Ok(Config::default());
    };
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    load_config_from(&path)
}

/// Write the config as pretty JSON, creating parent directories
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut json = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    json.push('\n');
    fs::write(path, json).map_err(write_err)
}

fn parse_config(path: &Path, text: &str) -> Result<Config, ConfigError> {
    let value = jsonc_parser::parse_to_serde_value(text, &Default::default())
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| ConfigError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
