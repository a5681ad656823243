//! Configuration loading.
//!
//! Process settings come from `ROBOKIT_*` environment variables with
//! defaults; invalid values fall back to defaults without crashing. The
//! robot's services are described in a TOML file.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ROBOKIT_CONFIG` | `robot.toml` | Robot config file |
//! | `ROBOKIT_LOG_LEVEL` | `info` | Log filter directive |
//! | `ROBOKIT_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `ROBOKIT_LOG_FILE` | unset | Log file (stderr when unset) |
//!
//! # Robot file
//!
//! ```toml
//! [[services]]
//! name = "vision1"
//! type = "vision"
//!
//! [[services.attributes.register_models]]
//! name = "red"
//! type = "color_detector"
//! parameters = { detect_color = "#ff0000" }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::telemetry::{LogConfig, LogFormat};
use crate::vision::{self, VisionAttributes};

const DEFAULT_CONFIG_PATH: &str = "robot.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse robot config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid robot config: {0}")]
    Validation(String),
}

/// Process settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: PathBuf,
    pub log: LogConfig,
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => default.to_string(),
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let format = std::env::var("ROBOKIT_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    let output_path = std::env::var("ROBOKIT_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    LogConfig {
        format,
        level: env_or("ROBOKIT_LOG_LEVEL", &defaults.level),
        output_path,
    }
}

/// Load all process settings from environment variables.
pub fn load_env() -> EnvConfig {
    EnvConfig {
        config_path: PathBuf::from(env_or("ROBOKIT_CONFIG", DEFAULT_CONFIG_PATH)),
        log: load_log_config(),
    }
}

/// One configured service instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub attributes: toml::Table,
}

impl ServiceConfig {
    /// Decode the attributes as a vision service's.
    pub fn vision_attributes(&self) -> Result<VisionAttributes, ConfigError> {
        toml::Value::Table(self.attributes.clone())
            .try_into()
            .map_err(|e: toml::de::Error| {
                ConfigError::Validation(format!("service {:?}: {}", self.name, e))
            })
    }
}

/// The services a robot runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl RobotConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse and validate a robot config.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Service names must be non-empty and unique, and types known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.trim().is_empty() {
                return Err(ConfigError::Validation("service with empty name".into()));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate service name {:?}",
                    service.name
                )));
            }
            if service.service_type != vision::SUBTYPE_NAME {
                return Err(ConfigError::Validation(format!(
                    "service {:?} has unknown type {:?}",
                    service.name, service.service_type
                )));
            }
        }
        Ok(())
    }
}
