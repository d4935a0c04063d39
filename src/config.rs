//! Service configuration, resolved once at startup and passed down.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

use crate::fhir::{ComponentCodes, LOINC_SYSTEM};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub coding: CodingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: "sleep_data.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ApiConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidValue {
            name: "api.host",
            value: self.host.clone(),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Code table for the coded observation bundle. Entries listed here replace
/// the defaults label by label.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodingConfig {
    pub system: String,
    pub codes: BTreeMap<String, String>,
}

impl Default for CodingConfig {
    fn default() -> Self {
        CodingConfig {
            system: LOINC_SYSTEM.to_string(),
            codes: BTreeMap::new(),
        }
    }
}

impl CodingConfig {
    pub fn component_codes(&self) -> ComponentCodes {
        let mut codes = ComponentCodes::default_codes();
        codes.extend(self.codes.iter().map(|(k, v)| (k.clone(), v.clone())));
        ComponentCodes::new(self.system.clone(), codes)
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Applies `PORT`, when set, over the configured API port.
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Config, ConfigError> {
        if let Some(port) = port {
            self.api.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port.to_string(),
            })?;
        }
        Ok(self)
    }
}

/// Loads the YAML config at `path` and applies the `PORT` override.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path)?.with_port_override(std::env::var("PORT").ok().as_deref())
}

/// Reads the YAML config at `path`, falling back to defaults when the file
/// does not exist.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Config::from_yaml(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}
