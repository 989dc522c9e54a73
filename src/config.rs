use crate::error::{BronzeError, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "bronze.toml";

/// Job configuration. Only `source_file` has no default.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source_file: String,
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_warehouse_dir")]
    pub warehouse_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_catalog() -> String {
    "retail_demo".to_string()
}

fn default_namespace() -> String {
    "bronze".to_string()
}

fn default_warehouse_dir() -> PathBuf {
    PathBuf::from("warehouse")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Configuration with defaults for everything except the source locator.
    pub fn for_source(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            catalog: default_catalog(),
            namespace: default_namespace(),
            warehouse_dir: default_warehouse_dir(),
            log_dir: default_log_dir(),
            metrics_addr: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BronzeError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("source_file", self.source_file.as_str()),
            ("catalog", self.catalog.as_str()),
            ("namespace", self.namespace.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(BronzeError::Config(format!("'{}' must not be empty", key)));
            }
        }
        Ok(())
    }
}
