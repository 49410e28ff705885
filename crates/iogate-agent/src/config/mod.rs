//! Configuration loading for the iogate binary.
//! Reads iogate.toml from the current directory or the path in the IOGATE_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// YAML, JSON or TOML reference tables; built-in tables when unset.
    #[serde(default)]
    pub tables_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String { "iogate=debug,info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "bool_true")]
    pub pretty: bool,
}

fn bool_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: bool_true() }
    }
}


impl Config {
    /// IOGATE_CONFIG if set, else iogate.toml in the current directory.
    pub fn path() -> PathBuf {
        std::env::var("IOGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("iogate.toml"))
    }

    /// Parse the file at `path`. `Ok(None)` when it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(Self::from_toml_str(&content)?))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// `--tables` wins over `[reference] tables_path`.
    pub fn tables_path<'a>(&'a self, cli_override: Option<&'a str>) -> Option<&'a str> {
        cli_override.or(self.reference.tables_path.as_deref())
    }
}
