// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Run configuration for one ingestion pass. Every knob is explicit; nothing
/// is resolved relative to the process working directory at run time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// CSV extract to ingest.
    pub source_path: PathBuf,
    /// SQLite database file holding the destination table.
    pub db_path: PathBuf,
    /// Destination table identifier.
    pub table_name: String,
    /// Substring that identifies the fiscal-period-end column among the
    /// reconstructed names.
    pub fiscal_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_path: PathBuf::from("data/filings.csv"),
            db_path: PathBuf::from("filings.db"),
            table_name: "filings".to_string(),
            fiscal_marker: "fy_ending".to_string(),
        }
    }
}

impl Config {
    /// Load a config from a YAML file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }
}
