//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_re_engine::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// CSV captures, loaded in order
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub dbc_file: Option<PathBuf>,
    pub json_file: Option<PathBuf>,
    /// Transmitter node written into the DBC
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// Include the per-message statistics table in the text report
    #[serde(default = "default_true")]
    pub include_statistics: bool,
}

fn default_node_name() -> String {
    "RE".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dbc_file: None,
            json_file: None,
            node_name: default_node_name(),
            include_statistics: true,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .analysis
        .validate()
        .with_context(|| format!("Invalid [analysis] section in {:?}", path))?;

    Ok(config)
}
