//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compress::CompressConfig;
use crate::error::{LinkmeshError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Payload compression configuration
    #[serde(default)]
    pub compression: CompressConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LinkmeshError::Config(format!("failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| LinkmeshError::Config(format!("failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("LINKMESH_COMPRESS_MODEL") {
            config.compression.model = model;
        }
        if let Ok(level) = std::env::var("LINKMESH_COMPRESS_LEVEL") {
            if let Ok(level) = level.parse() {
                config.compression.level = level;
            }
        }
        if let Ok(threshold) = std::env::var("LINKMESH_COMPRESS_THRESHOLD") {
            if let Ok(threshold) = threshold.parse() {
                config.compression.threshold = threshold;
            }
        }

        config
    }
}
