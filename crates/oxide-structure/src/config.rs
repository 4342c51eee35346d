//! Convergence configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StructureError};

/// Settings shared by every table a [`crate::builder::Structure`] converges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Engine used when none is requested.
    pub default_engine: String,
    /// Engine used when the default engine is unavailable.
    pub fallback_engine: String,
    /// Character set for new tables.
    pub default_encoding: String,
    /// Prefix prepended to every table name.
    pub prefix: String,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            default_engine: "InnoDB".to_string(),
            fallback_engine: "MyISAM".to_string(),
            default_encoding: "utf8mb4".to_string(),
            prefix: String::new(),
        }
    }
}

impl StructureConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default engine.
    #[must_use]
    pub fn default_engine(mut self, engine: impl Into<String>) -> Self {
        self.default_engine = engine.into();
        self
    }

    /// Sets the table-name prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Loads a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| StructureError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if config.default_engine.trim().is_empty() {
            return Err(StructureError::Config {
                path: path.to_path_buf(),
                message: "default_engine must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}
