use std::path::{Path, PathBuf};

use branchlog_core::DEFAULT_MAX_CHAIN_LENGTH;
use serde::Deserialize;

use crate::error::EngineError;

const DEFAULT_CONTEXT_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite database file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Versions allowed in one edit chain before it is treated as corrupt.
    pub max_chain_length: usize,
    /// Most recent path messages handed to the response generator.
    pub context_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_chain_length == 0 {
            return Err(EngineError::Config("max_chain_length must be at least 1".into()));
        }
        if self.context_window == 0 {
            return Err(EngineError::Config("context_window must be at least 1".into()));
        }
        Ok(())
    }
}
