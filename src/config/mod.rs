//! Configuration for `hotdelta.toml`.
//!
//! # Structure
//!
//! ```text
//! hotdelta.toml
//! ├── [agent]   AgentSectionConfig - replay behavior
//! └── [log]     LogConfig - debug traces
//! ```
//!
//! Every field has a default, so an empty or missing file is valid.

mod error;
pub mod section;

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::ConfigError;
pub use section::{AgentSectionConfig, LogConfig};

/// Root configuration loaded from `hotdelta.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub agent: AgentSectionConfig,
    pub log: LogConfig,
}

impl AgentConfig {
    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                crate::debug!("config"; "{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(path.to_path_buf(), e)),
        }
    }
}
