//! `[agent]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [agent]
//! replay_on_load = true   # Replay cached deltas into late-loaded modules
//! ```
//!
//! With `replay_on_load = false`, modules loaded after a batch keep their
//! unpatched code. Loads still refresh the handler registry.

use serde::{Deserialize, Serialize};

/// Hot reload agent settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSectionConfig {
    /// Replay cached deltas into modules loaded after the batch.
    pub replay_on_load: bool,
}

impl Default for AgentSectionConfig {
    fn default() -> Self {
        Self {
            replay_on_load: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AgentConfig;

    #[test]
    fn test_agent_config() {
        let config = AgentConfig::parse("[agent]\nreplay_on_load = false").unwrap();
        assert!(!config.agent.replay_on_load);
    }

    #[test]
    fn test_agent_config_defaults() {
        let config = AgentConfig::parse("").unwrap();
        assert!(config.agent.replay_on_load);
    }

    #[test]
    fn test_agent_config_rejects_unknown_field() {
        assert!(AgentConfig::parse("[agent]\nreplay = true").is_err());
    }
}
