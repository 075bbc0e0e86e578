//! `[log]` section configuration.
//!
//! ```toml
//! [log]
//! verbose = false   # Print debug traces
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Enable `debug!` traces. `--verbose` on the command line also turns this on.
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use crate::config::AgentConfig;

    #[test]
    fn test_log_config() {
        let config = AgentConfig::parse("[log]\nverbose = true").unwrap();
        assert!(config.log.verbose);
    }

    #[test]
    fn test_log_config_defaults() {
        assert!(!AgentConfig::parse("").unwrap().log.verbose);
    }
}
