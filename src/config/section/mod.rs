//! Configuration sections, one per `[table]` in `hotdelta.toml`.

mod agent;
mod log;

pub use agent::AgentSectionConfig;
pub use log::LogConfig;
