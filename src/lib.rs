//! hotdelta - live code-patch distribution.
//!
//! Applies metadata/code deltas to every loaded instance of a module, caches
//! them so modules loaded later receive the same patches, and notifies update
//! handlers in dependency order (every `ClearCache` before any
//! `UpdateApplication`).
//!
//! ```ignore
//! let registry = Arc::new(ModuleRegistry::new());
//! let agent = HotReloadAgent::new(registry.clone(), Arc::new(TerminalSink), Default::default());
//! agent.apply_deltas(&read_batch(path)?);
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod logger;
pub mod runtime;

pub use agent::HotReloadAgent;
pub use config::AgentConfig;
pub use crate::core::{Delta, ModuleId, TypeRef, TypeToken};
pub use logger::{LogSink, MemorySink, TerminalSink};
pub use runtime::{ModuleRegistry, Runtime};
