//! TOML manifest describing a module set for the registry.
//!
//! # Example
//!
//! ```toml
//! [[module]]
//! name = "Core"
//! id = "5b0e5e4c-0a52-4c8b-9d6f-3f1f0b7f2a10"
//! types = [{ token = 33554434, name = "Core.Cache" }]
//! handlers = ["Core.CacheHandler"]
//!
//! [[module]]
//! name = "App"
//! id = "8c1b9f3e-5d4a-4f6e-9a1b-2c3d4e5f6a7b"
//! references = ["Core"]
//! instances = 2
//! handlers = ["App.Renderer"]
//!
//! [[handler]]
//! type = "App.Renderer"
//! hooks = ["UpdateApplication"]   # default: both hooks
//! fail = []                       # hooks that return an error when invoked
//! ```
//!
//! Handler bodies record their invocations in a [`Journal`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use thiserror::Error;

use super::{
    CLEAR_CACHE, HandlerMethod, ModuleHandle, ModuleRegistry, ModuleSpec, RuntimeError,
    UPDATE_APPLICATION,
};
use crate::core::{ModuleId, TypeRef};

/// Manifest-related errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("manifest parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("manifest validation error: {0}")]
    Validation(String),
}

// =============================================================================
// Schema
// =============================================================================

/// Root of a module manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,

    #[serde(default, rename = "handler")]
    pub handlers: Vec<HandlerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleEntry {
    pub name: String,

    /// Modules without an id are loaded but never patched.
    #[serde(default)]
    pub id: Option<ModuleId>,

    #[serde(default)]
    pub references: Vec<String>,

    /// Instances loaded before the batch.
    #[serde(default = "default_instances")]
    pub instances: usize,

    #[serde(default)]
    pub types: Vec<TypeEntry>,

    /// Handler types declared by this module.
    #[serde(default)]
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeEntry {
    pub token: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerEntry {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default = "default_hooks")]
    pub hooks: Vec<String>,

    #[serde(default)]
    pub fail: Vec<String>,
}

fn default_instances() -> usize {
    1
}

fn default_hooks() -> Vec<String> {
    vec![CLEAR_CACHE.to_string(), UPDATE_APPLICATION.to_string()]
}

// =============================================================================
// Journal
// =============================================================================

/// Ordered record of handler invocations (`Type.Hook` plus updated types).
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub handler: String,
    pub hook: String,
    pub updated: Vec<String>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, handler: &str, hook: &str, updated: &[TypeRef]) {
        self.entries.lock().push(JournalEntry {
            handler: handler.to_string(),
            hook: hook.to_string(),
            updated: updated.iter().map(ToString::to_string).collect(),
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }
}

// =============================================================================
// Loading
// =============================================================================

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|e| ManifestError::Io(path.to_path_buf(), e))?;
        Self::parse(&text)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let mut names = FxHashSet::default();
        for module in &self.modules {
            if !names.insert(module.name.as_str()) {
                return Err(ManifestError::Validation(format!(
                    "module `{}` is declared twice",
                    module.name
                )));
            }
        }

        for handler in &self.handlers {
            for hook in handler.hooks.iter().chain(&handler.fail) {
                if hook != CLEAR_CACHE && hook != UPDATE_APPLICATION {
                    return Err(ManifestError::Validation(format!(
                        "handler `{}` names unknown hook `{hook}` (allowed: {CLEAR_CACHE}, {UPDATE_APPLICATION})",
                        handler.type_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register every module and handler type into `registry`.
    ///
    /// Handler bodies append to `journal`; hooks listed under `fail` return an error.
    pub fn install(&self, registry: &ModuleRegistry, journal: &Arc<Journal>) {
        let explicit: FxHashMap<&str, &HandlerEntry> = self
            .handlers
            .iter()
            .map(|h| (h.type_name.as_str(), h))
            .collect();

        let mut handler_types: Vec<&str> = Vec::new();
        for module in &self.modules {
            let mut spec = ModuleSpec::new(&module.name).references(module.references.iter().cloned());
            if let Some(id) = module.id {
                spec = spec.with_id(id);
            }
            for ty in &module.types {
                spec = spec.with_type(ty.token, &ty.name);
            }
            for handler in &module.handlers {
                spec = spec.with_handler(handler.as_str());
                if !handler_types.contains(&handler.as_str()) {
                    handler_types.push(handler.as_str());
                }
            }
            registry.register(spec);
        }

        for type_name in handler_types {
            let (hooks, fail) = match explicit.get(type_name) {
                Some(entry) => (entry.hooks.clone(), entry.fail.clone()),
                None => (default_hooks(), Vec::new()),
            };
            let methods = hooks
                .into_iter()
                .map(|hook| recording_hook(type_name, hook.clone(), fail.contains(&hook), journal))
                .collect();
            registry.register_handler(type_name, methods);
        }
    }

    /// Load the configured number of instances of every module, in manifest order.
    pub fn load_instances(&self, registry: &ModuleRegistry) -> Result<Vec<ModuleHandle>, RuntimeError> {
        let mut handles = Vec::new();
        for module in &self.modules {
            for _ in 0..module.instances {
                handles.push(registry.load(&module.name)?);
            }
        }
        Ok(handles)
    }
}

fn recording_hook(type_name: &str, hook: String, fail: bool, journal: &Arc<Journal>) -> HandlerMethod {
    let journal = Arc::clone(journal);
    let handler = type_name.to_string();
    let name = hook.clone();
    HandlerMethod::hook(name, move |updated: &[TypeRef]| {
        journal.record(&handler, &hook, updated);
        if fail {
            anyhow::bail!("{handler}.{hook} failed (configured in manifest)");
        }
        Ok(())
    })
}

// =============================================================================
// Tests
// =============================================================================
