//! Runtime capabilities the agent consumes.
//!
//! The agent never loads, owns or rewrites modules itself. Everything it needs
//! from the host runtime goes through [`Runtime`]:
//!
//! | Capability               | Method                                   |
//! |--------------------------|------------------------------------------|
//! | load notifications       | `subscribe_loads` / `unsubscribe_loads`  |
//! | loaded module snapshot   | `loaded_modules`                         |
//! | module identifier        | `module_id`                              |
//! | dependency references    | `module_name` / `module_references`      |
//! | handler discovery        | `handler_declarations` / `handler_methods` |
//! | type token resolution    | `resolve_type`                           |
//! | patch primitive          | `apply_patch`                            |
//!
//! # Modules
//!
//! - `handler` - Handler declarations, methods and signature-checked lookup
//! - `registry` - In-memory runtime built by registration
//! - `manifest` - TOML manifest loader for the registry

pub mod handler;
pub mod manifest;
pub mod registry;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use thiserror::Error;

use crate::core::{Delta, ModuleId, TypeRef, TypeToken};

pub use handler::{
    CLEAR_CACHE, DeclarationArg, HandlerDeclaration, HandlerFn, HandlerMethod, HandlerType,
    MethodLookup, MethodSignature, ParamType, Receiver, ReturnType, UPDATE_APPLICATION,
    UPDATE_HANDLER_DECLARATION, resolve_handler_method,
};
pub use registry::{ModuleHandle, ModuleRegistry, ModuleSpec};

/// Errors reported by runtime capabilities.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("patch rejected by `{module}`: {reason}")]
    PatchRejected { module: String, reason: String },

    #[error("module `{0}` is not registered")]
    UnknownModule(String),

    #[error("identifier of `{0}` is unavailable")]
    IdentifierUnavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Handle returned by [`Runtime::subscribe_loads`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked once per module load, on the loading thread.
pub type LoadCallback<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Host runtime as seen by the agent.
pub trait Runtime: Send + Sync + 'static {
    /// Handle to one loaded module instance.
    ///
    /// Equality is instance identity: two loads of the same build are
    /// different handles with the same [`ModuleId`].
    type Module: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn subscribe_loads(&self, callback: LoadCallback<Self::Module>) -> SubscriptionId;

    fn unsubscribe_loads(&self, id: SubscriptionId);

    /// Snapshot of modules loaded at call time, in load order.
    fn loaded_modules(&self) -> Vec<Self::Module>;

    /// Identifier of the module's build; `Ok(None)` if it has none.
    fn module_id(&self, module: &Self::Module) -> Result<Option<ModuleId>, RuntimeError>;

    fn module_name(&self, module: &Self::Module) -> String;

    /// Names of the modules this module references.
    fn module_references(&self, module: &Self::Module) -> Vec<String>;

    fn handler_declarations(&self, module: &Self::Module) -> Vec<HandlerDeclaration>;

    fn handler_methods(&self, handler: &HandlerType) -> Vec<HandlerMethod>;

    fn resolve_type(&self, module: &Self::Module, token: TypeToken) -> Option<TypeRef>;

    /// Physically apply one delta to one module instance.
    fn apply_patch(&self, module: &Self::Module, delta: &Delta) -> Result<(), RuntimeError>;
}
