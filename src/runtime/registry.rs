//! In-memory runtime built by registration.
//!
//! Modules and handler types are registered up front; `load` creates a new
//! module instance and fires load notifications. Patches are recorded per
//! instance instead of rewriting code, which makes the registry the reference
//! host for tests and for `hotdelta simulate`.
//!
//! ```ignore
//! let registry = ModuleRegistry::new();
//! registry.register(ModuleSpec::new("App").with_id(id).references(["Core"]));
//! registry.register_handler("App.Cache", vec![HandlerMethod::hook(CLEAR_CACHE, |_| Ok(()))]);
//! let app = registry.load("App")?;
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::{
    HandlerDeclaration, HandlerMethod, HandlerType, LoadCallback, Runtime, RuntimeError,
    SubscriptionId,
};
use crate::core::{Delta, ModuleId, TypeRef, TypeToken};

// =============================================================================
// Module description
// =============================================================================

/// Static description of a module build.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    pub name: String,
    /// `None` for modules without an identifier concept.
    pub id: Option<ModuleId>,
    /// Reading the identifier fails instead of returning it.
    pub id_unreadable: bool,
    pub references: Vec<String>,
    pub types: Vec<(TypeToken, String)>,
    pub declarations: Vec<HandlerDeclaration>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: ModuleId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_unreadable_id(mut self) -> Self {
        self.id_unreadable = true;
        self
    }

    pub fn references<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_type(mut self, token: impl Into<TypeToken>, name: impl Into<String>) -> Self {
        self.types.push((token.into(), name.into()));
        self
    }

    /// Declare `handler` as an update handler of this module.
    pub fn with_handler(self, handler: impl Into<Arc<str>>) -> Self {
        self.with_declaration(HandlerDeclaration::update_handler(handler))
    }

    pub fn with_declaration(mut self, declaration: HandlerDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }
}

// =============================================================================
// Module handle
// =============================================================================

/// One loaded instance of a registered module.
///
/// Compares by instance, so two loads of the same module are distinct.
#[derive(Clone)]
pub struct ModuleHandle {
    instance: u64,
    spec: Arc<ModuleSpec>,
}

impl ModuleHandle {
    #[inline]
    pub fn instance(&self) -> u64 {
        self.instance
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[inline]
    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }
}

impl PartialEq for ModuleHandle {
    fn eq(&self, other: &Self) -> bool {
        self.instance == other.instance
    }
}

impl Eq for ModuleHandle {}

impl Hash for ModuleHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance.hash(state);
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.spec.name, self.instance)
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registration-based [`Runtime`].
#[derive(Default)]
pub struct ModuleRegistry {
    specs: RwLock<FxHashMap<String, Arc<ModuleSpec>>>,
    handlers: RwLock<FxHashMap<HandlerType, Vec<HandlerMethod>>>,
    loaded: RwLock<Vec<ModuleHandle>>,
    patches: DashMap<u64, Vec<Delta>>,
    rejected: DashSet<String>,
    subscribers: Mutex<Vec<(SubscriptionId, LoadCallback<ModuleHandle>)>>,
    next_instance: AtomicU64,
    next_subscription: AtomicU64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a module description.
    pub fn register(&self, spec: ModuleSpec) {
        self.specs.write().insert(spec.name.clone(), Arc::new(spec));
    }

    /// Register (or replace) the methods of a handler type.
    pub fn register_handler(&self, handler: impl Into<Arc<str>>, methods: Vec<HandlerMethod>) {
        self.handlers
            .write()
            .insert(HandlerType::new(handler), methods);
    }

    /// Load a new instance of a registered module and notify subscribers.
    pub fn load(&self, name: &str) -> Result<ModuleHandle, RuntimeError> {
        let spec = self
            .specs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownModule(name.to_string()))?;

        let handle = ModuleHandle {
            instance: self.next_instance.fetch_add(1, Ordering::Relaxed),
            spec,
        };
        self.loaded.write().push(handle.clone());
        self.notify(&handle);
        Ok(handle)
    }

    /// Fire the load notification again for an already loaded instance.
    pub fn reload(&self, handle: &ModuleHandle) {
        self.notify(handle);
    }

    /// Deltas applied to `handle`, in application order.
    pub fn patches(&self, handle: &ModuleHandle) -> Vec<Delta> {
        self.patches
            .get(&handle.instance)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Make the patch primitive fail (or succeed again) for every instance of `name`.
    pub fn reject_patches(&self, name: &str, reject: bool) {
        if reject {
            self.rejected.insert(name.to_string());
        } else {
            self.rejected.remove(name);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Callbacks run outside the subscriber lock so they may call back into the registry.
    fn notify(&self, handle: &ModuleHandle) {
        let callbacks: Vec<_> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(handle);
        }
    }
}

impl Runtime for ModuleRegistry {
    type Module = ModuleHandle;

    fn subscribe_loads(&self, callback: LoadCallback<ModuleHandle>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, callback));
        id
    }

    fn unsubscribe_loads(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|(sub, _)| *sub != id);
    }

    fn loaded_modules(&self) -> Vec<ModuleHandle> {
        self.loaded.read().clone()
    }

    fn module_id(&self, module: &ModuleHandle) -> Result<Option<ModuleId>, RuntimeError> {
        if module.spec.id_unreadable {
            return Err(RuntimeError::IdentifierUnavailable(module.spec.name.clone()));
        }
        Ok(module.spec.id)
    }

    fn module_name(&self, module: &ModuleHandle) -> String {
        module.spec.name.clone()
    }

    fn module_references(&self, module: &ModuleHandle) -> Vec<String> {
        module.spec.references.clone()
    }

    fn handler_declarations(&self, module: &ModuleHandle) -> Vec<HandlerDeclaration> {
        module.spec.declarations.clone()
    }

    fn handler_methods(&self, handler: &HandlerType) -> Vec<HandlerMethod> {
        self.handlers
            .read()
            .get(handler)
            .cloned()
            .unwrap_or_default()
    }

    fn resolve_type(&self, module: &ModuleHandle, token: TypeToken) -> Option<TypeRef> {
        let id = module.spec.id?;
        module
            .spec
            .types
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(t, name)| TypeRef::new(id, *t, name.as_str()))
    }

    fn apply_patch(&self, module: &ModuleHandle, delta: &Delta) -> Result<(), RuntimeError> {
        if self.rejected.contains(&module.spec.name) {
            return Err(RuntimeError::PatchRejected {
                module: module.to_string(),
                reason: "patch primitive failed".into(),
            });
        }
        self.patches
            .entry(module.instance)
            .or_default()
            .push(delta.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
