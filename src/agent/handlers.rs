//! Handler discovery and the two-pass notification.
//!
//! # Architecture
//!
//! ```text
//! loaded modules ──sort──► [Core, Ui, App]
//!                              │ declarations named MetadataUpdateHandler
//!                              ▼
//! UpdateHandlerActions
//! ├── clear_cache:        Core.X.ClearCache, App.Y.ClearCache, ...
//! └── update_application: Core.X.UpdateApplication, Ui.Z.UpdateApplication, ...
//! ```
//!
//! Notification runs the whole clear-cache list before the first
//! update-application action. Each action contains its own failures.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::error::ActionError;
use super::sort::sort_modules;
use crate::core::TypeRef;
use crate::logger::LogSink;
use crate::runtime::{
    CLEAR_CACHE, HandlerFn, HandlerType, MethodLookup, Runtime, UPDATE_APPLICATION,
    resolve_handler_method,
};

// =============================================================================
// Hooks and actions
// =============================================================================

/// The two hooks a handler type may provide, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    ClearCache,
    UpdateApplication,
}

impl Hook {
    pub const ALL: [Hook; 2] = [Hook::ClearCache, Hook::UpdateApplication];

    pub const fn method_name(self) -> &'static str {
        match self {
            Self::ClearCache => CLEAR_CACHE,
            Self::UpdateApplication => UPDATE_APPLICATION,
        }
    }
}

/// One discovered hook bound to its body.
#[derive(Clone)]
pub struct HandlerAction {
    module: String,
    handler: HandlerType,
    hook: Hook,
    body: HandlerFn,
}

impl HandlerAction {
    pub fn new(module: impl Into<String>, handler: HandlerType, hook: Hook, body: HandlerFn) -> Self {
        Self {
            module: module.into(),
            handler,
            hook,
            body,
        }
    }

    /// Declaring module.
    #[inline]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[inline]
    pub fn handler(&self) -> &HandlerType {
        &self.handler
    }

    #[inline]
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Invoke the hook, capturing both returned errors and panics.
    pub fn invoke(&self, updated: &[TypeRef]) -> Result<(), ActionError> {
        crate::debug!("handlers"; "calling {}", self);

        match catch_unwind(AssertUnwindSafe(|| (self.body)(updated))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(ActionError::Failed {
                action: self.to_string(),
                error,
            }),
            Err(payload) => Err(ActionError::Panicked {
                action: self.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl fmt::Display for HandlerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.handler, self.hook.method_name())
    }
}

impl fmt::Debug for HandlerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerAction")
            .field("module", &self.module)
            .field("handler", &self.handler)
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

pub(super) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Action lists
// =============================================================================

/// Ordered action lists for one handler generation.
#[derive(Debug, Clone, Default)]
pub struct UpdateHandlerActions {
    clear_cache: Vec<HandlerAction>,
    update_application: Vec<HandlerAction>,
}

impl UpdateHandlerActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: HandlerAction) {
        match action.hook {
            Hook::ClearCache => self.clear_cache.push(action),
            Hook::UpdateApplication => self.update_application.push(action),
        }
    }

    pub fn clear_cache(&self) -> &[HandlerAction] {
        &self.clear_cache
    }

    pub fn update_application(&self) -> &[HandlerAction] {
        &self.update_application
    }

    pub fn is_empty(&self) -> bool {
        self.clear_cache.is_empty() && self.update_application.is_empty()
    }

    /// Run every clear-cache action, then every update-application action.
    ///
    /// A failing action is logged once and the remaining actions still run.
    pub fn notify(&self, updated: &[TypeRef], sink: &dyn LogSink) {
        crate::debug!("handlers"; "calling {} clear-cache and {} update handlers",
            self.clear_cache.len(), self.update_application.len());

        for action in self.clear_cache.iter().chain(&self.update_application) {
            if let Err(e) = action.invoke(updated) {
                sink.log(&e.to_string());
            }
        }
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Discover handlers across the loaded modules, in dependency order.
///
/// Malformed declarations and mismatched methods are logged and skipped.
pub fn build_handler_actions<R: Runtime>(runtime: &R, sink: &dyn LogSink) -> UpdateHandlerActions {
    crate::debug!("handlers"; "discovering metadata update handlers");

    let modules = runtime.loaded_modules();
    let sorted = sort_modules(
        &modules,
        |m| runtime.module_name(m),
        |m| runtime.module_references(m),
    );

    let mut actions = UpdateHandlerActions::new();
    for module in &sorted {
        let module_name = runtime.module_name(module);

        for declaration in runtime.handler_declarations(module) {
            if !declaration.is_update_handler() {
                continue;
            }

            let Some(handler) = declaration.handler_type() else {
                sink.log(&format!("'{declaration}' found with invalid arguments."));
                continue;
            };

            collect_handler_actions(runtime, &module_name, handler, &mut actions, sink);
        }
    }

    crate::debug!("handlers"; "found {} clear-cache and {} update handlers",
        actions.clear_cache.len(), actions.update_application.len());
    actions
}

fn collect_handler_actions<R: Runtime>(
    runtime: &R,
    module: &str,
    handler: &HandlerType,
    actions: &mut UpdateHandlerActions,
    sink: &dyn LogSink,
) {
    let methods = runtime.handler_methods(handler);
    let mut found = false;

    for hook in Hook::ALL {
        match resolve_handler_method(&methods, hook.method_name()) {
            MethodLookup::Found(method) => {
                crate::debug!("handlers"; "found handler {}.{}", handler, method);
                actions.push(HandlerAction::new(
                    module,
                    handler.clone(),
                    hook,
                    method.body().clone(),
                ));
                found = true;
            }
            MethodLookup::Mismatch(method) => {
                sink.log(&format!(
                    "Type '{handler}' has method '{method}' that does not match the required signature."
                ));
            }
            MethodLookup::Missing => {}
        }
    }

    if !found {
        sink.log(&format!(
            "No invokable methods found on metadata handler type '{handler}'. \
             Allowed methods are {CLEAR_CACHE}, {UPDATE_APPLICATION}"
        ));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::core::ModuleId;
    use crate::logger::MemorySink;
    use crate::runtime::{
        DeclarationArg, HandlerDeclaration, HandlerMethod, MethodSignature, ModuleRegistry,
        ModuleSpec, Receiver, UPDATE_HANDLER_DECLARATION,
    };

    type Calls = Arc<Mutex<Vec<String>>>;

    fn recording(calls: &Calls, label: &str) -> impl Fn(&[TypeRef]) -> anyhow::Result<()> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        let label = label.to_string();
        move |_: &[TypeRef]| {
            calls.lock().push(label.clone());
            Ok(())
        }
    }

    fn both_hooks(registry: &ModuleRegistry, calls: &Calls, handler: &str) {
        registry.register_handler(
            handler,
            vec![
                HandlerMethod::hook(CLEAR_CACHE, recording(calls, &format!("{handler}.ClearCache"))),
                HandlerMethod::hook(
                    UPDATE_APPLICATION,
                    recording(calls, &format!("{handler}.UpdateApplication")),
                ),
            ],
        );
    }

    /// App -> Ui -> Core, loaded in reverse dependency order.
    fn layered(calls: &Calls) -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("App").with_id(ModuleId::from_u128(3)).references(["Ui", "Core"]).with_handler("App.H"));
        registry.register(ModuleSpec::new("Ui").with_id(ModuleId::from_u128(2)).references(["Core"]).with_handler("Ui.H"));
        registry.register(ModuleSpec::new("Core").with_id(ModuleId::from_u128(1)).with_handler("Core.H"));
        for name in ["App", "Ui", "Core"] {
            both_hooks(&registry, calls, &format!("{name}.H"));
            registry.load(name).unwrap();
        }
        registry
    }

    #[test]
    fn test_actions_follow_dependency_order() {
        let calls = Calls::default();
        let registry = layered(&calls);
        let sink = MemorySink::new();

        let actions = build_handler_actions(&registry, &sink);
        let clear: Vec<_> = actions.clear_cache().iter().map(|a| a.module().to_string()).collect();
        let update: Vec<_> = actions.update_application().iter().map(|a| a.module().to_string()).collect();

        assert_eq!(clear, vec!["Core", "Ui", "App"]);
        assert_eq!(update, vec!["Core", "Ui", "App"]);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_notify_is_two_phase() {
        let calls = Calls::default();
        let registry = layered(&calls);
        let sink = MemorySink::new();

        build_handler_actions(&registry, &sink).notify(&[], &sink);

        assert_eq!(
            *calls.lock(),
            vec![
                "Core.H.ClearCache",
                "Ui.H.ClearCache",
                "App.H.ClearCache",
                "Core.H.UpdateApplication",
                "Ui.H.UpdateApplication",
                "App.H.UpdateApplication",
            ]
        );
    }

    #[test]
    fn test_update_pass_sees_completed_clear_pass() {
        let registry = ModuleRegistry::new();
        let cleared = Arc::new(AtomicUsize::new(0));
        let observed = Arc::new(Mutex::new(Vec::new()));

        for name in ["A", "B", "C"] {
            let handler = format!("{name}.H");
            registry.register(ModuleSpec::new(name).with_handler(handler.as_str()));
            let c = Arc::clone(&cleared);
            let (c2, o) = (Arc::clone(&cleared), Arc::clone(&observed));
            registry.register_handler(
                handler.as_str(),
                vec![
                    HandlerMethod::hook(CLEAR_CACHE, move |_| {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                    HandlerMethod::hook(UPDATE_APPLICATION, move |_| {
                        o.lock().push(c2.load(Ordering::SeqCst));
                        Ok(())
                    }),
                ],
            );
            registry.load(name).unwrap();
        }

        let sink = MemorySink::new();
        build_handler_actions(&registry, &sink).notify(&[], &sink);

        assert_eq!(*observed.lock(), vec![3, 3, 3]);
    }

    #[test]
    fn test_failing_action_is_contained() {
        let calls = Calls::default();
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("A").with_handler("A.Bad").with_handler("A.Good"));
        registry.register_handler(
            "A.Bad",
            vec![HandlerMethod::hook(CLEAR_CACHE, |_| anyhow::bail!("cache corrupted"))],
        );
        both_hooks(&registry, &calls, "A.Good");
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        build_handler_actions(&registry, &sink).notify(&[], &sink);

        assert_eq!(*calls.lock(), vec!["A.Good.ClearCache", "A.Good.UpdateApplication"]);
        assert_eq!(sink.messages(), vec!["exception from 'A.Bad.ClearCache': cache corrupted"]);
    }

    #[test]
    fn test_panicking_action_is_contained() {
        let calls = Calls::default();
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("A").with_handler("A.Panics").with_handler("A.Good"));
        registry.register_handler(
            "A.Panics",
            vec![HandlerMethod::hook(UPDATE_APPLICATION, |_| panic!("handler exploded"))],
        );
        both_hooks(&registry, &calls, "A.Good");
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        build_handler_actions(&registry, &sink).notify(&[], &sink);

        assert_eq!(calls.lock().len(), 2);
        assert_eq!(sink.count_containing("A.Panics.UpdateApplication"), 1);
        assert_eq!(sink.count_containing("handler exploded"), 1);
    }

    #[test]
    fn test_invalid_declarations_logged_and_skipped() {
        let calls = Calls::default();
        let registry = ModuleRegistry::new();
        registry.register(
            ModuleSpec::new("A")
                .with_declaration(HandlerDeclaration::new(UPDATE_HANDLER_DECLARATION, vec![]))
                .with_declaration(HandlerDeclaration::new(
                    UPDATE_HANDLER_DECLARATION,
                    vec![DeclarationArg::Value("A.H".into())],
                ))
                .with_declaration(HandlerDeclaration::new("Obsolete", vec![]))
                .with_handler("A.H"),
        );
        both_hooks(&registry, &calls, "A.H");
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        let actions = build_handler_actions(&registry, &sink);

        assert_eq!(actions.clear_cache().len(), 1);
        assert_eq!(sink.count_containing("found with invalid arguments"), 2);
        assert_eq!(sink.count_containing("Obsolete"), 0);
    }

    #[test]
    fn test_signature_mismatch_logged_and_skipped() {
        let calls = Calls::default();
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("A").with_handler("A.H"));
        registry.register_handler(
            "A.H",
            vec![
                HandlerMethod::with_signature(
                    CLEAR_CACHE,
                    MethodSignature {
                        receiver: Receiver::Instance,
                        ..MethodSignature::update_hook()
                    },
                ),
                HandlerMethod::hook(UPDATE_APPLICATION, recording(&calls, "A.H.UpdateApplication")),
            ],
        );
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        let actions = build_handler_actions(&registry, &sink);

        assert!(actions.clear_cache().is_empty());
        assert_eq!(actions.update_application().len(), 1);
        assert_eq!(
            sink.messages(),
            vec!["Type 'A.H' has method 'void ClearCache(Type[])' that does not match the required signature."]
        );
    }

    #[test]
    fn test_handler_without_hooks_logged() {
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("A").with_handler("A.Empty"));
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        let actions = build_handler_actions(&registry, &sink);

        assert!(actions.is_empty());
        assert_eq!(
            sink.messages(),
            vec![
                "No invokable methods found on metadata handler type 'A.Empty'. \
                 Allowed methods are ClearCache, UpdateApplication"
            ]
        );
    }

    #[test]
    fn test_updated_types_reach_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ModuleRegistry::new();
        registry.register(ModuleSpec::new("A").with_handler("A.H"));
        let s = Arc::clone(&seen);
        registry.register_handler(
            "A.H",
            vec![HandlerMethod::hook(UPDATE_APPLICATION, move |types: &[TypeRef]| {
                s.lock().extend(types.iter().map(|t| t.name.to_string()));
                Ok(())
            })],
        );
        registry.load("A").unwrap();

        let sink = MemorySink::new();
        let updated = vec![TypeRef::new(ModuleId::from_u128(1), 42, "A.Counter")];
        build_handler_actions(&registry, &sink).notify(&updated, &sink);

        assert_eq!(*seen.lock(), vec!["A.Counter"]);
    }
}
