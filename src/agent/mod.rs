//! Hot reload agent.
//!
//! # Architecture
//!
//! ```text
//!  apply_deltas(batch) ──► patch every live instance ──► DeltaCache
//!                                   │                        │
//!                                   ▼                        │ replay
//!                      UpdateHandlerActions (lazy)           │
//!                      clear_cache ▸ update_application      │
//!                                   ▲                        │
//!  load notification ──► invalidate ┘ ◄──────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `sort` - Dependency ordering of modules
//! - `handlers` - Handler discovery and two-pass notification
//! - `deltas` - Delta cache and applied-instance set
//! - `listener` - Load notification handling
//! - `error` - Agent error types

pub mod deltas;
pub mod error;
pub mod handlers;
mod listener;
pub mod sort;


use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, ReentrantMutex};

use crate::config::AgentSectionConfig;
use crate::core::{Delta, ModuleId, TypeRef};
use crate::logger::LogSink;
use crate::runtime::{Runtime, SubscriptionId};

pub use deltas::{AppliedSet, DeltaCache};
pub use error::{ActionError, AgentError};
pub use handlers::{HandlerAction, Hook, UpdateHandlerActions, build_handler_actions};
pub use sort::sort_modules;

use handlers::panic_message;

/// Logged after every batch that went through without an orchestration error.
pub const DELTAS_APPLIED: &str = "Deltas applied.";

/// Applies deltas to live modules, replays them to late loads and notifies
/// update handlers.
///
/// Subscribes to load notifications on construction and unsubscribes on
/// [`dispose`](Self::dispose) or drop.
pub struct HotReloadAgent<R: Runtime> {
    state: Arc<AgentState<R>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// State shared between the agent and its load callback.
pub(crate) struct AgentState<R: Runtime> {
    runtime: Arc<R>,
    sink: Arc<dyn LogSink>,
    settings: AgentSectionConfig,
    deltas: DeltaCache,
    applied: AppliedSet<R::Module>,
    handlers: ArcSwapOption<UpdateHandlerActions>,
    /// Bumped on every invalidation.
    generation: AtomicU64,
    /// Held while patching and while recording to the cache, so an instance
    /// receives every cached delta once and in order. Released before
    /// handlers run.
    replay_lock: ReentrantMutex<()>,
}

impl<R: Runtime> HotReloadAgent<R> {
    /// Create an agent and subscribe it to load notifications.
    pub fn new(runtime: Arc<R>, sink: Arc<dyn LogSink>, settings: AgentSectionConfig) -> Self {
        let state = Arc::new(AgentState {
            runtime,
            sink,
            settings,
            deltas: DeltaCache::new(),
            applied: AppliedSet::new(),
            handlers: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            replay_lock: ReentrantMutex::new(()),
        });
        let subscription = listener::subscribe(&state);

        Self {
            state,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Apply a batch to every loaded instance of each delta's module, cache
    /// it for later loads, then notify handlers.
    ///
    /// Never fails: errors are reported through the log sink. A patch failure
    /// stops the rest of the batch; what was applied and cached stays.
    pub fn apply_deltas(&self, deltas: &[Delta]) {
        self.state.apply_deltas(deltas);
    }

    /// Apply deltas to one known instance, then notify handlers.
    ///
    /// Does not touch the delta cache.
    pub fn apply_deltas_to(&self, module: &R::Module, deltas: &[Delta]) {
        self.state.apply_to_module(module, deltas);
    }

    /// Stop listening for module loads. Safe to call more than once.
    pub fn dispose(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.state.runtime.unsubscribe_loads(id);
            crate::debug!("agent"; "unsubscribed from load notifications");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.subscription.lock().is_none()
    }

    /// Deltas cached for `id`, in arrival order.
    pub fn cached_deltas(&self, id: &ModuleId) -> Vec<Delta> {
        self.state.deltas.lookup(id)
    }

    pub fn delta_cache(&self) -> &DeltaCache {
        &self.state.deltas
    }

    /// Whether `module` is recorded as patched.
    pub fn is_applied(&self, module: &R::Module) -> bool {
        self.state.applied.contains(module)
    }

    /// Drop the cached handler registry; the next notification rebuilds it.
    pub fn invalidate_handlers(&self) {
        self.state.invalidate_handlers();
    }

    pub fn has_handler_actions(&self) -> bool {
        self.state.handlers.load().is_some()
    }

    /// Current handler registry, building it if absent.
    pub fn handler_actions(&self) -> Arc<UpdateHandlerActions> {
        self.state.handler_actions()
    }
}

impl<R: Runtime> Drop for HotReloadAgent<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R: Runtime> AgentState<R> {
    fn apply_deltas(&self, deltas: &[Delta]) {
        crate::debug!("agent"; "applying batch of {} delta(s)", deltas.len());
        self.contain(|| self.try_apply_deltas(deltas));
    }

    fn try_apply_deltas(&self, deltas: &[Delta]) -> Result<(), AgentError> {
        for delta in deltas {
            let _replay = self.replay_lock.lock();

            for module in self.runtime.loaded_modules() {
                if self.module_id(&module) != Some(delta.module_id()) {
                    continue;
                }
                // Live but not yet replayed: catch up on the cached history first.
                if self.applied.mark(&module) && self.settings.replay_on_load {
                    let missed = self.deltas.lookup(&delta.module_id());
                    self.patch_each(&module, &missed)?;
                }
                self.patch(&module, delta)?;
            }

            // Cached even without a live match, so later loads still get it.
            self.deltas.record(delta.clone());
        }

        let updated = self.updated_types(deltas);
        self.handler_actions().notify(&updated, &*self.sink);
        Ok(())
    }

    /// Apply to a single instance without consulting or writing the cache.
    fn apply_to_module(&self, module: &R::Module, deltas: &[Delta]) {
        self.contain(|| {
            {
                let _replay = self.replay_lock.lock();
                self.applied.mark(module);
                self.patch_each(module, deltas)?;
            }
            self.notify_for(module, deltas);
            Ok(())
        });
    }

    /// Replay the cached deltas of `id` into a newly loaded instance, once.
    fn replay(&self, module: &R::Module, id: &ModuleId) {
        let replay = self.replay_lock.lock();

        let deltas = self.deltas.lookup(id);
        if deltas.is_empty() {
            return;
        }
        if !self.applied.mark(module) {
            crate::debug!("agent"; "{:?} already patched, skipping replay", module);
            return;
        }

        crate::debug!("agent"; "replaying {} cached delta(s) into {:?}", deltas.len(), module);
        self.contain(move || {
            self.patch_each(module, &deltas)?;
            drop(replay);
            self.notify_for(module, &deltas);
            Ok(())
        });
    }

    fn notify_for(&self, module: &R::Module, deltas: &[Delta]) {
        let updated = self.resolve_types(module, deltas);
        self.handler_actions().notify(&updated, &*self.sink);
    }

    /// Top-level boundary: nothing below escapes to the caller.
    fn contain(&self, work: impl FnOnce() -> Result<(), AgentError>) {
        match catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => self.sink.log(DELTAS_APPLIED),
            Ok(Err(e)) => self.sink.log(&format!("{:#}", anyhow::Error::from(e))),
            Err(payload) => self.sink.log(&format!(
                "delta application panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    fn patch_each(&self, module: &R::Module, deltas: &[Delta]) -> Result<(), AgentError> {
        deltas.iter().try_for_each(|delta| self.patch(module, delta))
    }

    fn patch(&self, module: &R::Module, delta: &Delta) -> Result<(), AgentError> {
        crate::debug!("agent"; "applying delta for {} to {:?}", delta.module_id(), module);
        self.runtime
            .apply_patch(module, delta)
            .map_err(|source| AgentError::Patch {
                module_id: delta.module_id().to_string(),
                module: format!("{module:?}"),
                source,
            })
    }

    /// Identifier of `module`; resolution failures count as "no identifier".
    fn module_id(&self, module: &R::Module) -> Option<ModuleId> {
        match self.runtime.module_id(module) {
            Ok(id) => id,
            Err(e) => {
                crate::debug!("agent"; "no identifier for {:?}: {}", module, e);
                None
            }
        }
    }

    /// Updated types across a batch, resolved against the first live
    /// instance of each delta's module. Unresolvable tokens are dropped.
    fn updated_types(&self, deltas: &[Delta]) -> Vec<TypeRef> {
        let modules = self.runtime.loaded_modules();
        let mut types = Vec::new();

        for delta in deltas {
            let Some(module) = modules
                .iter()
                .find(|m| self.module_id(m) == Some(delta.module_id()))
            else {
                continue;
            };
            types.extend(self.resolve_types(module, std::slice::from_ref(delta)));
        }
        types
    }

    fn resolve_types(&self, module: &R::Module, deltas: &[Delta]) -> Vec<TypeRef> {
        deltas
            .iter()
            .flat_map(|d| d.updated_type_tokens().iter().copied())
            .filter_map(|token| self.runtime.resolve_type(module, token))
            .collect()
    }

    /// Published registry, or a freshly built one.
    ///
    /// A build that overlapped an invalidation is used for this call but not
    /// left published.
    fn handler_actions(&self) -> Arc<UpdateHandlerActions> {
        if let Some(actions) = self.handlers.load_full() {
            return actions;
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let actions = Arc::new(build_handler_actions(&*self.runtime, &*self.sink));

        self.handlers.store(Some(Arc::clone(&actions)));
        if self.generation.load(Ordering::SeqCst) != generation {
            self.handlers.store(None);
        }
        actions
    }

    fn invalidate_handlers(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.handlers.store(None);
    }
}
