//! Load listener: replays cached deltas into newly loaded module instances.
//!
//! Every load invalidates the handler registry, since the new module may
//! declare handlers. If the module's id has cached deltas and this instance
//! was never patched, the deltas are applied in their recorded order and
//! handlers are notified.

use std::sync::Arc;

use super::AgentState;
use crate::runtime::{Runtime, SubscriptionId};

/// Subscribe `state` to load notifications.
///
/// The callback only holds a weak reference: the runtime never keeps the
/// agent alive, and notifications after the agent is dropped are ignored.
pub(super) fn subscribe<R: Runtime>(state: &Arc<AgentState<R>>) -> SubscriptionId {
    let weak = Arc::downgrade(state);
    state
        .runtime
        .subscribe_loads(Arc::new(move |module: &R::Module| {
            if let Some(state) = weak.upgrade() {
                state.on_module_load(module);
            }
        }))
}

impl<R: Runtime> AgentState<R> {
    pub(super) fn on_module_load(&self, module: &R::Module) {
        self.invalidate_handlers();

        let Some(id) = self.module_id(module) else {
            return;
        };
        if !self.settings.replay_on_load {
            return;
        }

        // A batch that already caught this instance up has marked it.
        self.replay(module, &id);
    }
}
