//! Delta cache and applied-instance tracking.
//!
//! - `DeltaCache`: module id → every delta received for it, in arrival order
//! - `AppliedSet`: module instances that already received their deltas
//!
//! Both are shared between batch application and load notifications, which
//! may run on different threads.

use std::hash::Hash;

use dashmap::{DashMap, DashSet};

use crate::core::{Delta, ModuleId};

// =============================================================================
// DeltaCache
// =============================================================================

/// Append-only history of deltas per module id.
///
/// Appends for one id happen under that shard's write lock, so concurrent
/// `record` calls never lose an entry and `lookup` never sees a torn list.
#[derive(Debug, Default)]
pub struct DeltaCache {
    entries: DashMap<ModuleId, Vec<Delta>>,
}

impl DeltaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, delta: Delta) {
        self.entries.entry(delta.module_id()).or_default().push(delta);
    }

    /// Snapshot of the deltas recorded for `id`, oldest first.
    pub fn lookup(&self, id: &ModuleId) -> Vec<Delta> {
        self.entries
            .get(id)
            .map(|deltas| deltas.clone())
            .unwrap_or_default()
    }

    /// Number of module ids with at least one delta.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of deltas across all ids.
    pub fn delta_count(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }
}

// =============================================================================
// AppliedSet
// =============================================================================

/// Module instances that were already patched.
#[derive(Debug)]
pub struct AppliedSet<M: Eq + Hash> {
    instances: DashSet<M>,
}

impl<M: Eq + Hash> Default for AppliedSet<M> {
    fn default() -> Self {
        Self {
            instances: DashSet::new(),
        }
    }
}

impl<M: Eq + Hash + Clone> AppliedSet<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `instance` if absent. Returns `true` only for the caller that added it.
    pub fn mark(&self, instance: &M) -> bool {
        self.instances.insert(instance.clone())
    }

    pub fn contains(&self, instance: &M) -> bool {
        self.instances.contains(instance)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
