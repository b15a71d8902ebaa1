//! Guard registry — the catalog of guards a group can enable.

use std::collections::HashMap;
use std::sync::Arc;

use super::behavioral::{ApprovedSendersGuard, NoSpamGuard, QuietHoursGuard, SlowModeGuard};
use super::content::ContentTypeGuard;
use super::keyword::{KeywordFilterGuard, PatternCache};
use super::property::{MaxTextLengthGuard, NoForwardedGuard, NoLinksGuard};
use super::rate::RateStore;
use super::{Guard, GuardInfo};

/// Registry of available guards.
///
/// Filled once at startup and shared read-only afterwards; guards are never
/// removed. Enumeration follows registration order.
pub struct GuardRegistry {
    guards: Vec<Arc<dyn Guard>>,
    by_id: HashMap<String, usize>,
}

impl GuardRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            guards: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Registry holding every built-in guard, wired to the given stores.
    pub fn builtin(rate_store: Arc<RateStore>, pattern_cache: Arc<PatternCache>) -> Self {
        let mut registry = Self::new();

        for guard in ContentTypeGuard::all() {
            registry.register(Arc::new(guard));
        }

        registry.register(Arc::new(NoLinksGuard));
        registry.register(Arc::new(NoForwardedGuard));
        registry.register(Arc::new(MaxTextLengthGuard));

        registry.register(Arc::new(QuietHoursGuard));
        registry.register(Arc::new(SlowModeGuard::new(Arc::clone(&rate_store))));
        registry.register(Arc::new(NoSpamGuard::new(rate_store)));
        registry.register(Arc::new(ApprovedSendersGuard));

        registry.register(Arc::new(KeywordFilterGuard::new(pattern_cache)));

        tracing::debug!(count = registry.len(), "Registered built-in guards");
        registry
    }

    /// Register a guard. Returns `false` (and keeps the existing guard) if
    /// the id is already taken.
    pub fn register(&mut self, guard: Arc<dyn Guard>) -> bool {
        let id = guard.id().to_string();
        if self.by_id.contains_key(&id) {
            tracing::warn!(guard_id = %id, "Rejected guard registration: duplicate id");
            return false;
        }
        self.by_id.insert(id, self.guards.len());
        self.guards.push(guard);
        true
    }

    /// Get a guard by id.
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn Guard>> {
        self.by_id.get(id).map(|&i| Arc::clone(&self.guards[i]))
    }

    /// Check if a guard exists.
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Catalog of all guards, in registration order.
    pub fn list_all(&self) -> Vec<GuardInfo> {
        self.guards.iter().map(|g| g.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl Default for GuardRegistry {
    fn default() -> Self {
        Self::new()
    }
}
