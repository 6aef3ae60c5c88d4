//! The model runner: the single writer of the live model set (spec §5
//! "Shared mutable state"). Consecutive failure/timeout counters drive
//! quarantine eviction; callers only ever read a read-copy-update snapshot
//! of the live set via [`ModelRunner::live_model_ids`].

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
struct ModelCounters {
    consecutive_failures: AtomicU32,
    consecutive_timeouts: AtomicU32,
}

pub struct ModelRunner {
    live: DashMap<String, ModelCounters>,
    failure_limit: u32,
    timeout_limit: u32,
}

impl ModelRunner {
    pub fn new(failure_limit: u32, timeout_limit: u32) -> Self {
        Self { live: DashMap::new(), failure_limit, timeout_limit }
    }

    pub fn register(&self, model_id: impl Into<String>) {
        self.live.entry(model_id.into()).or_insert_with(ModelCounters::default);
    }

    pub fn evict(&self, model_id: &str) {
        self.live.remove(model_id);
    }

    pub fn live_model_ids(&self) -> Vec<String> {
        self.live.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_live(&self, model_id: &str) -> bool {
        self.live.contains_key(model_id)
    }

    /// Resets both counters; call on any successful response.
    pub fn record_success(&self, model_id: &str) {
        if let Some(counters) = self.live.get(model_id) {
            counters.consecutive_failures.store(0, Ordering::Relaxed);
            counters.consecutive_timeouts.store(0, Ordering::Relaxed);
        }
    }

    /// Returns `true` if this failure crossed the quarantine threshold and
    /// the model was evicted.
    pub fn record_failure(&self, model_id: &str) -> bool {
        self.bump_and_check(model_id, |c| &c.consecutive_failures, self.failure_limit)
    }

    pub fn record_timeout(&self, model_id: &str) -> bool {
        self.bump_and_check(model_id, |c| &c.consecutive_timeouts, self.timeout_limit)
    }

    fn bump_and_check(&self, model_id: &str, counter: impl Fn(&ModelCounters) -> &AtomicU32, limit: u32) -> bool {
        let Some(counters) = self.live.get(model_id) else {
            return false;
        };
        let count = counter(&counters).fetch_add(1, Ordering::Relaxed) + 1;
        drop(counters);
        if count >= limit {
            self.evict(model_id);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_failures_evict_at_threshold() {
        let runner = ModelRunner::new(3, 3);
        runner.register("model-a");

        assert!(!runner.record_failure("model-a"));
        assert!(!runner.record_failure("model-a"));
        assert!(runner.record_failure("model-a"));
        assert!(!runner.is_live("model-a"));
    }

    #[test]
    fn a_success_resets_the_failure_counter() {
        let runner = ModelRunner::new(3, 3);
        runner.register("model-a");

        runner.record_failure("model-a");
        runner.record_failure("model-a");
        runner.record_success("model-a");
        assert!(!runner.record_failure("model-a"));
        assert!(!runner.record_failure("model-a"));
        assert!(runner.is_live("model-a"));
    }

    #[test]
    fn timeouts_and_failures_are_tracked_independently() {
        let runner = ModelRunner::new(2, 5);
        runner.register("model-a");

        runner.record_timeout("model-a");
        assert!(runner.record_failure("model-a"));
        assert!(!runner.is_live("model-a"));
    }
}
