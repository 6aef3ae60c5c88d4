//! Worker heartbeat registry backing `GET /healthz` (spec §6): every worker
//! loop reports its own liveness once per tick, and readiness reflects
//! whether each expected worker has reported within its cadence rather than
//! a stub `200 OK`.

use dashmap::DashMap;

pub struct HealthRegistry {
    last_heartbeat: DashMap<String, i64>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self { last_heartbeat: DashMap::new() }
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, worker: impl Into<String>, now: i64) {
        self.last_heartbeat.insert(worker.into(), now);
    }

    pub fn last_heartbeat(&self, worker: &str) -> Option<i64> {
        self.last_heartbeat.get(worker).map(|entry| *entry)
    }

    /// `expectations` is `(worker_name, max_age_seconds)`. A worker that has
    /// never reported is unhealthy regardless of its max age.
    pub fn all_healthy(&self, now: i64, expectations: &[(&str, i64)]) -> bool {
        expectations.iter().all(|(worker, max_age)| self.is_healthy(worker, now, *max_age))
    }

    pub fn is_healthy(&self, worker: &str, now: i64, max_age_seconds: i64) -> bool {
        self.last_heartbeat(worker).is_some_and(|ts| now - ts <= max_age_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_worker_that_never_reported_is_unhealthy() {
        let registry = HealthRegistry::new();
        assert!(!registry.is_healthy("feed", 1_000, 30));
    }

    #[test]
    fn a_recent_heartbeat_is_healthy_and_a_stale_one_is_not() {
        let registry = HealthRegistry::new();
        registry.report("feed", 1_000);
        assert!(registry.is_healthy("feed", 1_010, 30));
        assert!(!registry.is_healthy("feed", 1_040, 30));
    }

    #[test]
    fn all_healthy_requires_every_expectation_to_pass() {
        let registry = HealthRegistry::new();
        registry.report("feed", 1_000);
        registry.report("score", 1_000);
        assert!(!registry.all_healthy(1_010, &[("feed", 30), ("score", 30), ("checkpoint", 30)]));
        registry.report("checkpoint", 1_005);
        assert!(registry.all_healthy(1_010, &[("feed", 30), ("score", 30), ("checkpoint", 30)]));
    }
}
