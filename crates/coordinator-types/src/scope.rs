//! Prediction scope and the scheduled config that fires it.

use serde::{Deserialize, Serialize};

/// The tuple identifying a prediction configuration (glossary: "Scope").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionScope {
    pub subject: String,
    pub horizon_seconds: u64,
    pub step_seconds: u64,
}

impl PredictionScope {
    pub fn new(subject: impl Into<String>, horizon_seconds: u64, step_seconds: u64) -> Self {
        Self {
            subject: subject.into(),
            horizon_seconds,
            step_seconds,
        }
    }

    /// Stable string key usable as a store row key or a metrics label.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.subject, self.horizon_seconds, self.step_seconds)
    }
}

/// A fixed-interval or cron-like firing schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    EverySeconds(u64),
    Cron(String),
}

/// Declarative schedule for one recurring Predict cycle (spec §3).
///
/// Invariant (enforced by [`ScheduledPredictionConfig::validate`], not by
/// construction, since the offending config must still be logged and kept
/// around rather than rejected outright): `resolve_after_seconds` must
/// exceed the effective feed interval, or its Inputs will never resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPredictionConfig {
    pub id: String,
    pub scope_key: String,
    pub scope: PredictionScope,
    pub schedule: Schedule,
    pub active: bool,
    pub order: i32,
    pub resolve_after_seconds: u64,
    /// Lookback window (seconds) of feed history fed to the input builder.
    pub lookback_seconds: u64,
    /// Whether this config requires a `Tick` priming call before `Predict`.
    pub requires_tick: bool,
    pub predict_timeout_ms: u64,
    /// Deadline for the `Tick` priming call, distinct from
    /// `predict_timeout_ms` since a cold model start can legitimately take
    /// far longer than one inference call (spec §5: 50s default vs. 1s).
    pub tick_timeout_ms: u64,
}

/// A config whose `resolve_after_seconds` does not exceed the feed interval
/// will never resolve; the caller is expected to log and continue (spec
/// §3: "violations are logged and predictions for that config will never
/// score"), not abort.
#[derive(Debug, thiserror::Error)]
#[error("resolve_after_seconds ({resolve_after_seconds}) must exceed the feed interval ({feed_interval_seconds}) for config {config_id}")]
pub struct ResolveWindowTooShort {
    pub config_id: String,
    pub resolve_after_seconds: u64,
    pub feed_interval_seconds: u64,
}

impl ScheduledPredictionConfig {
    pub fn validate(&self, feed_interval_seconds: u64) -> Result<(), ResolveWindowTooShort> {
        if self.resolve_after_seconds > feed_interval_seconds {
            Ok(())
        } else {
            Err(ResolveWindowTooShort {
                config_id: self.id.clone(),
                resolve_after_seconds: self.resolve_after_seconds,
                feed_interval_seconds,
            })
        }
    }
}
