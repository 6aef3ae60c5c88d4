//! The boundary to a participant's model process. `ModelClient` is the
//! seam the orchestrator calls through for both the optional `Tick` priming
//! RPC and `Predict` itself; a real implementation dials the model's HTTP
//! endpoint (`model_runner.host:port` in config), a test one returns
//! canned responses.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCallOutcome {
    /// The model responded within the deadline.
    Responded,
    /// The deadline elapsed before a response arrived.
    TimedOut,
    /// The channel closed mid-call (process crashed, evicted concurrently).
    NoResponse,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Optional priming call before `predict`, for configs with
    /// `requires_tick = true`. Its outcome only affects liveness counters;
    /// the result payload itself is discarded.
    async fn tick(&self, model_id: &str, deadline_ms: u64) -> ModelCallOutcome;

    /// Returns the model's raw output, or `None` for a timeout / no
    /// response (the caller distinguishes which via `last_call_outcome`).
    async fn predict(&self, model_id: &str, inference_input: &Value, deadline_ms: u64) -> (ModelCallOutcome, Option<Value>);
}
