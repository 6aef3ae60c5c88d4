//! Input and Prediction entities and their one-way status machines.

use crate::scope::PredictionScope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `Input.status`: `Received -> Resolved` only, enforced by
/// [`Input::resolve`] rather than by direct field mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStatus {
    Received,
    Resolved,
}

/// One firing of a `ScheduledPredictionConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub config_id: String,
    pub scope: PredictionScope,
    pub raw_input_payload: Value,
    pub performed_at: i64,
    pub resolvable_at: i64,
    pub actuals: Option<Value>,
    pub status: InputStatus,
}

/// Sentinel written to `actuals` when an Input ages past its resolution TTL
/// without ground truth ever becoming available (spec §4.3 Phase A).
pub const SENTINEL_NULL_ACTUALS: &str = "__no_ground_truth__";

impl Input {
    pub fn new(
        id: impl Into<String>,
        config_id: impl Into<String>,
        scope: PredictionScope,
        raw_input_payload: Value,
        performed_at: i64,
        horizon_seconds: u64,
    ) -> Self {
        Self {
            id: id.into(),
            config_id: config_id.into(),
            scope,
            raw_input_payload,
            performed_at,
            resolvable_at: performed_at + horizon_seconds as i64,
            actuals: None,
            status: InputStatus::Received,
        }
    }

    /// One-way transition: `Received -> Resolved`, with non-null actuals.
    /// Calling this on an already-resolved Input is a no-op error, keeping
    /// re-runs of a tick idempotent rather than silently overwriting actuals.
    pub fn resolve(&mut self, actuals: Value) -> Result<(), AlreadyResolved> {
        if self.status == InputStatus::Resolved {
            return Err(AlreadyResolved { input_id: self.id.clone() });
        }
        self.actuals = Some(actuals);
        self.status = InputStatus::Resolved;
        Ok(())
    }

    /// TTL expiry path: resolves with the sentinel so downstream
    /// Predictions flip to `Failed reason="no ground truth"`.
    pub fn resolve_with_sentinel(&mut self) -> Result<(), AlreadyResolved> {
        self.resolve(Value::String(SENTINEL_NULL_ACTUALS.to_string()))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(&self.actuals, Some(Value::String(s)) if s == SENTINEL_NULL_ACTUALS)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("input {input_id} is already resolved")]
pub struct AlreadyResolved {
    pub input_id: String,
}

/// `Prediction.status`: `Pending -> {Scored, Failed, Absent}` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Scored,
    Failed,
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub value: f64,
    pub success: bool,
    pub failed_reason: Option<String>,
    pub extra: Option<Value>,
}

impl Score {
    pub fn success(value: f64) -> Self {
        Self {
            value,
            success: true,
            failed_reason: None,
            extra: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            value: 0.0,
            success: false,
            failed_reason: Some(reason.into()),
            extra: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub model_id: String,
    pub input_id: String,
    pub config_id: String,
    pub scope: PredictionScope,
    pub inference_output: Option<Value>,
    pub exec_time_us: Option<u64>,
    pub status: PredictionStatus,
    pub score: Option<Score>,
    /// Free-form metadata (e.g. ensemble weights for virtual-model
    /// predictions).
    pub meta: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionTransitionError {
    #[error("prediction {0} is not pending")]
    NotPending(String),
    #[error("score.success must be true to mark a prediction scored ({0})")]
    ScoreNotSuccessful(String),
}

impl Prediction {
    pub fn pending(
        id: impl Into<String>,
        model_id: impl Into<String>,
        input_id: impl Into<String>,
        config_id: impl Into<String>,
        scope: PredictionScope,
        inference_output: Value,
        exec_time_us: u64,
    ) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            input_id: input_id.into(),
            config_id: config_id.into(),
            scope,
            inference_output: Some(inference_output),
            exec_time_us: Some(exec_time_us),
            status: PredictionStatus::Pending,
            score: None,
            meta: None,
        }
    }

    pub fn failed(
        id: impl Into<String>,
        model_id: impl Into<String>,
        input_id: impl Into<String>,
        config_id: impl Into<String>,
        scope: PredictionScope,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            input_id: input_id.into(),
            config_id: config_id.into(),
            scope,
            inference_output: None,
            exec_time_us: None,
            status: PredictionStatus::Failed,
            score: Some(Score::failure(reason)),
            meta: None,
        }
    }

    pub fn absent(
        id: impl Into<String>,
        model_id: impl Into<String>,
        input_id: impl Into<String>,
        config_id: impl Into<String>,
        scope: PredictionScope,
    ) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            input_id: input_id.into(),
            config_id: config_id.into(),
            scope,
            inference_output: None,
            exec_time_us: None,
            status: PredictionStatus::Absent,
            score: None,
            meta: None,
        }
    }

    /// `Pending -> Scored`. Requires `score.success`; a scoring callable
    /// that claims success=false must instead transition to `Failed` via
    /// [`Prediction::mark_failed`].
    pub fn mark_scored(&mut self, score: Score) -> Result<(), PredictionTransitionError> {
        if self.status != PredictionStatus::Pending {
            return Err(PredictionTransitionError::NotPending(self.id.clone()));
        }
        if !score.success {
            return Err(PredictionTransitionError::ScoreNotSuccessful(self.id.clone()));
        }
        self.score = Some(score);
        self.status = PredictionStatus::Scored;
        Ok(())
    }

    /// `Pending -> Failed`, e.g. on a scoring exception or invalid score.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), PredictionTransitionError> {
        if self.status != PredictionStatus::Pending {
            return Err(PredictionTransitionError::NotPending(self.id.clone()));
        }
        self.score = Some(Score::failure(reason));
        self.status = PredictionStatus::Failed;
        Ok(())
    }
}
