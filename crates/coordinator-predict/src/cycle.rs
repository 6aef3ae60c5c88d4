//! The Predict cycle algorithm (spec §4.2): one firing of a
//! `ScheduledPredictionConfig`, fanned out to every live model and
//! committed atomically with its Input.

use crate::client::{ModelCallOutcome, ModelClient};
use crate::runner::ModelRunner;
use coordinator_config::callables::{InferenceInputBuilderKind, InferenceOutputValidatorKind};
use coordinator_config::{InferenceInputBuilder, InferenceOutputValidator};
use coordinator_obs::{cycle_span, ProcessLog, ProcessLogEntry};
use coordinator_store::{FeedStore, PredictStore};
use coordinator_types::{Input, Prediction, ScheduledPredictionConfig};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skipped { reason: String },
    FailedClosed { reason: String },
    Committed { input_id: String, prediction_count: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("feed store error: {0}")]
    Store(#[from] coordinator_store::StoreError),
}

pub struct CycleDeps<'a> {
    pub feed_store: &'a FeedStore,
    pub predict_store: &'a PredictStore,
    pub runner: &'a ModelRunner,
    pub model_client: &'a dyn ModelClient,
    pub input_builder: &'a InferenceInputBuilderKind,
    pub input_builder_fallback: &'a dyn InferenceInputBuilder,
    pub output_validator: &'a InferenceOutputValidatorKind,
    pub output_validator_fallback: &'a dyn InferenceOutputValidator,
    pub process_log: &'a ProcessLog,
}

fn build_input(kind: &InferenceInputBuilderKind, fallback: &dyn InferenceInputBuilder, raw: &serde_json::Value, scope: &coordinator_types::PredictionScope) -> Result<serde_json::Value, String> {
    match kind {
        InferenceInputBuilderKind::Default => fallback.build(raw, scope),
        InferenceInputBuilderKind::Custom(f) => f.build(raw, scope),
    }
}

fn validate_output(kind: &InferenceOutputValidatorKind, fallback: &dyn InferenceOutputValidator, output: &serde_json::Value) -> Result<(), String> {
    match kind {
        InferenceOutputValidatorKind::Default => fallback.validate(output),
        InferenceOutputValidatorKind::Custom(f) => f.validate(output),
    }
}

/// Runs one cycle firing of `config` at `now`. Not idempotent across
/// repeated calls with the same `now`; the caller's scheduler guarantees
/// one call per tick per config.
pub async fn run_cycle(config: &ScheduledPredictionConfig, now: i64, deps: CycleDeps<'_>) -> Result<CycleOutcome, CycleError> {
    let span = cycle_span("predict", &config.scope_key, &config.id);
    run_cycle_inner(config, now, deps).instrument(span).await
}

async fn run_cycle_inner(config: &ScheduledPredictionConfig, now: i64, deps: CycleDeps<'_>) -> Result<CycleOutcome, CycleError> {
    let window_start = now - config.lookback_seconds as i64;
    let window = deps.feed_store.records_in_window(&config.scope_key, window_start, now)?;

    if window.is_empty() {
        let _ = deps.process_log.append(
            ProcessLogEntry::new("predict", "cycle_skipped")
                .with_scope(config.scope_key.clone())
                .with_detail(serde_json::json!({ "config_id": config.id, "reason": "empty_feed_window" })),
        );
        return Ok(CycleOutcome::Skipped { reason: "empty_feed_window".to_string() });
    }

    let raw_input_payload = serde_json::to_value(&window).unwrap_or(serde_json::Value::Null);

    let inference_input = match build_input(deps.input_builder, deps.input_builder_fallback, &raw_input_payload, &config.scope) {
        Ok(value) => value,
        Err(reason) => {
            let _ = deps.process_log.append(
                ProcessLogEntry::new("predict", "cycle_failed_closed")
                    .with_scope(config.scope_key.clone())
                    .with_detail(serde_json::json!({ "config_id": config.id, "reason": reason })),
            );
            return Ok(CycleOutcome::FailedClosed { reason });
        }
    };

    let input_id = Uuid::new_v4().to_string();
    let input = Input::new(&input_id, &config.id, config.scope.clone(), raw_input_payload, now, config.scope.horizon_seconds);

    // Bounded concurrency pool, one slot per live model (spec §4.2 step 4,
    // §5): every model is dispatched at once so cycle latency is
    // max(per-model latency) rather than their sum.
    let live_models = deps.runner.live_model_ids();
    let pool_size = live_models.len().max(1);
    let predictions: Vec<Prediction> = stream::iter(live_models.iter())
        .map(|model_id| run_one_model(model_id, &input_id, config, &inference_input, &deps))
        .buffer_unordered(pool_size)
        .collect()
        .await;

    deps.predict_store.commit_cycle(&input, &predictions)?;

    let _ = deps.process_log.append(
        ProcessLogEntry::new("predict", "cycle_committed")
            .with_scope(config.scope_key.clone())
            .with_cycle(input_id.clone())
            .with_detail(serde_json::json!({ "config_id": config.id, "prediction_count": predictions.len() })),
    );

    Ok(CycleOutcome::Committed { input_id, prediction_count: predictions.len() })
}

async fn run_one_model(model_id: &str, input_id: &str, config: &ScheduledPredictionConfig, inference_input: &serde_json::Value, deps: &CycleDeps<'_>) -> Prediction {
    let prediction_id = Uuid::new_v4().to_string();

    if config.requires_tick {
        let tick_outcome = deps.model_client.tick(model_id, config.tick_timeout_ms).await;
        match tick_outcome {
            ModelCallOutcome::Responded => {}
            ModelCallOutcome::TimedOut => {
                deps.runner.record_timeout(model_id);
                return Prediction::failed(prediction_id, model_id, input_id, &config.id, config.scope.clone(), "timeout");
            }
            ModelCallOutcome::NoResponse => {
                return Prediction::absent(prediction_id, model_id, input_id, &config.id, config.scope.clone());
            }
        }
    }

    let (outcome, output) = deps.model_client.predict(model_id, inference_input, config.predict_timeout_ms).await;

    match outcome {
        ModelCallOutcome::NoResponse => Prediction::absent(prediction_id, model_id, input_id, &config.id, config.scope.clone()),
        ModelCallOutcome::TimedOut => {
            deps.runner.record_timeout(model_id);
            Prediction::failed(prediction_id, model_id, input_id, &config.id, config.scope.clone(), "timeout")
        }
        ModelCallOutcome::Responded => match output {
            Some(output) => match validate_output(deps.output_validator, deps.output_validator_fallback, &output) {
                Ok(()) => {
                    deps.runner.record_success(model_id);
                    let mut prediction =
                        Prediction::pending(prediction_id, model_id, input_id, &config.id, config.scope.clone(), output, 0);
                    prediction.meta = None;
                    prediction
                }
                Err(reason) => {
                    deps.runner.record_failure(model_id);
                    Prediction::failed(prediction_id, model_id, input_id, &config.id, config.scope.clone(), reason)
                }
            },
            None => {
                deps.runner.record_failure(model_id);
                Prediction::failed(prediction_id, model_id, input_id, &config.id, config.scope.clone(), "empty response")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DefaultInferenceInputBuilder, DefaultInferenceOutputValidator};
    use async_trait::async_trait;
    use coordinator_config::callables::{InferenceInputBuilderKind, InferenceOutputValidatorKind};
    use coordinator_obs::ProcessLog;
    use coordinator_store::{FeedStore, PredictStore, Store};
    use coordinator_types::{FeedPayload, FeedRecord, PredictionScope, Schedule};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every deadline it was called with and how many `predict`
    /// calls were in flight at once, to prove dispatch is concurrent and
    /// that `tick` and `predict` are given distinct deadlines.
    struct RecordingModelClient {
        tick_deadlines: Mutex<Vec<u64>>,
        predict_deadlines: Mutex<Vec<u64>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl RecordingModelClient {
        fn new() -> Self {
            Self {
                tick_deadlines: Mutex::new(Vec::new()),
                predict_deadlines: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for RecordingModelClient {
        async fn tick(&self, _model_id: &str, deadline_ms: u64) -> ModelCallOutcome {
            self.tick_deadlines.lock().unwrap().push(deadline_ms);
            ModelCallOutcome::Responded
        }

        async fn predict(&self, _model_id: &str, _inference_input: &serde_json::Value, deadline_ms: u64) -> (ModelCallOutcome, Option<serde_json::Value>) {
            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.predict_deadlines.lock().unwrap().push(deadline_ms);
            (ModelCallOutcome::Responded, Some(serde_json::json!({ "signal": 1.0 })))
        }
    }

    fn test_config() -> ScheduledPredictionConfig {
        ScheduledPredictionConfig {
            id: "cfg1".to_string(),
            scope_key: "pyth/BTC-USD/price/1m".to_string(),
            scope: PredictionScope::new("BTC-USD", 3600, 60),
            schedule: Schedule::EverySeconds(60),
            active: true,
            order: 0,
            resolve_after_seconds: 120,
            lookback_seconds: 300,
            requires_tick: true,
            predict_timeout_ms: 111,
            tick_timeout_ms: 222,
        }
    }

    #[tokio::test]
    async fn model_fan_out_is_concurrent_with_distinct_tick_and_predict_deadlines() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let feed_store = FeedStore::new(store.clone());
        let predict_store = PredictStore::new(store);
        let process_log = ProcessLog::open(dir.path()).unwrap();

        let config = test_config();
        feed_store
            .upsert_records(
                &config.scope_key,
                vec![FeedRecord {
                    source: "pyth".to_string(),
                    subject: "BTC-USD".to_string(),
                    kind: "price".to_string(),
                    granularity: "1m".to_string(),
                    ts_event: 50,
                    payload: FeedPayload::Tick { price: 100.0 },
                    meta: serde_json::json!({}),
                }],
            )
            .unwrap();

        let runner = ModelRunner::new(5, 5);
        for model_id in ["m1", "m2", "m3", "m4"] {
            runner.register(model_id);
        }

        let client = RecordingModelClient::new();
        let input_builder_fallback = DefaultInferenceInputBuilder;
        let output_validator_fallback = DefaultInferenceOutputValidator;
        let deps = CycleDeps {
            feed_store: &feed_store,
            predict_store: &predict_store,
            runner: &runner,
            model_client: &client,
            input_builder: &InferenceInputBuilderKind::Default,
            input_builder_fallback: &input_builder_fallback,
            output_validator: &InferenceOutputValidatorKind::Default,
            output_validator_fallback: &output_validator_fallback,
            process_log: &process_log,
        };

        let outcome = run_cycle(&config, 100, deps).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Committed { prediction_count: 4, .. }));

        assert!(client.max_in_flight.load(Ordering::SeqCst) > 1, "predict calls never overlapped");
        assert_eq!(*client.tick_deadlines.lock().unwrap(), vec![222, 222, 222, 222]);
        assert_eq!(*client.predict_deadlines.lock().unwrap(), vec![111, 111, 111, 111]);
    }
}
