//! Phase C — Snapshots and Phase D — Multi-Metric Enrichment (spec §4.3),
//! built together: the `content_hash` Merkle leaf commits over the fully
//! enriched `result_summary`, since `ScoreStore::upsert_snapshot` is a
//! write-once table and there is no later step to patch the hash.

use crate::metrics::{MetricSeries, MetricsContext, MetricsRegistry};
use coordinator_config::callables::AggregateSnapshotKind;
use coordinator_config::AggregateSnapshot;
use coordinator_types::{content_hash, Input, Prediction, Score, Snapshot};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Mean of each scored Prediction's `score.value`, used when
/// `aggregate_snapshot` is left at `"default"`.
pub struct DefaultAggregateSnapshot;

impl AggregateSnapshot for DefaultAggregateSnapshot {
    fn aggregate(&self, scores: &[Score]) -> Value {
        let successes: Vec<f64> = scores.iter().filter(|s| s.success).map(|s| s.value).collect();
        let mean = if successes.is_empty() { 0.0 } else { successes.iter().sum::<f64>() / successes.len() as f64 };
        json!({ "mean_score": mean, "scored_count": successes.len(), "total_count": scores.len() })
    }
}

fn aggregate_one(kind: &AggregateSnapshotKind, fallback: &dyn AggregateSnapshot, scores: &[Score]) -> Value {
    match kind {
        AggregateSnapshotKind::Default => fallback.aggregate(scores),
        AggregateSnapshotKind::Custom(f) => f.aggregate(scores),
    }
}

pub(crate) fn extract_numeric(value: &Value, candidates: &[&str]) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let obj = value.as_object()?;
    for key in candidates {
        if let Some(v) = obj.get(*key).and_then(|v| v.as_f64()) {
            return Some(v);
        }
    }
    None
}

pub(crate) fn series_for(model_predictions: &[&(Input, Prediction)]) -> MetricSeries {
    let mut signals = Vec::new();
    let mut realized_returns = Vec::new();
    for (input, prediction) in model_predictions {
        let signal = prediction
            .inference_output
            .as_ref()
            .and_then(|o| extract_numeric(o, &["signal", "value", "prediction"]));
        let actual = input.actuals.as_ref().and_then(|a| extract_numeric(a, &["actual", "return", "value"]));
        if let (Some(s), Some(r)) = (signal, actual) {
            signals.push(s);
            realized_returns.push(r);
        }
    }
    MetricSeries { signals, realized_returns }
}

fn bucket_boundaries(len: usize) -> Vec<usize> {
    const BUCKET_SIZE: usize = 5;
    if len == 0 {
        return Vec::new();
    }
    (BUCKET_SIZE..len).step_by(BUCKET_SIZE).collect()
}

/// Builds one Snapshot per distinct `model_id` present in `scored_this_tick`
/// (real models and ensemble virtual models alike, per spec §4.3 Phase E
/// step 4: ensembles flow through Phase C/D identically to real models).
#[allow(clippy::too_many_arguments)]
pub fn build_snapshots(
    scored_this_tick: &[(Input, Prediction)],
    period_start: i64,
    period_end: i64,
    now: i64,
    aggregate: &AggregateSnapshotKind,
    aggregate_fallback: &dyn AggregateSnapshot,
    metrics_registry: &MetricsRegistry,
    configured_metrics: &[String],
) -> serde_json::Result<Vec<Snapshot>> {
    let mut by_model: HashMap<String, Vec<&(Input, Prediction)>> = HashMap::new();
    for pair in scored_this_tick {
        by_model.entry(pair.1.model_id.clone()).or_default().push(pair);
    }

    let all_model_series: Vec<(String, MetricSeries)> =
        by_model.iter().map(|(model_id, pairs)| (model_id.clone(), series_for(pairs))).collect();
    let ensemble_series: Vec<(String, MetricSeries)> = all_model_series
        .iter()
        .filter(|(id, _)| coordinator_types::is_ensemble_model(id))
        .cloned()
        .collect();

    let mut snapshots = Vec::new();

    for (model_id, pairs) in &by_model {
        let scores: Vec<Score> = pairs.iter().filter_map(|(_, p)| p.score.clone()).collect();
        let mut result_summary = aggregate_one(aggregate, aggregate_fallback, &scores);

        let series = series_for(pairs);
        let ctx = MetricsContext {
            model_id: model_id.clone(),
            window_start: period_start,
            window_end: period_end,
            bucket_boundaries: bucket_boundaries(series.len()),
            series,
            all_model_series: all_model_series.clone(),
            ensemble_series: ensemble_series.clone(),
        };

        if let Some(obj) = result_summary.as_object_mut() {
            for metric_name in configured_metrics {
                if let Ok(f) = metrics_registry.resolve(metric_name) {
                    if let Some(value) = f(&ctx) {
                        obj.insert(metric_name.clone(), json!(value));
                    }
                }
            }
        }

        let prediction_count = pairs.len() as u64;
        let snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            model_id: model_id.clone(),
            period_start,
            period_end,
            prediction_count,
            result_summary,
            content_hash: String::new(),
            created_at: now,
        };
        let hash = content_hash(&snapshot.hash_input())?;
        snapshots.push(Snapshot { content_hash: hash.to_hex(), ..snapshot });
    }

    snapshots.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    Ok(snapshots)
}
