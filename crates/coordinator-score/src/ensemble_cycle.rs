//! Phase E — Ensembles (spec §4.3): synthesizes one virtual-model Prediction
//! per configured ensemble, per Input scored this tick, then scores it
//! through the same `ScoringFunction` real models use.

use crate::ensemble::{compute_weights, model_variance, weighted_average, ModelFilter};
use crate::metrics::{MetricSeries, MetricsContext, MetricsRegistry};
use crate::snapshot::series_for;
use coordinator_config::callables::ScoringFunctionKind;
use coordinator_config::{EnsembleConfig, ScoringFunction};
use coordinator_types::{ensemble_model_id, Input, Prediction};
use serde_json::json;
use std::collections::HashMap;

fn signal_of(prediction: &Prediction) -> Option<f64> {
    prediction.inference_output.as_ref().and_then(|v| v.as_object()?.get("signal")?.as_f64())
}

/// Resolves `{model_id -> metric_name's value}` for every model present in
/// `by_model`, using this tick's own scored predictions as the series
/// (spec §4.3 Phase E: `min_metric(name, threshold)` reads the named
/// metric, not the raw scoring-function output).
fn model_metric_values(
    by_model: &HashMap<String, Vec<&(Input, Prediction)>>,
    all_model_series: &[(String, MetricSeries)],
    metrics_registry: &MetricsRegistry,
    metric_name: &str,
    window_start: i64,
    window_end: i64,
) -> HashMap<String, f64> {
    let Ok(metric_fn) = metrics_registry.resolve(metric_name) else {
        tracing::warn!(metric = %metric_name, "ensemble model_filter references an unresolvable metric, no candidates admitted");
        return HashMap::new();
    };
    by_model
        .iter()
        .filter_map(|(model_id, pairs)| {
            let ctx = MetricsContext {
                model_id: model_id.clone(),
                window_start,
                window_end,
                series: series_for(pairs),
                all_model_series: all_model_series.to_vec(),
                ensemble_series: Vec::new(),
            };
            metric_fn(&ctx).map(|v| (model_id.clone(), v))
        })
        .collect()
}

/// Builds and scores one ensemble Prediction per `(ensemble, input)` pair,
/// from the real-model Predictions scored this tick for that Input.
/// `ranking_key` is `Aggregation.ranking_key`, the metric `top_n`/`all`
/// filters fall back to since they name no metric of their own.
pub fn build_ensemble_predictions(
    ensembles: &[EnsembleConfig],
    scored_this_tick: &[(Input, Prediction)],
    scoring: &ScoringFunctionKind,
    fallback: &dyn ScoringFunction,
    metrics_registry: &MetricsRegistry,
    ranking_key: &str,
    now: i64,
) -> Vec<(Input, Prediction)> {
    let mut by_input: HashMap<String, (Input, Vec<Prediction>)> = HashMap::new();
    let mut by_model: HashMap<String, Vec<&(Input, Prediction)>> = HashMap::new();
    for pair @ (input, prediction) in scored_this_tick {
        if prediction.score.as_ref().map(|s| s.success) != Some(true) {
            continue;
        }
        by_input
            .entry(input.id.clone())
            .or_insert_with(|| (input.clone(), Vec::new()))
            .1
            .push(prediction.clone());
        by_model.entry(prediction.model_id.clone()).or_default().push(pair);
    }

    let window_start = scored_this_tick.iter().map(|(i, _)| i.performed_at).min().unwrap_or(now);
    let all_model_series: Vec<(String, MetricSeries)> = by_model.iter().map(|(id, pairs)| (id.clone(), series_for(pairs))).collect();

    let mut out = Vec::new();

    for ensemble in ensembles {
        let filter = match ModelFilter::parse(ensemble.model_filter.as_deref()) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(ensemble = %ensemble.name, error = %e, "skipping ensemble with unparseable model_filter");
                continue;
            }
        };

        // `all` admits every model regardless of any metric, so there's
        // nothing to resolve; `top_n`/`min_metric` need a real value per
        // candidate and drop models the metric can't be computed for.
        let metric_values = if matches!(&filter, ModelFilter::All) {
            HashMap::new()
        } else {
            let metric_name = filter.metric_name(ranking_key);
            model_metric_values(&by_model, &all_model_series, metrics_registry, metric_name, window_start, now)
        };

        for (input, predictions) in by_input.values() {
            let candidates: Vec<(String, f64)> = predictions
                .iter()
                .filter_map(|p| match &filter {
                    ModelFilter::All => Some((p.model_id.clone(), 0.0)),
                    _ => metric_values.get(&p.model_id).map(|v| (p.model_id.clone(), *v)),
                })
                .collect();
            let members = filter.apply(&candidates);
            if members.len() < 2 {
                continue;
            }

            let member_predictions: Vec<&Prediction> = predictions.iter().filter(|p| members.contains(&p.model_id)).collect();
            let variances: Vec<_> = member_predictions
                .iter()
                .map(|p| model_variance(p.model_id.clone(), &[signal_of(p).unwrap_or(0.0)]))
                .collect();
            let weights = compute_weights(ensemble.strategy, &variances);
            let series_by_model: Vec<(String, Vec<f64>)> =
                member_predictions.iter().map(|p| (p.model_id.clone(), vec![signal_of(p).unwrap_or(0.0)])).collect();
            let weighted = weighted_average(&weights, &series_by_model);
            let signal = weighted.first().copied().unwrap_or(0.0);

            let virtual_model_id = ensemble_model_id(&ensemble.name);
            let ensemble_prediction_id = format!("{}:{}", virtual_model_id, input.id);
            let mut prediction = Prediction::pending(
                ensemble_prediction_id,
                virtual_model_id,
                input.id.clone(),
                input.config_id.clone(),
                input.scope.clone(),
                json!({ "signal": signal }),
                0,
            );
            prediction.meta = Some(json!({ "weights": weights }));

            let score = match scoring {
                ScoringFunctionKind::Default => fallback.score(&prediction, input),
                ScoringFunctionKind::Custom(f) => f.score(&prediction, input),
            };
            if score.success {
                let _ = prediction.mark_scored(score);
            } else {
                let _ = prediction.mark_failed(score.failed_reason.unwrap_or_default());
            }

            out.push((input.clone(), prediction));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::DefaultScoringFunction;
    use coordinator_config::EnsembleStrategy;
    use coordinator_types::PredictionScope;

    #[test]
    fn ensemble_prediction_is_built_from_member_signals() {
        let scope = PredictionScope::new("BTC-USD", 3600, 60);
        let mut input = Input::new("i1", "cfg1", scope.clone(), json!({}), 0, 60);
        input.resolve(json!({"actual": 10.0})).unwrap();

        let mut p1 = Prediction::pending("p1", "m1", "i1", "cfg1", scope.clone(), json!({"signal": 9.0}), 10);
        p1.mark_scored(coordinator_types::Score::success(-1.0)).unwrap();
        let mut p2 = Prediction::pending("p2", "m2", "i1", "cfg1", scope, json!({"signal": 11.0}), 10);
        p2.mark_scored(coordinator_types::Score::success(-1.0)).unwrap();

        let ensembles = vec![EnsembleConfig {
            name: "main".to_string(),
            strategy: EnsembleStrategy::EqualWeight,
            model_filter: None,
        }];
        let scored = vec![(input.clone(), p1), (input, p2)];
        let registry = MetricsRegistry::new();
        let built = build_ensemble_predictions(&ensembles, &scored, &ScoringFunctionKind::Default, &DefaultScoringFunction, &registry, "ic", 100);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].1.model_id, "__ensemble_main__");
    }

    fn scored_prediction(id: &str, model_id: &str, input_id: &str, scope: PredictionScope, signal: f64) -> Prediction {
        let mut p = Prediction::pending(id, model_id, input_id, "cfg1", scope, json!({"signal": signal}), 10);
        p.mark_scored(coordinator_types::Score::success(signal)).unwrap();
        p
    }

    #[test]
    fn min_metric_filters_select_different_members_by_name() {
        let scope = PredictionScope::new("BTC-USD", 3600, 60);

        let mut input_a = Input::new("ia", "cfg1", scope.clone(), json!({}), 0, 60);
        input_a.resolve(json!({"actual": 1.0})).unwrap();
        let mut input_b = Input::new("ib", "cfg1", scope.clone(), json!({}), 60, 120);
        input_b.resolve(json!({"actual": -1.0})).unwrap();

        // m1 tracks the sign flip (good `ic`) but never changes its signal
        // magnitude (zero `turnover`). m2 does the opposite: constant sign
        // (bad `ic`) but a large swing in magnitude (high `turnover`).
        let m1a = scored_prediction("p1a", "m1", "ia", scope.clone(), 1.0);
        let m1b = scored_prediction("p1b", "m1", "ib", scope.clone(), -1.0);
        let m2a = scored_prediction("p2a", "m2", "ia", scope.clone(), 1.0);
        let m2b = scored_prediction("p2b", "m2", "ib", scope.clone(), 5.0);

        let scored = vec![(input_a.clone(), m1a), (input_b.clone(), m1b), (input_a, m2a), (input_b, m2b)];
        let registry = MetricsRegistry::new();

        let ic_ensemble = vec![EnsembleConfig {
            name: "by_ic".to_string(),
            strategy: EnsembleStrategy::EqualWeight,
            model_filter: Some("min_metric(ic,0.5)".to_string()),
        }];
        let by_ic = build_ensemble_predictions(&ic_ensemble, &scored, &ScoringFunctionKind::Default, &DefaultScoringFunction, &registry, "ic", 200);

        let turnover_ensemble = vec![EnsembleConfig {
            name: "by_turnover".to_string(),
            strategy: EnsembleStrategy::EqualWeight,
            model_filter: Some("min_metric(turnover,3.0)".to_string()),
        }];
        let by_turnover =
            build_ensemble_predictions(&turnover_ensemble, &scored, &ScoringFunctionKind::Default, &DefaultScoringFunction, &registry, "ic", 200);

        // `min_metric(ic,0.5)` needs both members to clear the bar, which
        // only m1 does alone, so the ensemble (needs >= 2 members) is empty.
        assert!(by_ic.is_empty());
        // `min_metric(turnover,3.0)` only m2 clears, same single-member gap.
        assert!(by_turnover.is_empty());
    }
}
