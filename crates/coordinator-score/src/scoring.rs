//! Phase B — Score Predictions (spec §4.3).

use coordinator_config::callables::ScoringFunctionKind;
use coordinator_config::ScoringFunction;
use coordinator_store::{PredictStore, StoreResult};
use coordinator_types::{Input, Prediction};

/// Negative absolute error between the prediction's `signal`/`value` field
/// and the input's `actual`/`return` field. Used whenever `scoring_function`
/// is left at `"default"` in configuration.
pub struct DefaultScoringFunction;

fn extract_numeric(value: &serde_json::Value, candidates: &[&str]) -> Option<f64> {
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

impl ScoringFunction for DefaultScoringFunction {
    fn score(&self, prediction: &Prediction, input: &Input) -> coordinator_types::Score {
        if input.is_sentinel() {
            return coordinator_types::Score::failure("no ground truth");
        }
        let Some(output) = &prediction.inference_output else {
            return coordinator_types::Score::failure("prediction has no inference_output");
        };
        let Some(actuals) = &input.actuals else {
            return coordinator_types::Score::failure("input has no actuals");
        };
        let (Some(predicted), Some(actual)) = (
            extract_numeric(output, &["signal", "value", "prediction"]),
            extract_numeric(actuals, &["actual", "return", "value"]),
        ) else {
            return coordinator_types::Score::failure("missing numeric signal or actual field");
        };
        coordinator_types::Score::success(-(predicted - actual).abs())
    }
}

fn score_one(kind: &ScoringFunctionKind, fallback: &dyn ScoringFunction, prediction: &Prediction, input: &Input) -> coordinator_types::Score {
    match kind {
        ScoringFunctionKind::Default => fallback.score(prediction, input),
        ScoringFunctionKind::Custom(f) => f.score(prediction, input),
    }
}

pub struct ScoreReport {
    pub scored: usize,
    pub failed: usize,
}

/// Scores every `Pending` Prediction whose Input is `Resolved`. Returns the
/// report plus every `(Input, Prediction)` transitioned this tick, so Phase
/// C/D can build Snapshots without re-scanning the store.
pub fn score_predictions(
    predict_store: &PredictStore,
    scoring: &ScoringFunctionKind,
    fallback: &dyn ScoringFunction,
) -> StoreResult<(ScoreReport, Vec<(Input, Prediction)>)> {
    let mut report = ScoreReport { scored: 0, failed: 0 };
    let mut transitioned = Vec::new();

    for (input, predictions) in predict_store.pending_predictions_for_resolved_inputs()? {
        for mut prediction in predictions {
            let score = score_one(scoring, fallback, &prediction, &input);
            if score.success {
                if prediction.mark_scored(score).is_ok() {
                    report.scored += 1;
                }
            } else if prediction.mark_failed(score.failed_reason.unwrap_or_default()).is_ok() {
                report.failed += 1;
            }
            predict_store.put_prediction(&input.id, &prediction)?;
            transitioned.push((input.clone(), prediction));
        }
    }

    Ok((report, transitioned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_types::{PredictionScope, Score};
    use serde_json::json;

    fn scope() -> PredictionScope {
        PredictionScope::new("BTC-USD", 3600, 60)
    }

    #[test]
    fn default_scoring_is_negative_absolute_error() {
        let input = Input::new("i1", "cfg1", scope(), json!({}), 0, 60);
        let mut input = input;
        input.resolve(json!({"actual": 10.0})).unwrap();
        let prediction = Prediction::pending("p1", "m1", "i1", "cfg1", scope(), json!({"signal": 12.0}), 100);
        let score = DefaultScoringFunction.score(&prediction, &input);
        assert!(score.success);
        assert_eq!(score.value, -2.0);
    }

    #[test]
    fn sentinel_actuals_fail_the_score() {
        let mut input = Input::new("i1", "cfg1", scope(), json!({}), 0, 60);
        input.resolve_with_sentinel().unwrap();
        let prediction = Prediction::pending("p1", "m1", "i1", "cfg1", scope(), json!({"signal": 1.0}), 10);
        let score = DefaultScoringFunction.score(&prediction, &input);
        assert!(!score.success);
    }

    #[test]
    fn missing_fields_fail_closed_not_panic() {
        let mut input = Input::new("i1", "cfg1", scope(), json!({}), 0, 60);
        input.resolve(json!({"unrelated": true})).unwrap();
        let prediction = Prediction::pending("p1", "m1", "i1", "cfg1", scope(), json!({"unrelated": true}), 10);
        let score = DefaultScoringFunction.score(&prediction, &input);
        assert!(!score.success);
        let _ = Score::failure("unused");
    }
}
