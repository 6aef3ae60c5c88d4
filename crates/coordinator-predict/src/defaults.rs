//! Built-in fallbacks for the two callable slots this crate drives
//! (spec §4.5's `Kind::Default` variant), used whenever a
//! `ScheduledPredictionConfig`'s crunch leaves `inference_input_builder` /
//! `inference_output_validator` at `"default"`.

use coordinator_config::{InferenceInputBuilder, InferenceOutputValidator};
use coordinator_types::PredictionScope;
use serde_json::Value;

/// Wraps the raw feed window and the firing scope verbatim into
/// `{"scope": .., "window": ..}`, leaving any reshaping to a custom
/// builder registered for a specific crunch.
#[derive(Debug, Default)]
pub struct DefaultInferenceInputBuilder;

impl InferenceInputBuilder for DefaultInferenceInputBuilder {
    fn build(&self, raw_feed_window: &Value, scope: &PredictionScope) -> Result<Value, String> {
        Ok(serde_json::json!({
            "scope": scope,
            "window": raw_feed_window,
        }))
    }
}

/// Accepts anything but `null`; a model that returns no payload at all is
/// the only shape rejected without crunch-specific validation rules.
#[derive(Debug, Default)]
pub struct DefaultInferenceOutputValidator;

impl InferenceOutputValidator for DefaultInferenceOutputValidator {
    fn validate(&self, output: &Value) -> Result<(), String> {
        if output.is_null() {
            Err("model output was null".to_string())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_input_builder_wraps_scope_and_window_verbatim() {
        let scope = PredictionScope::new("pyth/BTC", 300, 60);
        let window = serde_json::json!([{"ts_event": 1, "value": 42.0}]);
        let input = DefaultInferenceInputBuilder.build(&window, &scope).unwrap();
        assert_eq!(input["window"], window);
        assert_eq!(input["scope"]["subject"], "pyth/BTC");
    }

    #[test]
    fn default_output_validator_rejects_only_null() {
        assert!(DefaultInferenceOutputValidator.validate(&serde_json::json!(null)).is_err());
        assert!(DefaultInferenceOutputValidator.validate(&serde_json::json!({"p50": 1.0})).is_ok());
        assert!(DefaultInferenceOutputValidator.validate(&serde_json::json!(0)).is_ok());
    }
}
