//! Environment variable overrides (spec §6). Loading hierarchy: env > file >
//! defaults, same order the teacher's `knhk-config` applied them in.

use crate::schema::{ConfigError, CoordinatorConfig};
use std::env;

pub fn apply_env_overrides(config: &mut CoordinatorConfig) -> Result<(), ConfigError> {
    if let Ok(v) = env::var("CRUNCH_ID") {
        config.crunch_id = v;
    }

    if let Ok(v) = env::var("FEED_SOURCE") {
        config.feed.source = v;
    }
    if let Ok(v) = env::var("FEED_SUBJECTS") {
        config.feed.subjects = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if let Ok(v) = env::var("FEED_KIND") {
        config.feed.kind = v;
    }
    if let Ok(v) = env::var("FEED_GRANULARITY") {
        config.feed.granularity = v;
    }

    if let Ok(v) = env::var("SCORING_FUNCTION") {
        config.callables.scoring_function = v;
    }
    if let Ok(v) = env::var("INFERENCE_INPUT_BUILDER") {
        config.callables.inference_input_builder = v;
    }
    if let Ok(v) = env::var("INFERENCE_OUTPUT_VALIDATOR") {
        config.callables.inference_output_validator = v;
    }
    if let Ok(v) = env::var("RESOLVE_GROUND_TRUTH") {
        config.callables.resolve_ground_truth = v;
    }

    if let Ok(v) = env::var("SCORE_INTERVAL_SECONDS") {
        config.score.interval_seconds = parse_u64("SCORE_INTERVAL_SECONDS", &v)?;
    }
    if let Ok(v) = env::var("CHECKPOINT_CRON") {
        config.checkpoint.cron = v;
    }

    if let Ok(v) = env::var("MODEL_RUNNER_HOST") {
        config.model_runner.host = v;
    }
    if let Ok(v) = env::var("MODEL_RUNNER_PORT") {
        config.model_runner.port = v
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("MODEL_RUNNER_PORT invalid: {v}")))?;
    }

    if let Ok(v) = env::var("MODEL_RUNNER_PARTICIPANTS") {
        config.model_runner.participants = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }

    if let Ok(v) = env::var("MODEL_CONSECUTIVE_FAILURE_LIMIT") {
        config.eviction.consecutive_failure_limit = parse_u32("MODEL_CONSECUTIVE_FAILURE_LIMIT", &v)?;
    }
    if let Ok(v) = env::var("MODEL_CONSECUTIVE_TIMEOUT_LIMIT") {
        config.eviction.consecutive_timeout_limit = parse_u32("MODEL_CONSECUTIVE_TIMEOUT_LIMIT", &v)?;
    }

    if let Ok(v) = env::var("API_KEY") {
        config.api.api_key = Some(v);
    }
    if let Ok(v) = env::var("API_READ_AUTH") {
        config.api.read_auth = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = env::var("API_PUBLIC_PREFIXES") {
        config.api.public_prefixes = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }

    Ok(())
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::ValidationError(format!("{name} invalid: {raw}")))
}

fn parse_u32(name: &str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse().map_err(|_| ConfigError::ValidationError(format!("{name} invalid: {raw}")))
}
