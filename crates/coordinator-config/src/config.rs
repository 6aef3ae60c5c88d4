//! Load hierarchy (teacher convention): env > file > defaults, followed by
//! validation of the contract-shape invariants (spec §4.5).

use crate::env::apply_env_overrides;
use crate::schema::{CoordinatorConfig, RankingDirection};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::schema::ConfigError;

/// Loads `CoordinatorConfig` from the file at `$COORDINATOR_CONFIG_PATH`
/// (default `./coordinator.toml`, skipped silently if absent), then layers
/// environment variable overrides, then validates the result.
pub fn load_config() -> Result<CoordinatorConfig, ConfigError> {
    let path = config_file_path();

    let mut config = if path.exists() {
        load_from_file(&path)?
    } else {
        CoordinatorConfig::default()
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn config_file_path() -> PathBuf {
    env::var("COORDINATOR_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("coordinator.toml"))
}

/// Fails fast on anything that would otherwise surface as a confusing
/// runtime error deep in a worker loop (spec §7 "Configuration error at
/// startup").
pub fn validate_config(config: &CoordinatorConfig) -> Result<(), ConfigError> {
    if config.crunch_id.trim().is_empty() {
        return Err(ConfigError::ValidationError("crunch_id must not be empty".into()));
    }

    if config.callables.scoring_function.trim().is_empty() {
        return Err(ConfigError::ValidationError("callables.scoring_function is required".into()));
    }
    if config.callables.inference_input_builder.trim().is_empty() {
        return Err(ConfigError::ValidationError("callables.inference_input_builder is required".into()));
    }
    if config.callables.inference_output_validator.trim().is_empty() {
        return Err(ConfigError::ValidationError("callables.inference_output_validator is required".into()));
    }
    if config.callables.resolve_ground_truth.trim().is_empty() {
        return Err(ConfigError::ValidationError("callables.resolve_ground_truth is required".into()));
    }

    if config.score.resolution_grace_seconds as i64 >= config.score.resolution_ttl_seconds {
        return Err(ConfigError::ValidationError(
            "score.resolution_grace_seconds must be smaller than score.resolution_ttl_seconds".into(),
        ));
    }

    if config.model_runner.predict_timeout_ms == 0 || config.model_runner.tick_timeout_ms == 0 {
        return Err(ConfigError::ValidationError("model_runner timeouts must be non-zero".into()));
    }
    if config.model_runner.predict_timeout_ms > config.model_runner.tick_timeout_ms {
        return Err(ConfigError::ValidationError(
            "model_runner.predict_timeout_ms must not exceed model_runner.tick_timeout_ms".into(),
        ));
    }

    for ensemble in &config.ensembles {
        if ensemble.name.trim().is_empty() {
            return Err(ConfigError::ValidationError("ensemble name must not be empty".into()));
        }
    }

    if !matches!(config.aggregation.ranking_direction, RankingDirection::Ascending | RankingDirection::Descending) {
        unreachable!("RankingDirection has exactly two variants");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_once_required_callables_are_set() {
        let mut config = CoordinatorConfig::default();
        config.callables.scoring_function = "default".into();
        config.callables.inference_input_builder = "default".into();
        config.callables.inference_output_validator = "default".into();
        config.callables.resolve_ground_truth = "default".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_scoring_function_fails_fast() {
        let config = CoordinatorConfig::default();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn grace_window_must_be_shorter_than_ttl() {
        let mut config = CoordinatorConfig::default();
        config.callables.scoring_function = "default".into();
        config.callables.inference_input_builder = "default".into();
        config.callables.inference_output_validator = "default".into();
        config.callables.resolve_ground_truth = "default".into();
        config.score.resolution_grace_seconds = 100;
        config.score.resolution_ttl_seconds = 100;
        assert!(validate_config(&config).is_err());
    }
}
