//! Configuration and callable registry for the crunch coordinator.
//!
//! `CoordinatorConfig` is loaded once at startup ([`config::load_config`])
//! and never mutated afterwards; workers hold it behind an `Arc`. The
//! callable registry ([`callables::CallableRegistry`]) is resolved from
//! that config in the same pass and frozen before any worker loop starts,
//! so a misconfigured or unregistered callable slot is a startup error,
//! never a runtime surprise.

pub mod callables;
pub mod config;
pub mod env;
pub mod schema;

pub use callables::{
    AggregateSnapshot, AggregateSnapshotKind, BuildEmission, BuildEmissionKind, CallableRegistry, CallableRegistryBuilder,
    CallableResolutionError, InferenceInputBuilder, InferenceInputBuilderKind, InferenceOutputValidator,
    InferenceOutputValidatorKind, ResolveGroundTruth, ResolveGroundTruthKind, ScoringFunction, ScoringFunctionKind,
};
pub use config::{load_config, load_from_file, validate_config};
pub use schema::{
    AggregationConfig, ApiConfig, CallableConfig, CheckpointConfig, ConfigError, CoordinatorConfig, EnsembleConfig,
    EnsembleStrategy, EvictionConfig, FeedScopeConfig, ModelRunnerConfig, RankingDirection, ScoreConfig,
};
