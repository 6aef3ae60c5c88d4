//! The callable registry (spec §4.5, §1.3): one trait per pluggable slot,
//! each resolved at startup from the configured slot name to a concrete
//! `Kind` enum variant. A `Custom` variant on every `Kind` carries a
//! `Box<dyn Trait>` registered through [`CallableRegistry::register_*`],
//! so embedding applications can supply competition-specific logic without
//! forking the coordinator. Resolution happens once in
//! [`CallableRegistry::freeze`]; after that the registry is read-only.

use crate::schema::CallableConfig;
use coordinator_types::{Input, Prediction, PredictionScope, Score};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Builds the payload handed to a model's `/predict` endpoint from the raw
/// feed window and the firing scope (spec §4.5: `(raw_feed_window, scope)
/// → inference_input`). An `Err` fails the cycle closed with no
/// persistence side effects (spec §4.2 step 2).
pub trait InferenceInputBuilder: Send + Sync {
    fn build(&self, raw_feed_window: &Value, scope: &PredictionScope) -> Result<Value, String>;
}

/// Validates the raw output returned by a model before it is persisted as
/// a `Prediction.inference_output`.
pub trait InferenceOutputValidator: Send + Sync {
    fn validate(&self, output: &Value) -> Result<(), String>;
}

/// Scores one resolved `Prediction` against its `Input`'s actuals.
pub trait ScoringFunction: Send + Sync {
    fn score(&self, prediction: &Prediction, input: &Input) -> Score;
}

/// Resolves ground truth for a fired `Input`, returning `None` while the
/// outcome is not yet observable (spec §4.3 Phase A retries until TTL).
pub trait ResolveGroundTruth: Send + Sync {
    fn resolve(&self, input: &Input) -> Result<Option<Value>, String>;
}

/// Aggregates a period's scored predictions for one model into the
/// `result_summary` stored on its `Snapshot`.
pub trait AggregateSnapshot: Send + Sync {
    fn aggregate(&self, scores: &[Score]) -> Value;
}

/// Builds the `EmissionPayload` for a checkpoint from its tier-ranked
/// reward shares.
pub trait BuildEmission: Send + Sync {
    fn build(&self, crunch_id: &str, reward_pct_by_cruncher_index: &[(u32, u64)]) -> Value;
}

macro_rules! callable_kind {
    ($kind:ident, $trait_:ident, $builtin:ident) => {
        pub enum $kind {
            $builtin,
            Custom(Arc<dyn $trait_>),
        }

        impl fmt::Debug for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::$builtin => write!(f, stringify!($builtin)),
                    Self::Custom(_) => write!(f, "Custom(..)"),
                }
            }
        }

        impl Clone for $kind {
            fn clone(&self) -> Self {
                match self {
                    Self::$builtin => Self::$builtin,
                    Self::Custom(inner) => Self::Custom(Arc::clone(inner)),
                }
            }
        }
    };
}

callable_kind!(ScoringFunctionKind, ScoringFunction, Default);
callable_kind!(InferenceInputBuilderKind, InferenceInputBuilder, Default);
callable_kind!(InferenceOutputValidatorKind, InferenceOutputValidator, Default);
callable_kind!(ResolveGroundTruthKind, ResolveGroundTruth, Default);
callable_kind!(AggregateSnapshotKind, AggregateSnapshot, Default);
callable_kind!(BuildEmissionKind, BuildEmission, Default);

#[derive(Debug, thiserror::Error)]
pub enum CallableResolutionError {
    #[error("required callable slot '{slot}' has no registered implementation named '{name}'")]
    Unresolved { slot: &'static str, name: String },
}

/// Something a caller can register against a slot name before
/// [`CallableRegistry::freeze`] resolves configured identifiers.
#[derive(Default)]
struct PendingRegistrations {
    scoring_functions: Vec<(String, Arc<dyn ScoringFunction>)>,
    input_builders: Vec<(String, Arc<dyn InferenceInputBuilder>)>,
    output_validators: Vec<(String, Arc<dyn InferenceOutputValidator>)>,
    ground_truth_resolvers: Vec<(String, Arc<dyn ResolveGroundTruth>)>,
    snapshot_aggregators: Vec<(String, Arc<dyn AggregateSnapshot>)>,
    emission_builders: Vec<(String, Arc<dyn BuildEmission>)>,
}

/// Collects custom callable implementations before the registry is frozen.
/// Mirrors the teacher's `init`-hook pattern: an embedding application
/// registers its implementations, then calls `freeze` once at startup.
#[derive(Default)]
pub struct CallableRegistryBuilder {
    pending: PendingRegistrations,
}

impl CallableRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_scoring_function(mut self, name: impl Into<String>, f: impl ScoringFunction + 'static) -> Self {
        self.pending.scoring_functions.push((name.into(), Arc::new(f)));
        self
    }

    pub fn register_inference_input_builder(mut self, name: impl Into<String>, f: impl InferenceInputBuilder + 'static) -> Self {
        self.pending.input_builders.push((name.into(), Arc::new(f)));
        self
    }

    pub fn register_inference_output_validator(mut self, name: impl Into<String>, f: impl InferenceOutputValidator + 'static) -> Self {
        self.pending.output_validators.push((name.into(), Arc::new(f)));
        self
    }

    pub fn register_resolve_ground_truth(mut self, name: impl Into<String>, f: impl ResolveGroundTruth + 'static) -> Self {
        self.pending.ground_truth_resolvers.push((name.into(), Arc::new(f)));
        self
    }

    pub fn register_aggregate_snapshot(mut self, name: impl Into<String>, f: impl AggregateSnapshot + 'static) -> Self {
        self.pending.snapshot_aggregators.push((name.into(), Arc::new(f)));
        self
    }

    pub fn register_build_emission(mut self, name: impl Into<String>, f: impl BuildEmission + 'static) -> Self {
        self.pending.emission_builders.push((name.into(), Arc::new(f)));
        self
    }

    /// Resolves every configured slot name against the built-in `Default`
    /// variant (matched by the literal name `"default"`) and the custom
    /// registrations collected above. A required slot with no match is a
    /// fail-fast startup error; the two optional slots fall back silently
    /// to their built-in defaults when unset.
    pub fn freeze(self, config: &CallableConfig) -> Result<CallableRegistry, CallableResolutionError> {
        let scoring_function = resolve_required(
            "scoring_function",
            &config.scoring_function,
            self.pending.scoring_functions,
            || ScoringFunctionKind::Default,
            ScoringFunctionKind::Custom,
        )?;
        let inference_input_builder = resolve_required(
            "inference_input_builder",
            &config.inference_input_builder,
            self.pending.input_builders,
            || InferenceInputBuilderKind::Default,
            InferenceInputBuilderKind::Custom,
        )?;
        let inference_output_validator = resolve_required(
            "inference_output_validator",
            &config.inference_output_validator,
            self.pending.output_validators,
            || InferenceOutputValidatorKind::Default,
            InferenceOutputValidatorKind::Custom,
        )?;
        let resolve_ground_truth = resolve_required(
            "resolve_ground_truth",
            &config.resolve_ground_truth,
            self.pending.ground_truth_resolvers,
            || ResolveGroundTruthKind::Default,
            ResolveGroundTruthKind::Custom,
        )?;
        let aggregate_snapshot = resolve_optional(
            config.aggregate_snapshot.as_deref(),
            self.pending.snapshot_aggregators,
            || AggregateSnapshotKind::Default,
            AggregateSnapshotKind::Custom,
        );
        let build_emission = resolve_optional(
            config.build_emission.as_deref(),
            self.pending.emission_builders,
            || BuildEmissionKind::Default,
            BuildEmissionKind::Custom,
        );

        Ok(CallableRegistry {
            scoring_function,
            inference_input_builder,
            inference_output_validator,
            resolve_ground_truth,
            aggregate_snapshot,
            build_emission,
        })
    }
}

fn resolve_required<Trait: ?Sized, Kind>(
    slot: &'static str,
    name: &str,
    pending: Vec<(String, Arc<Trait>)>,
    default: impl Fn() -> Kind,
    custom: fn(Arc<Trait>) -> Kind,
) -> Result<Kind, CallableResolutionError> {
    if name == "default" || name.is_empty() {
        return Ok(default());
    }
    pending
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, f)| custom(f))
        .ok_or_else(|| CallableResolutionError::Unresolved {
            slot,
            name: name.to_string(),
        })
}

fn resolve_optional<Trait: ?Sized, Kind>(
    name: Option<&str>,
    pending: Vec<(String, Arc<Trait>)>,
    default: impl Fn() -> Kind,
    custom: fn(Arc<Trait>) -> Kind,
) -> Kind {
    match name {
        None | Some("default") | Some("") => default(),
        Some(n) => pending.into_iter().find(|(pn, _)| pn == n).map(|(_, f)| custom(f)).unwrap_or_else(default),
    }
}

/// Frozen, read-only view of every resolved callable slot. Held as
/// `Arc<CallableRegistry>` by every worker that needs to invoke a slot.
#[derive(Debug, Clone)]
pub struct CallableRegistry {
    pub scoring_function: ScoringFunctionKind,
    pub inference_input_builder: InferenceInputBuilderKind,
    pub inference_output_validator: InferenceOutputValidatorKind,
    pub resolve_ground_truth: ResolveGroundTruthKind,
    pub aggregate_snapshot: AggregateSnapshotKind,
    pub build_emission: BuildEmissionKind,
}
