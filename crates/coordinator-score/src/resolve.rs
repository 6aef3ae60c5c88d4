//! Phase A — Resolve Inputs (spec §4.3).

use coordinator_config::callables::ResolveGroundTruthKind;
use coordinator_config::ResolveGroundTruth;
use coordinator_store::{PredictStore, StoreResult};
use coordinator_types::Input;

/// Ground-truth resolution is inherently domain-specific (it has to know
/// where to fetch the realized outcome for a subject/horizon); the
/// coordinator ships no built-in resolver and always waits for the TTL
/// sentinel unless a `resolve_ground_truth` callable is configured.
pub struct DefaultResolveGroundTruth;

impl ResolveGroundTruth for DefaultResolveGroundTruth {
    fn resolve(&self, _input: &Input) -> Result<Option<serde_json::Value>, String> {
        Ok(None)
    }
}

pub struct ResolveReport {
    pub resolved: usize,
    pub sentinel_resolved: usize,
    pub still_pending: usize,
}

fn resolve_one(kind: &ResolveGroundTruthKind, fallback: &dyn ResolveGroundTruth, input: &Input) -> Result<Option<serde_json::Value>, String> {
    match kind {
        ResolveGroundTruthKind::Default => fallback.resolve(input),
        ResolveGroundTruthKind::Custom(f) => f.resolve(input),
    }
}

/// Resolves every `Received` Input past its `resolvable_at`. An Input older
/// than `ttl_seconds` past `resolvable_at` with still-unavailable ground
/// truth is resolved with the null-actuals sentinel instead of left
/// pending forever (spec §4.3 Phase A).
pub fn resolve_inputs(
    now: i64,
    ttl_seconds: i64,
    predict_store: &PredictStore,
    resolver: &ResolveGroundTruthKind,
    fallback: &dyn ResolveGroundTruth,
) -> StoreResult<ResolveReport> {
    let mut report = ResolveReport { resolved: 0, sentinel_resolved: 0, still_pending: 0 };

    for mut input in predict_store.resolvable_inputs(now)? {
        let age_past_resolvable = now - input.resolvable_at;

        match resolve_one(resolver, fallback, &input) {
            Ok(Some(actuals)) => {
                if input.resolve(actuals).is_ok() {
                    report.resolved += 1;
                    predict_store.put_input(&input)?;
                }
            }
            Ok(None) => {
                if age_past_resolvable >= ttl_seconds {
                    if input.resolve_with_sentinel().is_ok() {
                        report.sentinel_resolved += 1;
                        predict_store.put_input(&input)?;
                    }
                } else {
                    report.still_pending += 1;
                }
            }
            Err(reason) => {
                tracing::warn!(input_id = %input.id, error = %reason, "ground truth resolution failed, retrying next tick");
                report.still_pending += 1;
            }
        }
    }

    Ok(report)
}
