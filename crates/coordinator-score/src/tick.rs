//! Score tick orchestration: Phases A through G (spec §4.3), guarded by the
//! heartbeat lock singleton (spec §5).

use crate::ensemble_cycle::build_ensemble_predictions;
use crate::leaderboard::rebuild_leaderboard;
use crate::merkle_commit::commit_merkle_cycle;
use crate::metrics::MetricsRegistry;
use crate::resolve::{resolve_inputs, DefaultResolveGroundTruth};
use crate::scoring::{score_predictions, DefaultScoringFunction};
use crate::snapshot::{build_snapshots, DefaultAggregateSnapshot};
use coordinator_config::{CallableRegistry, CoordinatorConfig};
use coordinator_obs::{ProcessLog, ProcessLogEntry};
use coordinator_store::{PredictStore, ScoreStore, StoreResult};
use coordinator_types::Model;

/// Registers a model the first time it produces a Snapshot. The reporting
/// surface's `/reports/models` listing is read straight from this table, so
/// a model that has never snapshotted never appears there (spec §4.3 Phase
/// C is silent on registry population; this keeps the table populated
/// without a separate registration step elsewhere in the pipeline).
fn ensure_model_registered(score_store: &ScoreStore, model_id: &str) -> StoreResult<()> {
    if score_store.get_model(model_id)?.is_some() {
        return Ok(());
    }
    score_store.put_model(&Model {
        id: model_id.to_string(),
        name: model_id.to_string(),
        deployment_id: String::new(),
        owner_id: String::new(),
        overall_score: None,
        scores_by_scope: None,
        meta: serde_json::json!({}),
    })
}

#[derive(Debug)]
pub enum TickOutcome {
    LockNotAcquired,
    Completed { cycle_id: String, snapshot_count: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Store(#[from] coordinator_store::StoreError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    AuditLog(#[from] coordinator_obs::AuditLogError),
}

pub struct TickDeps<'a> {
    pub predict_store: &'a PredictStore,
    pub score_store: &'a ScoreStore,
    pub callables: &'a CallableRegistry,
    pub metrics_registry: &'a MetricsRegistry,
    pub process_log: &'a ProcessLog,
}

/// Runs one Score tick end to end if the heartbeat lock is free, else
/// returns [`TickOutcome::LockNotAcquired`] (another worker owns it).
pub fn run_tick(config: &CoordinatorConfig, now: i64, owner: &str, deps: TickDeps<'_>) -> Result<TickOutcome, TickError> {
    let span = coordinator_obs::spans::tick_span("score", owner);
    let _guard = span.enter();

    if !deps.score_store.acquire_tick_lock(owner, now, config.score.heartbeat_ttl_seconds)? {
        return Ok(TickOutcome::LockNotAcquired);
    }

    let outcome = run_tick_inner(config, now, deps);
    let _ = deps.score_store.release_tick_lock(owner);

    match &outcome {
        Ok(TickOutcome::Completed { cycle_id, snapshot_count }) => {
            tracing::info!(cycle_id = %cycle_id, snapshot_count, "score tick committed");
        }
        Ok(TickOutcome::LockNotAcquired) => {}
        Err(e) => tracing::error!(error = %e, "score tick failed"),
    }

    outcome
}

fn run_tick_inner(config: &CoordinatorConfig, now: i64, deps: TickDeps<'_>) -> Result<TickOutcome, TickError> {
    // Phase A
    let resolve_report = resolve_inputs(
        now,
        config.score.resolution_ttl_seconds,
        deps.predict_store,
        &deps.callables.resolve_ground_truth,
        &DefaultResolveGroundTruth,
    )?;
    tracing::debug!(
        resolved = resolve_report.resolved,
        sentinel = resolve_report.sentinel_resolved,
        pending = resolve_report.still_pending,
        "phase a: resolve inputs"
    );

    // Phase B
    let (score_report, scored_this_tick) = score_predictions(deps.predict_store, &deps.callables.scoring_function, &DefaultScoringFunction)?;
    tracing::debug!(scored = score_report.scored, failed = score_report.failed, "phase b: score predictions");

    // Phase E runs before C/D: ensemble predictions snapshot identically to real ones.
    let mut all_scored = scored_this_tick;
    let ensemble_predictions = build_ensemble_predictions(
        &config.ensembles,
        &all_scored,
        &deps.callables.scoring_function,
        &DefaultScoringFunction,
        deps.metrics_registry,
        &config.aggregation.ranking_key,
        now,
    );
    for (input, prediction) in &ensemble_predictions {
        deps.predict_store.put_prediction(&input.id, prediction)?;
    }
    all_scored.extend(ensemble_predictions);

    let period_start = all_scored.iter().map(|(i, _)| i.performed_at).min().unwrap_or(now);
    let period_end = now;

    // Phase C + D. An empty live model set still produces an empty
    // snapshot list; the cycle below still commits with the empty-tree
    // root convention (spec §8 boundary behavior) rather than skipping
    // the chain link entirely.
    let snapshots = build_snapshots(
        &all_scored,
        period_start,
        period_end,
        now,
        &deps.callables.aggregate_snapshot,
        &DefaultAggregateSnapshot,
        deps.metrics_registry,
        &config.metrics,
    )?;
    let mut persisted = Vec::with_capacity(snapshots.len());
    for snapshot in &snapshots {
        if deps.score_store.upsert_snapshot(snapshot)? {
            persisted.push(snapshot.clone());
            ensure_model_registered(deps.score_store, &snapshot.model_id)?;
        }
    }

    // Phase F
    let cycle = commit_merkle_cycle(deps.score_store, &persisted, now)?;

    // Phase G
    rebuild_leaderboard(deps.score_store, &persisted, &config.aggregation, now)?;

    deps.process_log.append(
        ProcessLogEntry::new("score", "tick_committed").with_cycle(&cycle.id).with_detail(serde_json::json!({
            "snapshot_count": persisted.len(),
            "scored": score_report.scored,
            "failed": score_report.failed,
        })),
    )?;

    Ok(TickOutcome::Completed {
        cycle_id: cycle.id,
        snapshot_count: persisted.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_store::Store;

    #[test]
    fn ensure_model_registered_is_idempotent_and_never_overwrites_scores() {
        let dir = tempfile::tempdir().unwrap();
        let score_store = ScoreStore::new(Store::open(dir.path()).unwrap());

        ensure_model_registered(&score_store, "m1").unwrap();
        let first = score_store.get_model("m1").unwrap().unwrap();
        assert_eq!(first.overall_score, None);

        score_store
            .put_model(&Model {
                id: "m1".to_string(),
                name: "m1".to_string(),
                deployment_id: String::new(),
                owner_id: String::new(),
                overall_score: Some(0.87),
                scores_by_scope: None,
                meta: serde_json::json!({}),
            })
            .unwrap();

        ensure_model_registered(&score_store, "m1").unwrap();
        let second = score_store.get_model("m1").unwrap().unwrap();
        assert_eq!(second.overall_score, Some(0.87));
    }
}
