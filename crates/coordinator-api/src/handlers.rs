use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use coordinator_feed::{BackfillRunner, BackfillScope};
use coordinator_types::{BackfillJob, Checkpoint, Leaderboard, Model, Snapshot};
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{AdvanceStatusBody, ConfirmCheckpointBody, LeaderboardQuery, MerkleProofQuery, SnapshotsQuery, StartBackfillBody};
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, EXPECTED_WORKERS};

/// Readiness reflects whether Predict, Score, and Checkpoint have each
/// reported a heartbeat within their expected cadence (spec §6). Feed
/// scopes aren't in `EXPECTED_WORKERS` since the deployed scope count is
/// runtime config, not a fixed list; a stalled feed scope still shows up
/// in `worker_stopped`/`operator_alert` process-log entries.
pub async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let now = chrono::Utc::now().timestamp();
    if state.health.all_healthy(now, EXPECTED_WORKERS) {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "status": "degraded" })))
    }
}

pub async fn get_leaderboard(State(state): State<Arc<AppState>>, Query(query): Query<LeaderboardQuery>) -> ApiResult<Json<Leaderboard>> {
    let mut board = state.score_store.latest_leaderboard()?.unwrap_or(Leaderboard {
        id: String::new(),
        created_at: 0,
        entries: Vec::new(),
    });
    if !query.include_ensembles {
        board.entries.retain(|e| !coordinator_types::is_ensemble_model(&e.model_id));
    }
    Ok(Json(board))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Model>>> {
    Ok(Json(state.score_store.list_models()?))
}

pub async fn list_snapshots(State(state): State<Arc<AppState>>, Query(query): Query<SnapshotsQuery>) -> ApiResult<Json<Vec<Snapshot>>> {
    let mut snapshots = match &query.model_id {
        Some(model_id) => state.score_store.snapshots_for_model(model_id)?,
        None => {
            let mut all = Vec::new();
            for model in state.score_store.list_models()? {
                all.extend(state.score_store.snapshots_for_model(&model.id)?);
            }
            all.sort_by_key(|s| s.period_end);
            all
        }
    };

    if let Some(since) = query.since {
        snapshots.retain(|s| s.period_end >= since);
    }
    if let Some(until) = query.until {
        snapshots.retain(|s| s.period_end <= until);
    }
    if let Some(limit) = query.limit {
        if snapshots.len() > limit {
            snapshots = snapshots.split_off(snapshots.len() - limit);
        }
    }
    Ok(Json(snapshots))
}

pub async fn list_checkpoints(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Checkpoint>>> {
    Ok(Json(state.checkpoint_store.list()?))
}

pub async fn get_checkpoint_emission(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<coordinator_types::EmissionPayload>> {
    let checkpoint = state.checkpoint_store.get(&id)?.ok_or_else(|| ApiError::not_found(format!("checkpoint {id} not found")))?;
    Ok(Json(checkpoint.emission_payload))
}

pub async fn confirm_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmCheckpointBody>,
) -> ApiResult<Json<Checkpoint>> {
    let now = chrono::Utc::now().timestamp();
    let checkpoint = coordinator_checkpoint::confirm_submission(&state.checkpoint_store, &id, body.tx_hash, now)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(checkpoint))
}

pub async fn advance_checkpoint_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AdvanceStatusBody>,
) -> ApiResult<Json<Checkpoint>> {
    let checkpoint =
        coordinator_checkpoint::advance_status(&state.checkpoint_store, &id, body.status).map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(checkpoint))
}

pub async fn list_merkle_cycles(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<coordinator_types::MerkleCycle>>> {
    Ok(Json(state.score_store.list_merkle_cycles()?))
}

pub async fn get_merkle_proof(State(state): State<Arc<AppState>>, Query(query): Query<MerkleProofQuery>) -> ApiResult<Json<coordinator_checkpoint::SnapshotProof>> {
    let proof = coordinator_checkpoint::build_proof(&state.score_store, &state.checkpoint_store, &query.snapshot_id)?
        .ok_or_else(|| ApiError::not_found(format!("no cycle leaf for snapshot {}", query.snapshot_id)))?;
    Ok(Json(proof))
}

/// Admits a Backfill Job synchronously (so a conflicting request gets an
/// immediate 409) and runs it to completion on a detached task — this
/// endpoint returns as soon as the job is accepted, not when it finishes.
pub async fn start_backfill(State(state): State<Arc<AppState>>, Json(body): Json<StartBackfillBody>) -> ApiResult<(StatusCode, Json<BackfillJob>)> {
    if state.backfill_store.running_job_id()?.is_some() {
        return Err(ApiError::new("CONFLICT", "a backfill job is already running"));
    }

    let scope = BackfillScope {
        source: body.source,
        subject: body.subject,
        kind: body.kind,
        granularity: body.granularity,
    };
    let scope_key = format!("{}/{}/{}/{}", scope.source, scope.subject, scope.kind, scope.granularity);
    let job = BackfillJob::new(Uuid::new_v4().to_string(), scope_key, body.start_ts, body.end_ts);

    let runner = BackfillRunner::new(state.backfill_root.clone(), state.source.clone(), state.backfill_store.clone(), state.process_log.clone());
    let spawned_job = job.clone();
    tokio::spawn(async move {
        if let Err(err) = runner.run(spawned_job, scope).await {
            tracing::error!(error = %err, "backfill job failed");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn backfill_index(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    let mut files = Vec::new();
    collect_parquet_files(&state.backfill_root, &state.backfill_root, &mut files).map_err(|e| ApiError::internal(e.to_string()))?;
    files.sort();
    Ok(Json(files))
}

fn collect_parquet_files(root: &std::path::Path, dir: &std::path::Path, out: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_parquet_files(root, &path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"));
            }
        }
    }
    Ok(())
}

pub async fn serve_backfill_file(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> ApiResult<Vec<u8>> {
    let full_path = state.backfill_root.join(&path);
    let canonical_root = state.backfill_root.canonicalize().map_err(|e| ApiError::internal(e.to_string()))?;
    let canonical_path = full_path.canonicalize().map_err(|_| ApiError::not_found(format!("{path} not found")))?;
    if !canonical_path.starts_with(&canonical_root) {
        return Err(ApiError::bad_request("path escapes backfill root"));
    }
    std::fs::read(&canonical_path).map_err(|_| ApiError::not_found(format!("{path} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coordinator_feed::{BackfillPage, BackfillPageRequest, PollRequest, SourceError};
    use coordinator_obs::{HealthRegistry, ProcessLog};
    use coordinator_store::{BackfillStore, CheckpointStore, ScoreStore, Store};
    use coordinator_types::FeedRecord;

    struct NeverPolledSource;

    #[async_trait]
    impl coordinator_feed::SourceAdapter for NeverPolledSource {
        async fn poll(&self, _request: PollRequest) -> Result<Vec<FeedRecord>, SourceError> {
            Err(SourceError::permanent("not wired in this test"))
        }
        async fn backfill_page(&self, _request: BackfillPageRequest) -> Result<BackfillPage, SourceError> {
            Err(SourceError::permanent("not wired in this test"))
        }
    }

    fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        let store = Store::open(dir).unwrap();
        Arc::new(AppState {
            score_store: ScoreStore::new(store.clone()),
            checkpoint_store: CheckpointStore::new(store.clone()),
            backfill_store: BackfillStore::new(store),
            backfill_root: dir.to_path_buf(),
            source: Arc::new(NeverPolledSource),
            process_log: Arc::new(ProcessLog::open(dir).unwrap()),
            health: Arc::new(HealthRegistry::new()),
            config: coordinator_config::ApiConfig { api_key: None, read_auth: false, public_prefixes: Vec::new() },
        })
    }

    #[tokio::test]
    async fn healthz_is_unavailable_until_every_worker_has_reported() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (status, _) = healthz(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let now = chrono::Utc::now().timestamp();
        for (worker, _) in crate::state::EXPECTED_WORKERS {
            state.health.report(*worker, now);
        }

        let (status, _) = healthz(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
