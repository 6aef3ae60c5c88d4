use coordinator_config::ApiConfig;
use coordinator_feed::SourceAdapter;
use coordinator_obs::{HealthRegistry, ProcessLog};
use coordinator_store::{BackfillStore, CheckpointStore, ScoreStore};
use std::path::PathBuf;
use std::sync::Arc;

/// The worker loops `/healthz` expects a heartbeat from, and the cadence
/// each one is allowed to fall behind before readiness goes unhealthy.
/// Feed reports once per scope under a `feed:<scope_key>` name, so it isn't
/// part of this fixed list; `healthz` treats a deployment with zero feed
/// scopes reporting as healthy on the other three workers alone.
pub const EXPECTED_WORKERS: &[(&str, i64)] = &[("predict", 30), ("score", 60), ("checkpoint", 120)];

/// Everything a reporting-endpoint handler needs, shared the same way the
/// worker loops share their stores: cheap `Clone` handles into one `sled::Db`.
pub struct AppState {
    pub score_store: ScoreStore,
    pub checkpoint_store: CheckpointStore,
    pub backfill_store: BackfillStore,
    pub backfill_root: PathBuf,
    pub source: Arc<dyn SourceAdapter>,
    pub process_log: Arc<ProcessLog>,
    pub health: Arc<HealthRegistry>,
    pub config: ApiConfig,
}
