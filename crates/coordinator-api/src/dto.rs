//! Query-string and request-body shapes for the reporting endpoints.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub include_ensembles: bool,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotsQuery {
    pub model_id: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MerkleProofQuery {
    pub snapshot_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmCheckpointBody {
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusBody {
    pub status: coordinator_types::CheckpointStatus,
}

#[derive(Debug, Deserialize)]
pub struct StartBackfillBody {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
    pub start_ts: i64,
    pub end_ts: i64,
}
