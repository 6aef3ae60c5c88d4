//! Model, Snapshot, and Leaderboard entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub deployment_id: String,
    pub owner_id: String,
    pub overall_score: Option<f64>,
    pub scores_by_scope: Option<Value>,
    pub meta: Value,
}

impl Model {
    pub fn is_ensemble(&self) -> bool {
        crate::is_ensemble_model(&self.id)
    }
}

/// Per-model period summary; a Merkle leaf via `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub model_id: String,
    pub period_start: i64,
    pub period_end: i64,
    pub prediction_count: u64,
    pub result_summary: Value,
    pub content_hash: String,
    pub created_at: i64,
}

/// The fields that feed `content_hash` (spec §4.3 Phase C step 2): kept as
/// its own serializable struct so the hash input is explicit and doesn't
/// accidentally include `id`/`created_at`/`content_hash` itself.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotHashInput<'a> {
    pub model_id: &'a str,
    pub period_start: i64,
    pub period_end: i64,
    pub prediction_count: u64,
    pub result_summary: &'a Value,
}

impl Snapshot {
    pub fn hash_input(&self) -> SnapshotHashInput<'_> {
        SnapshotHashInput {
            model_id: &self.model_id,
            period_start: self.period_start,
            period_end: self.period_end,
            prediction_count: self.prediction_count,
            result_summary: &self.result_summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub model_id: String,
    pub score: f64,
    pub metrics: Value,
}

/// Rebuilt (never mutated) each Score tick (spec §4.3 Phase G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub id: String,
    pub created_at: i64,
    pub entries: Vec<LeaderboardEntry>,
}
