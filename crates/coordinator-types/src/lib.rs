//! Shared data model for the crunch coordinator.
//!
//! Every entity here mirrors one of the persisted tables described in the
//! protocol: feed records and watermarks, scheduled prediction configs,
//! inputs/predictions/scores, snapshots, the Merkle chain, checkpoints,
//! models and leaderboards. Status machines are encoded as enums whose
//! variants only allow the one-way transitions the protocol requires;
//! illegal transitions are a compile error or a returned `Err`, never a
//! silently-accepted mutation.

pub mod canonical;
pub mod checkpoint;
pub mod feed;
pub mod merkle_entities;
pub mod model;
pub mod prediction;
pub mod scope;

pub use canonical::{canonical_json, content_hash, ContentHash};
pub use checkpoint::{Checkpoint, CheckpointStatus, EmissionPayload, IllegalStatusTransition, RewardShare};
pub use feed::{BackfillJob, BackfillStatus, FeedIngestionState, FeedPayload, FeedRecord};
pub use merkle_entities::{MerkleCycle, MerkleNode, MerkleNodeOwner};
pub use model::{Leaderboard, LeaderboardEntry, Model, Snapshot};
pub use prediction::{Input, InputStatus, Prediction, PredictionStatus, Score};
pub use scope::{PredictionScope, ScheduledPredictionConfig, Schedule};

/// Denominator for `frac64` fixed-point reward encoding (1e9 = 100%).
pub const FRAC64_DENOMINATOR: u64 = 1_000_000_000;

/// Reserved prefix identifying a virtual ensemble model in the `model_id` namespace.
pub fn ensemble_model_id(name: &str) -> String {
    format!("__ensemble_{name}__")
}

/// True if `model_id` names a virtual ensemble model.
pub fn is_ensemble_model(model_id: &str) -> bool {
    model_id.starts_with("__ensemble_") && model_id.ends_with("__")
}
