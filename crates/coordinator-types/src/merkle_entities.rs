//! Persisted Merkle tamper-evidence entities: the per-cycle hash chain and
//! the tree nodes backing inclusion proofs for both cycle trees and the
//! checkpoint's second-level tree.

use serde::{Deserialize, Serialize};

/// Per-score-cycle hash-chain link (spec §3, §4.3 Phase F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleCycle {
    pub id: String,
    pub previous_cycle_id: Option<String>,
    pub previous_cycle_root: Option<String>,
    pub snapshots_root: String,
    pub chained_root: String,
    pub snapshot_count: u64,
    pub created_at: i64,
}

/// Which tree a [`MerkleNode`] belongs to: a score cycle's snapshot tree, or
/// a checkpoint's cross-cycle tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleNodeOwner {
    Cycle(String),
    Checkpoint(String),
}

/// A tree node. Leaves copy `snapshot_content_hash` so that later deletion
/// of the Snapshot row (by retention) cannot invalidate inclusion proofs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleNode {
    pub id: String,
    pub owner: MerkleNodeOwner,
    pub level: u32,
    pub position: u64,
    pub hash: String,
    pub left_child: Option<String>,
    pub right_child: Option<String>,
    pub snapshot_id: Option<String>,
    pub snapshot_content_hash: Option<String>,
}
