//! Proof API (spec §4.4): given a `snapshot_id`, traverse its cycle's
//! snapshot tree up to `snapshots_root`, then (if a Checkpoint has since
//! anchored that cycle) continue through the checkpoint's second-level tree
//! up to `merkle_root`. Walks persisted [`MerkleNode`] rows rather than an
//! in-memory [`coordinator_merkle::MerkleTree`], since the tree that
//! produced a past cycle is not kept resident between ticks.

use coordinator_merkle::Position;
use coordinator_store::{CheckpointStore, ScoreStore, StoreResult};
use coordinator_types::MerkleNode;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProofStep {
    pub hash: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotProof {
    pub snapshot_content_hash: String,
    pub cycle_id: String,
    pub cycle_root: String,
    pub checkpoint_id: Option<String>,
    pub merkle_root: Option<String>,
    pub path: Vec<ProofStep>,
}

/// Walks one persisted tree bottom-up from `leaf` to (not including) its
/// root, using the `{owner_id}:{level}:{position}` node-id convention both
/// `coordinator-score` and `coordinator-checkpoint` commit with.
fn walk_tree(nodes_by_level: &[Vec<MerkleNode>], start_level: usize, start_position: usize) -> Vec<ProofStep> {
    let mut path = Vec::new();
    let mut idx = start_position;
    for level in &nodes_by_level[start_level..nodes_by_level.len().saturating_sub(1)] {
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        let (sibling, position) = if sibling_idx < level.len() {
            (&level[sibling_idx], if idx % 2 == 0 { Position::Right } else { Position::Left })
        } else {
            (&level[idx], Position::Right)
        };
        path.push(ProofStep { hash: sibling.hash.clone(), position });
        idx /= 2;
    }
    path
}

fn group_by_level(mut nodes: Vec<MerkleNode>) -> Vec<Vec<MerkleNode>> {
    nodes.sort_by_key(|n| (n.level, n.position));
    let mut levels: Vec<Vec<MerkleNode>> = Vec::new();
    for node in nodes {
        let level = node.level as usize;
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(node);
    }
    levels
}

pub fn build_proof(score_store: &ScoreStore, checkpoint_store: &CheckpointStore, snapshot_id: &str) -> StoreResult<Option<SnapshotProof>> {
    let Some((cycle_id, leaf)) = score_store.find_cycle_leaf_by_snapshot_id(snapshot_id)? else {
        return Ok(None);
    };

    let cycle_nodes = group_by_level(score_store.nodes_for_cycle(&cycle_id)?);
    let mut path = walk_tree(&cycle_nodes, 0, leaf.position as usize);

    let cycle = score_store.list_merkle_cycles()?.into_iter().find(|c| c.id == cycle_id);
    let Some(cycle) = cycle else {
        return Ok(None);
    };

    let mut checkpoint_id = None;
    let mut merkle_root = None;

    for checkpoint in checkpoint_store.list()? {
        let checkpoint_nodes = group_by_level(score_store.nodes_for_checkpoint(&checkpoint.id)?);
        let Some(leaf_level) = checkpoint_nodes.first() else { continue };
        if let Some(checkpoint_leaf) = leaf_level.iter().find(|n| n.snapshot_id.as_deref() == Some(cycle_id.as_str())) {
            path.extend(walk_tree(&checkpoint_nodes, 0, checkpoint_leaf.position as usize));
            checkpoint_id = Some(checkpoint.id.clone());
            merkle_root = Some(checkpoint.merkle_root.clone());
            break;
        }
    }

    Ok(Some(SnapshotProof {
        snapshot_content_hash: leaf.snapshot_content_hash.unwrap_or_default(),
        cycle_id,
        cycle_root: cycle.snapshots_root,
        checkpoint_id,
        merkle_root,
        path,
    }))
}
