//! Phase F — Merkle Cycle Commit (spec §4.3, §3): builds the per-cycle
//! snapshot tree, chains its root onto the previous cycle's `chained_root`,
//! and persists `MerkleCycle` plus every `MerkleNode` in one transaction
//! boundary at the store layer (spec: "Persist MerkleCycle and all
//! MerkleNodes ... in the same transaction").

use coordinator_merkle::{chained_root, MerkleTree};
use coordinator_store::{ScoreStore, StoreError, StoreResult};
use coordinator_types::{ContentHash, MerkleCycle, MerkleNode, MerkleNodeOwner, Snapshot};
use uuid::Uuid;

fn node_id(cycle_id: &str, level: usize, position: usize) -> String {
    format!("{cycle_id}:{level}:{position}")
}

/// Commits one Score cycle's Merkle tree over `snapshots` (already sorted by
/// `model_id` for positional determinism) and returns the persisted cycle.
pub fn commit_merkle_cycle(score_store: &ScoreStore, snapshots: &[Snapshot], now: i64) -> StoreResult<MerkleCycle> {
    let leaves: Vec<[u8; 32]> = snapshots
        .iter()
        .map(|s| {
            ContentHash::from_hex(&s.content_hash)
                .map(|h| *h.as_bytes())
                .map_err(|e| StoreError::InvariantViolation(format!("snapshot {} has a corrupted content_hash: {e}", s.id)))
        })
        .collect::<StoreResult<Vec<[u8; 32]>>>()?;

    let tree = MerkleTree::build(leaves);
    let previous = score_store.latest_merkle_cycle()?;
    let previous_root_bytes = match &previous {
        Some(c) => Some(
            *ContentHash::from_hex(&c.chained_root)
                .map_err(|e| StoreError::InvariantViolation(format!("MerkleCycle {} has a corrupted chained_root: {e}", c.id)))?
                .as_bytes(),
        ),
        None => None,
    };

    let root = tree.root();
    let chained = chained_root(previous_root_bytes.as_ref(), &root);

    let cycle_id = Uuid::new_v4().to_string();
    let cycle = MerkleCycle {
        id: cycle_id.clone(),
        previous_cycle_id: previous.as_ref().map(|c| c.id.clone()),
        previous_cycle_root: previous.as_ref().map(|c| c.chained_root.clone()),
        snapshots_root: ContentHash(root).to_hex(),
        chained_root: ContentHash(chained).to_hex(),
        snapshot_count: snapshots.len() as u64,
        created_at: now,
    };

    let mut nodes = Vec::new();
    for (level, row) in tree.levels().iter().enumerate() {
        for (position, hash) in row.iter().enumerate() {
            let id = node_id(&cycle_id, level, position);
            let (left_child, right_child, snapshot_id, snapshot_content_hash) = if level == 0 {
                let snapshot = snapshots.get(position);
                (None, None, snapshot.map(|s| s.id.clone()), snapshot.map(|s| s.content_hash.clone()))
            } else {
                let left = node_id(&cycle_id, level - 1, position * 2);
                let right_position = if position * 2 + 1 < tree.levels()[level - 1].len() { position * 2 + 1 } else { position * 2 };
                let right = node_id(&cycle_id, level - 1, right_position);
                (Some(left), Some(right), None, None)
            };
            nodes.push(MerkleNode {
                id,
                owner: MerkleNodeOwner::Cycle(cycle_id.clone()),
                level: level as u32,
                position: position as u64,
                hash: ContentHash(*hash).to_hex(),
                left_child,
                right_child,
                snapshot_id,
                snapshot_content_hash,
            });
        }
    }

    score_store.insert_merkle_cycle(&cycle)?;
    score_store.insert_merkle_nodes(&nodes)?;
    Ok(cycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_store::Store;
    use serde_json::json;

    fn snapshot(model_id: &str, hash_seed: u8) -> Snapshot {
        let mut bytes = [0u8; 32];
        bytes[0] = hash_seed;
        Snapshot {
            id: format!("s-{model_id}"),
            model_id: model_id.to_string(),
            period_start: 0,
            period_end: 60,
            prediction_count: 1,
            result_summary: json!({}),
            content_hash: ContentHash(bytes).to_hex(),
            created_at: 0,
        }
    }

    #[test]
    fn first_cycle_has_no_previous_and_chains_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let score_store = ScoreStore::new(store);
        let snapshots = vec![snapshot("m1", 1), snapshot("m2", 2)];
        let cycle = commit_merkle_cycle(&score_store, &snapshots, 100).unwrap();
        assert!(cycle.previous_cycle_id.is_none());
        assert_eq!(cycle.snapshot_count, 2);
        let nodes = score_store.nodes_for_cycle(&cycle.id).unwrap();
        assert!(nodes.len() >= 3);
    }

    #[test]
    fn second_cycle_chains_onto_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let score_store = ScoreStore::new(store);
        let first = commit_merkle_cycle(&score_store, &[snapshot("m1", 1)], 100).unwrap();
        let second = commit_merkle_cycle(&score_store, &[snapshot("m1", 3)], 200).unwrap();
        assert_eq!(second.previous_cycle_id, Some(first.id));
        assert_eq!(second.previous_cycle_root, Some(first.chained_root));
    }

    #[test]
    fn a_cycle_with_zero_snapshots_still_commits_and_chains() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let score_store = ScoreStore::new(store);
        let empty = commit_merkle_cycle(&score_store, &[], 100).unwrap();
        assert_eq!(empty.snapshot_count, 0);
        assert!(empty.previous_cycle_id.is_none());

        let nodes = score_store.nodes_for_cycle(&empty.id).unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].snapshot_id.is_none());

        let next = commit_merkle_cycle(&score_store, &[snapshot("m1", 9)], 200).unwrap();
        assert_eq!(next.previous_cycle_id, Some(empty.id));
        assert_eq!(next.previous_cycle_root, Some(empty.chained_root));
    }

    #[test]
    fn a_truncated_content_hash_fails_the_cycle_instead_of_committing_a_zero_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let score_store = ScoreStore::new(store);

        let mut corrupted = snapshot("m1", 1);
        corrupted.content_hash = "abcd".to_string();

        let err = commit_merkle_cycle(&score_store, &[corrupted], 100).unwrap_err();
        assert!(matches!(err, coordinator_store::StoreError::InvariantViolation(_)));
    }
}
