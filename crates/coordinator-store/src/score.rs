//! Snapshot, MerkleCycle, MerkleNode, Model, and Leaderboard persistence,
//! plus the Score-tick heartbeat lock (spec §4.3, §5).

use crate::codec::{decode, get_typed, padded_seq, put_typed, scan_all};
use crate::error::{StoreError, StoreResult};
use crate::store::{trees, Store};
use coordinator_types::{Leaderboard, MerkleCycle, MerkleNode, Model, Snapshot};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct ScoreStore {
    store: Store,
}

/// `(owner, expires_at)` heartbeat lock guarding the Score-tick singleton
/// (spec §5: "a heartbeat lock (owner, expires_at) protects against
/// double-schedule").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatLock {
    pub owner: String,
    pub expires_at: i64,
}

const SCORE_TICK_LOCK_KEY: &str = "score_tick:heartbeat";

impl ScoreStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Acquire the Score-tick singleton lock. Succeeds if unheld, held by
    /// `owner` already (renewal), or expired.
    pub fn acquire_tick_lock(&self, owner: &str, now: i64, ttl_seconds: i64) -> StoreResult<bool> {
        let locks = self.store.tree(trees::LOCKS)?;
        let current: Option<HeartbeatLock> = get_typed(&locks, SCORE_TICK_LOCK_KEY)?;
        let can_acquire = match &current {
            None => true,
            Some(lock) => lock.owner == owner || lock.expires_at <= now,
        };
        if can_acquire {
            let lock = HeartbeatLock {
                owner: owner.to_string(),
                expires_at: now + ttl_seconds,
            };
            put_typed(&locks, SCORE_TICK_LOCK_KEY, &lock)?;
        }
        Ok(can_acquire)
    }

    pub fn release_tick_lock(&self, owner: &str) -> StoreResult<()> {
        let locks = self.store.tree(trees::LOCKS)?;
        if let Some(lock) = get_typed::<HeartbeatLock>(&locks, SCORE_TICK_LOCK_KEY)? {
            if lock.owner == owner {
                locks.remove(SCORE_TICK_LOCK_KEY.as_bytes())?;
            }
        }
        Ok(())
    }

    /// `UPSERT-on-not-exists` keyed by `(model_id, period_end)` (spec §4.3
    /// idempotence note): re-inserting a snapshot for an already-snapshotted
    /// period is a no-op rather than an overwrite.
    pub fn upsert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<bool> {
        let tree = self.store.tree(trees::SNAPSHOTS)?;
        let key = format!("{}/{}", snapshot.model_id, padded_seq(snapshot.period_end.max(0) as u64));
        if tree.get(key.as_bytes())?.is_some() {
            return Ok(false);
        }
        put_typed(&tree, &key, snapshot)?;
        Ok(true)
    }

    pub fn snapshots_for_period_end(&self, period_end: i64) -> StoreResult<Vec<Snapshot>> {
        let tree = self.store.tree(trees::SNAPSHOTS)?;
        let suffix = format!("/{}", padded_seq(period_end.max(0) as u64));
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (k, v) = entry?;
            if String::from_utf8_lossy(&k).ends_with(&suffix) {
                out.push(decode(&v)?);
            }
        }
        Ok(out)
    }

    pub fn snapshots_for_model(&self, model_id: &str) -> StoreResult<Vec<Snapshot>> {
        let tree = self.store.tree(trees::SNAPSHOTS)?;
        let prefix = format!("{model_id}/");
        let mut out: Vec<Snapshot> = crate::codec::scan_prefix(&tree, &prefix)?;
        out.sort_by_key(|s| s.period_end);
        Ok(out)
    }

    pub fn latest_snapshot_for_model(&self, model_id: &str) -> StoreResult<Option<Snapshot>> {
        Ok(self.snapshots_for_model(model_id)?.pop())
    }

    /// Every Snapshot for `model_id` whose `period_end` falls in
    /// `[period_start, period_end]`, inclusive. A Checkpoint period can span
    /// several Score ticks, so ranking needs all of them, not just the most
    /// recent one ever recorded.
    pub fn snapshots_in_range(&self, model_id: &str, period_start: i64, period_end: i64) -> StoreResult<Vec<Snapshot>> {
        Ok(self
            .snapshots_for_model(model_id)?
            .into_iter()
            .filter(|s| s.period_end >= period_start && s.period_end <= period_end)
            .collect())
    }

    pub fn insert_merkle_cycle(&self, cycle: &MerkleCycle) -> StoreResult<()> {
        let tree = self.store.tree(trees::MERKLE_CYCLES)?;
        put_typed(&tree, &cycle.id, cycle)
    }

    pub fn latest_merkle_cycle(&self) -> StoreResult<Option<MerkleCycle>> {
        let all = self.list_merkle_cycles()?;
        Ok(all.into_iter().max_by_key(|c| c.created_at))
    }

    pub fn list_merkle_cycles(&self) -> StoreResult<Vec<MerkleCycle>> {
        let tree = self.store.tree(trees::MERKLE_CYCLES)?;
        scan_all(&tree)
    }

    pub fn merkle_cycles_since(&self, after: i64) -> StoreResult<Vec<MerkleCycle>> {
        let mut cycles = self.list_merkle_cycles()?;
        cycles.retain(|c| c.created_at > after);
        cycles.sort_by_key(|c| c.created_at);
        Ok(cycles)
    }

    pub fn insert_merkle_nodes(&self, nodes: &[MerkleNode]) -> StoreResult<()> {
        let tree = self.store.tree(trees::MERKLE_NODES)?;
        for node in nodes {
            put_typed(&tree, &node.id, node)?;
        }
        Ok(())
    }

    pub fn get_merkle_node(&self, id: &str) -> StoreResult<Option<MerkleNode>> {
        let tree = self.store.tree(trees::MERKLE_NODES)?;
        get_typed(&tree, id)
    }

    pub fn nodes_for_cycle(&self, cycle_id: &str) -> StoreResult<Vec<MerkleNode>> {
        let tree = self.store.tree(trees::MERKLE_NODES)?;
        let all: Vec<MerkleNode> = scan_all(&tree)?;
        Ok(all
            .into_iter()
            .filter(|n| matches!(&n.owner, coordinator_types::MerkleNodeOwner::Cycle(c) if c == cycle_id))
            .collect())
    }

    pub fn nodes_for_checkpoint(&self, checkpoint_id: &str) -> StoreResult<Vec<MerkleNode>> {
        let tree = self.store.tree(trees::MERKLE_NODES)?;
        let all: Vec<MerkleNode> = scan_all(&tree)?;
        Ok(all
            .into_iter()
            .filter(|n| matches!(&n.owner, coordinator_types::MerkleNodeOwner::Checkpoint(c) if c == checkpoint_id))
            .collect())
    }

    /// Finds the leaf node whose `snapshot_id` matches, and the cycle that
    /// owns it, across every persisted cycle tree (spec §4.4 proof API).
    pub fn find_cycle_leaf_by_snapshot_id(&self, snapshot_id: &str) -> StoreResult<Option<(String, MerkleNode)>> {
        let tree = self.store.tree(trees::MERKLE_NODES)?;
        let all: Vec<MerkleNode> = scan_all(&tree)?;
        Ok(all.into_iter().find_map(|n| match &n.owner {
            coordinator_types::MerkleNodeOwner::Cycle(cycle_id) if n.level == 0 && n.snapshot_id.as_deref() == Some(snapshot_id) => {
                Some((cycle_id.clone(), n))
            }
            _ => None,
        }))
    }

    pub fn put_model(&self, model: &Model) -> StoreResult<()> {
        let tree = self.store.tree(trees::MODELS)?;
        put_typed(&tree, &model.id, model)
    }

    pub fn get_model(&self, id: &str) -> StoreResult<Option<Model>> {
        let tree = self.store.tree(trees::MODELS)?;
        get_typed(&tree, id)
    }

    pub fn list_models(&self) -> StoreResult<Vec<Model>> {
        let tree = self.store.tree(trees::MODELS)?;
        scan_all(&tree)
    }

    /// Leaderboards are append-only: this inserts a new row, never mutates
    /// a prior one (spec §4.3 Phase G).
    pub fn insert_leaderboard(&self, board: &Leaderboard) -> StoreResult<()> {
        let tree = self.store.tree(trees::LEADERBOARDS)?;
        let key = padded_seq(board.created_at.max(0) as u64);
        if tree.get(key.as_bytes())?.is_some() {
            return Err(StoreError::Conflict(format!(
                "leaderboard already exists for created_at={}",
                board.created_at
            )));
        }
        put_typed(&tree, &key, board)
    }

    pub fn latest_leaderboard(&self) -> StoreResult<Option<Leaderboard>> {
        let tree = self.store.tree(trees::LEADERBOARDS)?;
        match tree.iter().next_back() {
            Some(entry) => {
                let (_k, v) = entry?;
                Ok(Some(decode(&v)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(model_id: &str, period_end: i64) -> Snapshot {
        Snapshot {
            id: format!("{model_id}-{period_end}"),
            model_id: model_id.to_string(),
            period_start: period_end - 60,
            period_end,
            prediction_count: 1,
            result_summary: serde_json::json!({}),
            content_hash: String::new(),
            created_at: period_end,
        }
    }

    #[test]
    fn snapshots_in_range_excludes_snapshots_outside_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let score_store = ScoreStore::new(Store::open(dir.path()).unwrap());

        score_store.upsert_snapshot(&snapshot("m1", 60)).unwrap();
        score_store.upsert_snapshot(&snapshot("m1", 120)).unwrap();
        score_store.upsert_snapshot(&snapshot("m1", 9999)).unwrap();

        let in_range = score_store.snapshots_in_range("m1", 0, 150).unwrap();
        assert_eq!(in_range.len(), 2);
        assert!(in_range.iter().all(|s| s.period_end <= 150));
    }
}
