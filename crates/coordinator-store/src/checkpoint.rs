//! Checkpoint persistence and the period-boundary advisory lock (spec §4.4,
//! §5 "Checkpoint: advisory lock keyed by checkpoint period boundaries").

use crate::codec::{get_typed, put_typed, scan_all};
use crate::error::{StoreError, StoreResult};
use crate::store::{trees, Store};
use coordinator_types::Checkpoint;

#[derive(Clone)]
pub struct CheckpointStore {
    store: Store,
}

impl CheckpointStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Advisory lock for one checkpoint period, implemented the same way as
    /// the backfill admission singleton: a `compare_and_swap` on a
    /// period-scoped key.
    pub fn try_lock_period(&self, period_start: i64, period_end: i64) -> StoreResult<()> {
        let locks = self.store.tree(trees::LOCKS)?;
        let key = format!("checkpoint:period:{period_start}:{period_end}");
        let cas = locks.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(b"locked".to_vec()))?;
        if cas.is_err() {
            return Err(StoreError::Conflict(format!(
                "checkpoint already in progress for period [{period_start}, {period_end}]"
            )));
        }
        Ok(())
    }

    pub fn unlock_period(&self, period_start: i64, period_end: i64) -> StoreResult<()> {
        let locks = self.store.tree(trees::LOCKS)?;
        let key = format!("checkpoint:period:{period_start}:{period_end}");
        locks.remove(key.as_bytes())?;
        Ok(())
    }

    pub fn put(&self, checkpoint: &Checkpoint) -> StoreResult<()> {
        let tree = self.store.tree(trees::CHECKPOINTS)?;
        put_typed(&tree, &checkpoint.id, checkpoint)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<Checkpoint>> {
        let tree = self.store.tree(trees::CHECKPOINTS)?;
        get_typed(&tree, id)
    }

    pub fn list(&self) -> StoreResult<Vec<Checkpoint>> {
        let tree = self.store.tree(trees::CHECKPOINTS)?;
        scan_all(&tree)
    }

    pub fn latest(&self) -> StoreResult<Option<Checkpoint>> {
        Ok(self.list()?.into_iter().max_by_key(|c| c.period_end))
    }
}
