//! Scheduled Prediction Config persistence.

use crate::codec::{get_typed, put_typed, scan_all};
use crate::error::StoreResult;
use crate::store::{trees, Store};
use coordinator_types::ScheduledPredictionConfig;

#[derive(Clone)]
pub struct ScheduleStore {
    store: Store,
}

impl ScheduleStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn put(&self, config: &ScheduledPredictionConfig) -> StoreResult<()> {
        let tree = self.store.tree(trees::SCHEDULED_CONFIGS)?;
        put_typed(&tree, &config.id, config)
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<ScheduledPredictionConfig>> {
        let tree = self.store.tree(trees::SCHEDULED_CONFIGS)?;
        get_typed(&tree, id)
    }

    /// Active configs, ordered by `order` ascending (spec §3: `order` field
    /// governs firing order within one tick).
    pub fn list_active(&self) -> StoreResult<Vec<ScheduledPredictionConfig>> {
        let tree = self.store.tree(trees::SCHEDULED_CONFIGS)?;
        let mut configs: Vec<ScheduledPredictionConfig> =
            scan_all::<ScheduledPredictionConfig>(&tree)?.into_iter().filter(|c| c.active).collect();
        configs.sort_by_key(|c| c.order);
        Ok(configs)
    }
}
