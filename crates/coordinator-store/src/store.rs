use crate::error::StoreResult;
use std::path::Path;

/// Tree (table) names. Kept as constants rather than an enum so new tables
/// can be added without touching call sites elsewhere.
pub mod trees {
    pub const FEED_RECORDS: &str = "feed_records";
    pub const FEED_WATERMARKS: &str = "feed_watermarks";
    pub const BACKFILL_JOBS: &str = "backfill_jobs";
    pub const SCHEDULED_CONFIGS: &str = "scheduled_configs";
    pub const INPUTS: &str = "inputs";
    pub const PREDICTIONS: &str = "predictions";
    pub const SNAPSHOTS: &str = "snapshots";
    pub const MERKLE_CYCLES: &str = "merkle_cycles";
    pub const MERKLE_NODES: &str = "merkle_nodes";
    pub const CHECKPOINTS: &str = "checkpoints";
    pub const MODELS: &str = "models";
    pub const LEADERBOARDS: &str = "leaderboards";
    pub const LOCKS: &str = "locks";
}

/// The transactional store. A thin typed layer over a single `sled::Db`;
/// every entity family gets its own tree (teacher convention: one `Db`,
/// many named trees, rather than one flat keyspace).
#[derive(Clone)]
pub struct Store {
    pub(crate) db: sled::Db,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// In-memory store for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        Ok(Self { db: config.open()? })
    }

    pub(crate) fn tree(&self, name: &str) -> StoreResult<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("size_on_disk", &self.db.size_on_disk().ok()).finish()
    }
}
