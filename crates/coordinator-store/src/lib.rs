//! Transactional, `sled`-backed persistence for the crunch coordinator.
//!
//! One `Store` (a single `sled::Db`) backs every typed accessor below; each
//! accessor opens its own named tree. Multi-row atomicity where the
//! protocol requires it (feed upsert + watermark, Input + Predictions,
//! backfill admission) is implemented with `sled`'s transaction API, not
//! with application-level locking.

pub mod backfill;
pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod feed;
pub mod predict;
pub mod schedule;
pub mod score;
pub mod store;

pub use backfill::BackfillStore;
pub use checkpoint::CheckpointStore;
pub use error::{StoreError, StoreResult};
pub use feed::{FeedStore, UpsertOutcome};
pub use predict::PredictStore;
pub use schedule::ScheduleStore;
pub use score::{HeartbeatLock, ScoreStore};
pub use store::Store;
