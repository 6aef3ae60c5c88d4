//! Feed Store entities: observations, ingestion watermarks, backfill jobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observation. `(source, subject, kind, granularity, ts_event)` is the
/// unique key; never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
    pub ts_event: i64,
    pub payload: FeedPayload,
    pub meta: Value,
}

impl FeedRecord {
    /// The unique key this record is indexed by in the store.
    pub fn unique_key(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.source, self.subject, self.kind, self.granularity, self.ts_event
        )
    }

    /// The ingestion scope this record belongs to (without `ts_event`).
    pub fn scope_key(&self) -> String {
        format!("{}/{}/{}/{}", self.source, self.subject, self.kind, self.granularity)
    }
}

/// Bar data (candles) or a single tick price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedPayload {
    Bar {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    },
    Tick {
        price: f64,
    },
}

impl FeedPayload {
    /// The price used as "the" signal when a single number is needed
    /// (ground-truth resolution, input windows): close for bars, price for
    /// ticks.
    pub fn reference_price(&self) -> f64 {
        match self {
            FeedPayload::Bar { close, .. } => *close,
            FeedPayload::Tick { price } => *price,
        }
    }
}

/// One row per `(source, subject, kind, granularity)`: the last ingested
/// `ts_event`. Updated monotonically by the Feed Worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedIngestionState {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
    pub last_ts_event: i64,
}

impl FeedIngestionState {
    pub fn scope_key(&self) -> String {
        format!("{}/{}/{}/{}", self.source, self.subject, self.kind, self.granularity)
    }
}

/// Backfill Job lifecycle. At most one job may be `Running` system-wide
/// (admission controlled by the store, see `coordinator-store`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillJob {
    pub id: String,
    pub scope_key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub cursor_ts: i64,
    pub records_written: u64,
    pub pages_fetched: u64,
    pub status: BackfillStatus,
    pub error: Option<String>,
}

impl BackfillJob {
    pub fn new(id: impl Into<String>, scope_key: impl Into<String>, start_ts: i64, end_ts: i64) -> Self {
        Self {
            id: id.into(),
            scope_key: scope_key.into(),
            start_ts,
            end_ts,
            cursor_ts: start_ts,
            records_written: 0,
            pages_fetched: 0,
            status: BackfillStatus::Pending,
            error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, BackfillStatus::Completed | BackfillStatus::Failed)
    }
}
