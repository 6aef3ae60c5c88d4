//! The external data source boundary. `SourceAdapter` is the seam between
//! the live-poll loop / backfill paginator and whatever upstream feed
//! (Pyth, an exchange REST API, …) is actually configured; coordinator
//! crates never talk to the network directly.

use async_trait::async_trait;
use coordinator_types::FeedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFailureKind {
    /// Network hiccup, rate limit, upstream 5xx: retry with backoff.
    Transient,
    /// Bad credentials, unknown scope: retrying will never succeed.
    Permanent,
}

#[derive(Debug, thiserror::Error)]
#[error("source adapter error ({kind:?}): {message}")]
pub struct SourceError {
    pub kind: SourceFailureKind,
    pub message: String,
}

impl SourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: SourceFailureKind::Transient, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { kind: SourceFailureKind::Permanent, message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == SourceFailureKind::Transient
    }
}

/// One request for new observations strictly after `after_ts_event`.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
    pub after_ts_event: i64,
}

/// One page of a backfill paginator walk.
#[derive(Debug, Clone)]
pub struct BackfillPageRequest {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
    pub cursor_ts: i64,
    pub end_ts: i64,
}

#[derive(Debug, Clone)]
pub struct BackfillPage {
    pub records: Vec<FeedRecord>,
    /// `None` once the paginator has reached `end_ts`.
    pub next_cursor_ts: Option<i64>,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn poll(&self, request: PollRequest) -> Result<Vec<FeedRecord>, SourceError>;

    async fn backfill_page(&self, request: BackfillPageRequest) -> Result<BackfillPage, SourceError>;
}
