//! Feed Worker: the live-poll ingestion loop and the Backfill Job runner
//! (spec §4.1). Both depend on a pluggable [`source::SourceAdapter`] so the
//! rest of the coordinator never talks to an upstream data source directly.

pub mod backfill;
pub mod live_poll;
pub mod parquet_sink;
pub mod source;

pub use backfill::{BackfillRunError, BackfillRunner, BackfillScope};
pub use live_poll::{run_live_poll_loop, FeedScope};
pub use source::{BackfillPage, BackfillPageRequest, PollRequest, SourceAdapter, SourceError, SourceFailureKind};
