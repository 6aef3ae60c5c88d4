//! The Backfill Job runner (spec §4.1): admission-controlled, resumable
//! pagination that writes Hive-partitioned Parquet files and never touches
//! the live feed tape.

use crate::parquet_sink::{self, ParquetSinkError};
use crate::source::{BackfillPageRequest, SourceAdapter, SourceError};
use coordinator_obs::{ProcessLog, ProcessLogEntry};
use coordinator_store::BackfillStore;
use coordinator_types::{BackfillJob, BackfillStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BackfillRunError {
    #[error("backfill admission failed: {0}")]
    Admission(#[from] coordinator_store::StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    ParquetSink(#[from] ParquetSinkError),
}

pub struct BackfillRunner {
    root: PathBuf,
    source: Arc<dyn SourceAdapter>,
    backfill_store: BackfillStore,
    process_log: Arc<ProcessLog>,
}

impl BackfillRunner {
    pub fn new(root: impl Into<PathBuf>, source: Arc<dyn SourceAdapter>, backfill_store: BackfillStore, process_log: Arc<ProcessLog>) -> Self {
        Self { root: root.into(), source, backfill_store, process_log }
    }

    /// Starts (or resumes, if a prior run left this exact job persisted but
    /// not `Running`) a backfill walk from `job.cursor_ts` to `job.end_ts`.
    pub async fn run(&self, mut job: BackfillJob, scope: BackfillScope) -> Result<BackfillJob, BackfillRunError> {
        job.status = BackfillStatus::Running;
        self.backfill_store.try_admit(&job)?;

        loop {
            let page = match self
                .source
                .backfill_page(BackfillPageRequest {
                    source: scope.source.clone(),
                    subject: scope.subject.clone(),
                    kind: scope.kind.clone(),
                    granularity: scope.granularity.clone(),
                    cursor_ts: job.cursor_ts,
                    end_ts: job.end_ts,
                })
                .await
            {
                Ok(page) => page,
                Err(err) if err.is_transient() => {
                    tracing::warn!(job_id = %job.id, error = %err, "transient backfill page failure, will resume from cursor");
                    self.backfill_store.advance(&job).ok();
                    return Err(err.into());
                }
                Err(err) => {
                    self.backfill_store.fail(&mut job, err.to_string())?;
                    let _ = self.process_log.append(
                        ProcessLogEntry::new("feed-backfill", "operator_alert")
                            .with_scope(job.scope_key.clone())
                            .with_detail(serde_json::json!({ "job_id": job.id, "error": err.to_string() })),
                    );
                    return Err(err.into());
                }
            };

            if !page.records.is_empty() {
                parquet_sink::write_page(&self.root, &job.scope_key, &page.records)?;
                job.records_written += page.records.len() as u64;
            }
            job.pages_fetched += 1;

            match page.next_cursor_ts {
                Some(next) => {
                    job.cursor_ts = next;
                    self.backfill_store.advance(&job)?;
                }
                None => {
                    job.status = BackfillStatus::Completed;
                    self.backfill_store.advance(&job)?;
                    let _ = self.process_log.append(
                        ProcessLogEntry::new("feed-backfill", "backfill_completed")
                            .with_scope(job.scope_key.clone())
                            .with_detail(serde_json::json!({ "job_id": job.id, "records_written": job.records_written })),
                    );
                    return Ok(job);
                }
            }
        }
    }

    pub fn partition_root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone)]
pub struct BackfillScope {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
}
