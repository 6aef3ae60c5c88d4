//! The Feed Worker's live-poll loop (spec §4.1): one task per configured
//! scope, polling on an interval, upserting atomically, and retrying
//! transient source failures with capped exponential backoff and jitter.

use crate::source::{PollRequest, SourceAdapter, SourceError};
use coordinator_obs::{cycle_span, AlertBus, HealthRegistry, OperatorAlert, ProcessLog, ProcessLogEntry};
use coordinator_store::FeedStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct FeedScope {
    pub source: String,
    pub subject: String,
    pub kind: String,
    pub granularity: String,
}

impl FeedScope {
    pub fn scope_key(&self) -> String {
        format!("{}/{}/{}/{}", self.source, self.subject, self.kind, self.granularity)
    }
}

/// Runs one scope's live-poll loop until `shutdown` fires. Returns once a
/// graceful shutdown is observed; transient source errors are retried
/// in-loop and never propagate out.
pub async fn run_live_poll_loop(
    scope: FeedScope,
    source: Arc<dyn SourceAdapter>,
    feed_store: FeedStore,
    process_log: Arc<ProcessLog>,
    health: Arc<HealthRegistry>,
    alert_bus: Arc<AlertBus>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let scope_key = scope.scope_key();
    let worker_name = format!("feed:{scope_key}");
    let _ = process_log.append(ProcessLogEntry::new("feed", "worker_started").with_scope(scope_key.clone()));

    let mut backoff = Duration::from_millis(500);
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = chrono::Utc::now().timestamp();
                health.report(worker_name.clone(), now);

                let span = cycle_span("feed", &scope_key, "poll");
                match poll_once(&scope, &scope_key, source.as_ref(), &feed_store).instrument(span).await {
                    Ok(()) => {
                        backoff = Duration::from_millis(500);
                    }
                    Err(err) if err.is_transient() => {
                        tracing::warn!(scope = %scope_key, error = %err, "transient feed poll failure, retrying");
                        tokio::time::sleep(jittered(backoff)).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                    Err(err) => {
                        tracing::error!(scope = %scope_key, error = %err, "permanent feed poll failure");
                        let _ = process_log.append(
                            ProcessLogEntry::new("feed", "operator_alert")
                                .with_scope(scope_key.clone())
                                .with_detail(serde_json::json!({ "error": err.to_string() })),
                        );
                        alert_bus.publish(OperatorAlert {
                            worker: "feed".to_string(),
                            scope_key: Some(scope_key.clone()),
                            message: err.to_string(),
                            ts: now,
                        });
                    }
                }
            }
        }
    }

    let _ = process_log.append(ProcessLogEntry::new("feed", "worker_stopped").with_scope(scope_key));
}

async fn poll_once(
    scope: &FeedScope,
    scope_key: &str,
    source: &dyn SourceAdapter,
    feed_store: &FeedStore,
) -> Result<(), SourceError> {
    let watermark = feed_store.watermark(scope_key).map_err(|e| SourceError::transient(e.to_string()))?;
    let after_ts_event = watermark.unwrap_or(i64::MIN);

    let records = source
        .poll(PollRequest {
            source: scope.source.clone(),
            subject: scope.subject.clone(),
            kind: scope.kind.clone(),
            granularity: scope.granularity.clone(),
            after_ts_event,
        })
        .await?;

    if records.is_empty() {
        return Ok(());
    }

    feed_store
        .upsert_records(scope_key, records)
        .map_err(|e| SourceError::transient(e.to_string()))?;
    Ok(())
}

fn jittered(base: Duration) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4 + 1);
    base + Duration::from_millis(jitter_ms)
}
