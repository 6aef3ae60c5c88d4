//! The three worker loops the Feed crate doesn't already provide:
//! Predict's per-config firing scheduler, Score's fixed-interval tick, and
//! Checkpoint's cron. All three follow `coordinator_feed::run_live_poll_loop`'s
//! shape: a `tokio::select!` between a ticker and the shutdown watch,
//! transient errors logged and swallowed rather than propagated.

use coordinator_config::{CallableRegistry, CoordinatorConfig};
use coordinator_obs::{HealthRegistry, ProcessLog};
use coordinator_predict::{CycleDeps, DefaultInferenceInputBuilder, DefaultInferenceOutputValidator, ModelClient, ModelRunner};
use coordinator_store::{CheckpointStore, PredictStore, ScheduleStore, ScoreStore};
use coordinator_types::Schedule;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Fires every active `ScheduledPredictionConfig` whose schedule is due,
/// once a second. `last_fired` tracks per-config fire times in memory only
/// (spec §3 doesn't require firing history to survive a restart; a missed
/// fire after a restart just waits for the next due tick).
pub async fn run_predict_loop(
    feed_store: coordinator_store::FeedStore,
    predict_store: PredictStore,
    schedule_store: ScheduleStore,
    runner: Arc<ModelRunner>,
    model_client: Arc<dyn ModelClient>,
    callables: Arc<CallableRegistry>,
    process_log: Arc<ProcessLog>,
    health: Arc<HealthRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let input_builder_fallback = DefaultInferenceInputBuilder;
    let output_validator_fallback = DefaultInferenceOutputValidator;
    let mut last_fired: HashMap<String, i64> = HashMap::new();
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = now_unix();
                health.report("predict", now);
                let configs = match schedule_store.list_active() {
                    Ok(c) => c,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to list active prediction configs");
                        continue;
                    }
                };

                for config in configs {
                    if !schedule_due(&config.schedule, last_fired.get(&config.id).copied(), now) {
                        continue;
                    }
                    last_fired.insert(config.id.clone(), now);

                    let deps = CycleDeps {
                        feed_store: &feed_store,
                        predict_store: &predict_store,
                        runner: runner.as_ref(),
                        model_client: model_client.as_ref(),
                        input_builder: &callables.inference_input_builder,
                        input_builder_fallback: &input_builder_fallback,
                        output_validator: &callables.inference_output_validator,
                        output_validator_fallback: &output_validator_fallback,
                        process_log: &process_log,
                    };
                    if let Err(err) = coordinator_predict::run_cycle(&config, now, deps).await {
                        tracing::error!(error = %err, config_id = %config.id, "predict cycle errored");
                    }
                }
            }
        }
    }
}

fn schedule_due(schedule: &Schedule, last_fired: Option<i64>, now: i64) -> bool {
    match schedule {
        Schedule::EverySeconds(interval) => match last_fired {
            None => true,
            Some(last) => now - last >= *interval as i64,
        },
        Schedule::Cron(expr) => match cron::Schedule::from_str(expr) {
            Ok(parsed) => {
                let Some(last) = last_fired else { return true };
                let after = chrono::DateTime::from_timestamp(last, 0).unwrap_or_else(chrono::Utc::now);
                match parsed.after(&after).next() {
                    Some(next) => next.timestamp() <= now,
                    None => false,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, cron = %expr, "invalid cron expression in ScheduledPredictionConfig");
                false
            }
        },
    }
}

/// Runs the Score tick on `config.score.interval_seconds`. `owner` identifies
/// this process in the heartbeat lock (spec §5); a multi-replica deployment
/// would give each process a distinct value so at most one wins the lock
/// per interval.
pub async fn run_score_loop(
    config: Arc<CoordinatorConfig>,
    predict_store: PredictStore,
    score_store: ScoreStore,
    callables: Arc<CallableRegistry>,
    metrics_registry: Arc<coordinator_score::MetricsRegistry>,
    process_log: Arc<ProcessLog>,
    health: Arc<HealthRegistry>,
    owner: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(config.score.interval_seconds.max(1)));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = now_unix();
                health.report("score", now);
                let deps = coordinator_score::TickDeps {
                    predict_store: &predict_store,
                    score_store: &score_store,
                    callables: &callables,
                    metrics_registry: &metrics_registry,
                    process_log: &process_log,
                };
                if let Err(err) = coordinator_score::run_tick(&config, now, &owner, deps) {
                    tracing::error!(error = %err, "score tick errored");
                }
            }
        }
    }
}

/// Runs the Checkpoint cron on `config.checkpoint.cron`, polling once a
/// minute whether the schedule is due since the last run.
pub async fn run_checkpoint_loop(
    config: Arc<CoordinatorConfig>,
    score_store: ScoreStore,
    checkpoint_store: CheckpointStore,
    health: Arc<HealthRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let schedule = match cron::Schedule::from_str(&config.checkpoint.cron) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, cron = %config.checkpoint.cron, "invalid checkpoint cron, checkpoint worker disabled");
            return;
        }
    };

    let mut last_fired: Option<i64> = None;
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = now_unix();
                health.report("checkpoint", now);
                let due = match last_fired {
                    None => true,
                    Some(last) => {
                        let after = chrono::DateTime::from_timestamp(last, 0).unwrap_or_else(chrono::Utc::now);
                        schedule.after(&after).next().map(|next| next.timestamp() <= now).unwrap_or(false)
                    }
                };
                if !due {
                    continue;
                }
                last_fired = Some(now);

                match coordinator_checkpoint::run_checkpoint(&config.crunch_id, &config.checkpoint, &config.aggregation, &score_store, &checkpoint_store, now) {
                    Ok(checkpoint) => tracing::info!(checkpoint_id = %checkpoint.id, "checkpoint committed"),
                    Err(coordinator_checkpoint::CheckpointRunError::NothingToCommit) => {
                        tracing::info!("checkpoint due but no new MerkleCycles since the last one");
                    }
                    Err(err) => tracing::error!(error = %err, "checkpoint run failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_seconds_fires_immediately_then_waits_out_the_interval() {
        let schedule = Schedule::EverySeconds(30);
        assert!(schedule_due(&schedule, None, 1_000));
        assert!(!schedule_due(&schedule, Some(1_000), 1_010));
        assert!(schedule_due(&schedule, Some(1_000), 1_030));
    }

    #[test]
    fn cron_fires_once_the_next_occurrence_after_last_fired_has_passed() {
        let schedule = Schedule::Cron("0 * * * * * *".to_string());
        let last_fired = chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().timestamp();
        let still_within_minute = last_fired + 30;
        let next_minute = last_fired + 61;
        assert!(!schedule_due(&schedule, Some(last_fired), still_within_minute));
        assert!(schedule_due(&schedule, Some(last_fired), next_minute));
    }

    #[test]
    fn an_invalid_cron_expression_never_fires() {
        let schedule = Schedule::Cron("not a cron expression".to_string());
        assert!(!schedule_due(&schedule, None, 1_000));
    }
}
