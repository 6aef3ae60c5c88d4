//! Crunch coordinator daemon entry point: loads configuration, opens the
//! persisted store, wires the four workers (Feed, Predict, Score,
//! Checkpoint) onto their own tasks, and serves the reporting API until a
//! shutdown signal arrives.

mod stubs;
mod workers;

use clap::Parser;
use coordinator_config::CallableRegistryBuilder;
use coordinator_feed::{run_live_poll_loop, FeedScope};
use coordinator_obs::{AlertBus, HealthRegistry};
use coordinator_predict::ModelRunner;
use coordinator_score::MetricsRegistry;
use coordinator_store::{BackfillStore, CheckpointStore, FeedStore, PredictStore, ScheduleStore, ScoreStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about = "Crunch coordinator daemon", long_about = None)]
struct Args {
    /// Directory holding the sled database.
    #[arg(long, env = "COORDINATOR_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Directory holding the append-only process-log/runtime-service artifacts.
    #[arg(long, env = "COORDINATOR_LOG_DIR", default_value = "./logs")]
    log_dir: PathBuf,

    /// Root directory of the Parquet backfill partition tree.
    #[arg(long, env = "COORDINATOR_BACKFILL_ROOT", default_value = "./backfill")]
    backfill_root: PathBuf,

    /// Address the reporting API binds to.
    #[arg(long, env = "COORDINATOR_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: std::net::SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    coordinator_obs::init_tracing("coordinator")?;

    let config = Arc::new(coordinator_config::load_config()?);
    tracing::info!(crunch_id = %config.crunch_id, "coordinator starting");

    std::fs::create_dir_all(&args.log_dir)?;
    std::fs::create_dir_all(&args.backfill_root)?;

    let store = Store::open(&args.data_dir)?;
    let feed_store = FeedStore::new(store.clone());
    let predict_store = PredictStore::new(store.clone());
    let score_store = ScoreStore::new(store.clone());
    let checkpoint_store = CheckpointStore::new(store.clone());
    let backfill_store = BackfillStore::new(store.clone());
    let schedule_store = ScheduleStore::new(store.clone());

    let process_log = Arc::new(coordinator_obs::ProcessLog::open(&args.log_dir)?);
    let health = Arc::new(HealthRegistry::new());
    let alert_bus = Arc::new(AlertBus::new());

    let callables = Arc::new(CallableRegistryBuilder::new().freeze(&config.callables)?);

    let mut metrics_registry = MetricsRegistry::new();
    for name in &config.metrics {
        // Fail fast on an unknown metric name rather than discovering it mid-tick.
        metrics_registry.resolve(name)?;
    }
    let metrics_registry = Arc::new(metrics_registry);

    let runner = Arc::new(ModelRunner::new(config.eviction.consecutive_failure_limit, config.eviction.consecutive_timeout_limit));
    for model_id in &config.model_runner.participants {
        runner.register(model_id.clone());
    }

    let source: Arc<dyn coordinator_feed::SourceAdapter> = Arc::new(stubs::UnconfiguredSource);
    let model_client: Arc<dyn coordinator_predict::ModelClient> = Arc::new(stubs::UnconfiguredModelClient);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();

    for subject in &config.feed.subjects {
        let scope = FeedScope {
            source: config.feed.source.clone(),
            subject: subject.clone(),
            kind: config.feed.kind.clone(),
            granularity: config.feed.granularity.clone(),
        };
        handles.push(tokio::spawn(run_live_poll_loop(
            scope,
            source.clone(),
            feed_store.clone(),
            process_log.clone(),
            health.clone(),
            alert_bus.clone(),
            Duration::from_secs(config.feed.poll_interval_seconds),
            shutdown_rx.clone(),
        )));
    }

    handles.push(tokio::spawn(workers::run_predict_loop(
        feed_store.clone(),
        predict_store.clone(),
        schedule_store.clone(),
        runner.clone(),
        model_client.clone(),
        callables.clone(),
        process_log.clone(),
        health.clone(),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(workers::run_score_loop(
        config.clone(),
        predict_store.clone(),
        score_store.clone(),
        callables.clone(),
        metrics_registry.clone(),
        process_log.clone(),
        health.clone(),
        "coordinator-0".to_string(),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(workers::run_checkpoint_loop(
        config.clone(),
        score_store.clone(),
        checkpoint_store.clone(),
        health.clone(),
        shutdown_rx.clone(),
    )));

    let api_state = Arc::new(coordinator_api::AppState {
        score_store,
        checkpoint_store,
        backfill_store,
        backfill_root: args.backfill_root,
        source,
        process_log,
        health,
        config: config.api.clone(),
    });

    let api_shutdown = shutdown_rx.clone();
    let api_handle = tokio::spawn(coordinator_api::serve(api_state, args.bind_addr, api_shutdown));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }
    api_handle.await??;

    Ok(())
}
