//! Structured logging and optional OTLP export, following the teacher's
//! `knhk-cli`/`knhk-workflow-engine` convention: a JSON `fmt` layer gated by
//! `RUST_LOG` (or `COORDINATOR_TRACE` as a friendlier alias), with an
//! OpenTelemetry layer wired in only when `OTEL_EXPORTER_OTLP_ENDPOINT` is
//! set so a plain `cargo run` never tries to dial a collector.

use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Debug, thiserror::Error)]
pub enum TracingInitError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalDefault(String),
    #[error("failed to initialize OTLP exporter: {0}")]
    Otlp(String),
}

fn env_filter() -> EnvFilter {
    if let Ok(v) = std::env::var("RUST_LOG") {
        return EnvFilter::new(v);
    }
    let level = std::env::var("COORDINATOR_TRACE").unwrap_or_else(|_| "info".to_string());
    EnvFilter::new(format!("coordinator={level}"))
}

/// Initializes the global `tracing` subscriber once per process. Call this
/// first thing in `main`; every worker span (`worker`, `scope`/`config_id`,
/// `cycle_id`/`tick_id` fields) flows through the subscriber installed here.
pub fn init_tracing(service_name: &str) -> Result<(), TracingInitError> {
    let json_layer = fmt::layer().json().with_target(true).with_current_span(true).with_span_list(true);
    let registry = Registry::default().with(env_filter()).with(json_layer);

    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => {
            let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_string())]);
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()
                .map_err(|e| TracingInitError::Otlp(e.to_string()))?;
            let provider = TracerProvider::builder()
                .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
                .build();
            global::set_tracer_provider(provider.clone());
            let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));
            registry
                .with(otel_layer)
                .try_init()
                .map_err(|e| TracingInitError::SetGlobalDefault(e.to_string()))
        }
        Err(_) => {
            let provider = TracerProvider::builder().build();
            global::set_tracer_provider(provider);
            registry.try_init().map_err(|e| TracingInitError::SetGlobalDefault(e.to_string()))
        }
    }
}
