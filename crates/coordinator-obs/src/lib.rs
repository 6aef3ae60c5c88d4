//! Observability for the crunch coordinator: global `tracing` setup with
//! optional OTLP export, per-cycle span helpers, and the two append-only
//! audit log artifacts workers write alongside their `sled` state.

pub mod alerts;
pub mod audit;
pub mod health;
pub mod spans;
pub mod tracing_init;

pub use alerts::{AlertBus, OperatorAlert};
pub use audit::{AuditLogError, ProcessLog, ProcessLogEntry, RuntimeServiceLog, RuntimeServiceSnapshot};
pub use health::HealthRegistry;
pub use spans::{cycle_span, tick_span};
pub use tracing_init::{init_tracing, TracingInitError};
