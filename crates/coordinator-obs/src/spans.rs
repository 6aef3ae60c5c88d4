//! Per-cycle tracing span helpers shared by the four worker loops, so the
//! `worker`/`scope`/`cycle_id` field names stay consistent across crates
//! instead of being copy-pasted at each call site.

use tracing::Span;

pub fn cycle_span(worker: &'static str, scope_key: &str, cycle_id: &str) -> Span {
    tracing::info_span!("cycle", worker, scope = scope_key, cycle_id)
}

pub fn tick_span(worker: &'static str, tick_id: &str) -> Span {
    tracing::info_span!("tick", worker, tick_id)
}
