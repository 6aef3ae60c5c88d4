//! Default implementations of the two external-boundary traits the spec
//! deliberately leaves pluggable: the upstream data source and the
//! participant model runtime. Neither has a concrete choice baked in here;
//! an embedding deployment is expected to supply its own `SourceAdapter`
//! and `ModelClient` and wire them in place of these in `main`. Returning
//! a permanent error rather than panicking keeps a coordinator started
//! without either wired still able to serve its reporting API and hold
//! its persisted state.

use async_trait::async_trait;
use coordinator_feed::{BackfillPage, BackfillPageRequest, PollRequest, SourceAdapter, SourceError};
use coordinator_predict::{ModelCallOutcome, ModelClient};
use coordinator_types::FeedRecord;
use serde_json::Value;

pub struct UnconfiguredSource;

#[async_trait]
impl SourceAdapter for UnconfiguredSource {
    async fn poll(&self, _request: PollRequest) -> Result<Vec<FeedRecord>, SourceError> {
        Err(SourceError::permanent("no SourceAdapter configured"))
    }

    async fn backfill_page(&self, _request: BackfillPageRequest) -> Result<BackfillPage, SourceError> {
        Err(SourceError::permanent("no SourceAdapter configured"))
    }
}

pub struct UnconfiguredModelClient;

#[async_trait]
impl ModelClient for UnconfiguredModelClient {
    async fn tick(&self, _model_id: &str, _deadline_ms: u64) -> ModelCallOutcome {
        ModelCallOutcome::NoResponse
    }

    async fn predict(&self, _model_id: &str, _inference_input: &Value, _deadline_ms: u64) -> (ModelCallOutcome, Option<Value>) {
        (ModelCallOutcome::NoResponse, None)
    }
}
