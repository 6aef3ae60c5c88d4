//! Settlement status transitions driven by external actors (spec §4.4):
//! `Pending -> Submitted -> Claimable -> Paid`, each one-way.

use coordinator_store::CheckpointStore;
use coordinator_types::{Checkpoint, CheckpointStatus, IllegalStatusTransition};

#[derive(Debug, thiserror::Error)]
pub enum StatusUpdateError {
    #[error(transparent)]
    Store(#[from] coordinator_store::StoreError),
    #[error(transparent)]
    IllegalTransition(#[from] IllegalStatusTransition),
    #[error("checkpoint {0} not found")]
    NotFound(String),
}

/// Records a settlement transaction hash, advancing `Pending -> Submitted`.
pub fn confirm_submission(store: &CheckpointStore, checkpoint_id: &str, tx_hash: String, now: i64) -> Result<Checkpoint, StatusUpdateError> {
    let mut checkpoint = store.get(checkpoint_id)?.ok_or_else(|| StatusUpdateError::NotFound(checkpoint_id.to_string()))?;
    checkpoint.advance_status(CheckpointStatus::Submitted)?;
    checkpoint.tx_hash = Some(tx_hash);
    checkpoint.emitted_at = Some(now);
    store.put(&checkpoint)?;
    Ok(checkpoint)
}

pub fn advance_status(store: &CheckpointStore, checkpoint_id: &str, next: CheckpointStatus) -> Result<Checkpoint, StatusUpdateError> {
    let mut checkpoint = store.get(checkpoint_id)?.ok_or_else(|| StatusUpdateError::NotFound(checkpoint_id.to_string()))?;
    checkpoint.advance_status(next)?;
    store.put(&checkpoint)?;
    Ok(checkpoint)
}
