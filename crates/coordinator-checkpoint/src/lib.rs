//! Checkpoint Builder: second-level Merkle tree over cycle `chained_root`s,
//! tier-based reward distribution, the settlement status machine, and the
//! cross-tier inclusion proof API (spec §4.4).

pub mod checkpoint_run;
pub mod proof;
pub mod status;
pub mod tiers;

pub use checkpoint_run::{default_build_emission, run_checkpoint, CheckpointRunError};
pub use proof::{build_proof, ProofStep, SnapshotProof};
pub use status::{advance_status, confirm_submission, StatusUpdateError};
pub use tiers::tier_rewards;
