//! Checkpoint entity, its one-way status machine, and the external
//! emission payload format (spec §4.4, §6).

use serde::{Deserialize, Serialize};

/// `Pending -> Submitted -> Claimable -> Paid`. No transition is reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Submitted,
    Claimable,
    Paid,
}

impl CheckpointStatus {
    /// True if `self -> next` is an allowed one-way transition.
    pub fn can_advance_to(self, next: CheckpointStatus) -> bool {
        use CheckpointStatus::*;
        matches!(
            (self, next),
            (Pending, Submitted) | (Submitted, Claimable) | (Claimable, Paid)
        )
    }
}

/// One entry in `cruncher_rewards`/`compute_provider_rewards`/`data_provider_rewards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardShare {
    pub cruncher_index: u32,
    pub reward_pct: u64,
}

/// External settlement payload (spec §6). `reward_pct` values are `frac64`
/// (denominator `FRAC64_DENOMINATOR` = 1e9 = 100%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionPayload {
    pub crunch: String,
    pub cruncher_rewards: Vec<RewardShare>,
    pub compute_provider_rewards: Vec<RewardShare>,
    pub data_provider_rewards: Vec<RewardShare>,
}

impl EmissionPayload {
    /// Testable property #6: `Σ cruncher_rewards.reward_pct == 1e9` exactly.
    pub fn cruncher_rewards_sum(&self) -> u64 {
        self.cruncher_rewards.iter().map(|r| r.reward_pct).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub period_start: i64,
    pub period_end: i64,
    pub merkle_root: String,
    pub emission_payload: EmissionPayload,
    pub status: CheckpointStatus,
    pub tx_hash: Option<String>,
    pub created_at: i64,
    pub emitted_at: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
#[error("checkpoint {checkpoint_id}: cannot advance {from:?} -> {to:?}")]
pub struct IllegalStatusTransition {
    pub checkpoint_id: String,
    pub from: CheckpointStatus,
    pub to: CheckpointStatus,
}

impl Checkpoint {
    pub fn advance_status(&mut self, next: CheckpointStatus) -> Result<(), IllegalStatusTransition> {
        if !self.status.can_advance_to(next) {
            return Err(IllegalStatusTransition {
                checkpoint_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_one_way() {
        assert!(CheckpointStatus::Pending.can_advance_to(CheckpointStatus::Submitted));
        assert!(!CheckpointStatus::Submitted.can_advance_to(CheckpointStatus::Pending));
        assert!(!CheckpointStatus::Pending.can_advance_to(CheckpointStatus::Claimable));
        assert!(!CheckpointStatus::Paid.can_advance_to(CheckpointStatus::Pending));
    }
}
