//! Checkpoint Builder orchestration (spec §4.4).

use crate::tiers::tier_rewards;
use coordinator_config::{AggregationConfig, CheckpointConfig, RankingDirection};
use coordinator_merkle::MerkleTree;
use coordinator_store::{CheckpointStore, ScoreStore};
use coordinator_types::{
    Checkpoint, CheckpointStatus, ContentHash, EmissionPayload, MerkleNode, MerkleNodeOwner, RewardShare,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointRunError {
    #[error(transparent)]
    Store(#[from] coordinator_store::StoreError),
    #[error("no MerkleCycles since the previous checkpoint; nothing to commit")]
    NothingToCommit,
}

/// Builds the `crunch`-scoped `EmissionPayload` from the tier-ranked reward
/// shares when `build_emission` is left at `"default"`.
pub fn default_build_emission(crunch_id: &str, checkpoint: &CheckpointConfig, ranked: &[(u32, u64)]) -> EmissionPayload {
    EmissionPayload {
        crunch: crunch_id.to_string(),
        cruncher_rewards: ranked.iter().map(|(idx, pct)| RewardShare { cruncher_index: *idx, reward_pct: *pct }).collect(),
        compute_provider_rewards: checkpoint
            .compute_provider_pubkeys
            .iter()
            .enumerate()
            .map(|(i, _)| RewardShare { cruncher_index: i as u32, reward_pct: 0 })
            .collect(),
        data_provider_rewards: checkpoint
            .data_provider_pubkeys
            .iter()
            .enumerate()
            .map(|(i, _)| RewardShare { cruncher_index: i as u32, reward_pct: 0 })
            .collect(),
    }
}

fn rank_value(result_summary: &serde_json::Value, ranking_key: &str) -> f64 {
    result_summary.as_object().and_then(|o| o.get(ranking_key)).and_then(|v| v.as_f64()).unwrap_or(f64::NEG_INFINITY)
}

/// Combines every Snapshot a model produced within the checkpoint period
/// into one rank value, count-weighted by `prediction_count` (spec §4.4
/// step 3) rather than picking a single snapshot. `None` if the model
/// snapshotted nothing in the period, so it's excluded from ranking
/// entirely instead of ranking on stale, out-of-period data.
fn aggregate_ranking(snapshots: &[coordinator_types::Snapshot], ranking_key: &str) -> Option<f64> {
    let total_count: u64 = snapshots.iter().map(|s| s.prediction_count).sum();
    if total_count == 0 {
        return None;
    }
    let weighted_sum: f64 = snapshots.iter().map(|s| rank_value(&s.result_summary, ranking_key) * s.prediction_count as f64).sum();
    Some(weighted_sum / total_count as f64)
}

/// Runs one Checkpoint cycle: second-level Merkle tree over every
/// `MerkleCycle.chained_root` since the previous checkpoint, tier-ranked
/// reward distribution over non-virtual models, and a `Pending` Checkpoint
/// row. Does not advance past `Pending` — later status transitions are
/// driven externally via the reporting API.
pub fn run_checkpoint(
    crunch_id: &str,
    checkpoint_config: &CheckpointConfig,
    aggregation: &AggregationConfig,
    score_store: &ScoreStore,
    checkpoint_store: &CheckpointStore,
    now: i64,
) -> Result<Checkpoint, CheckpointRunError> {
    let previous = checkpoint_store.latest()?;
    let period_start = previous.as_ref().map(|c| c.period_end).unwrap_or(0);
    let period_end = now;

    checkpoint_store.try_lock_period(period_start, period_end)?;
    let result = run_checkpoint_inner(crunch_id, checkpoint_config, aggregation, score_store, checkpoint_store, period_start, period_end, now);
    checkpoint_store.unlock_period(period_start, period_end)?;
    result
}

fn run_checkpoint_inner(
    crunch_id: &str,
    checkpoint_config: &CheckpointConfig,
    aggregation: &AggregationConfig,
    score_store: &ScoreStore,
    checkpoint_store: &CheckpointStore,
    period_start: i64,
    period_end: i64,
    now: i64,
) -> Result<Checkpoint, CheckpointRunError> {
    let cycles = score_store.merkle_cycles_since(period_start)?;
    if cycles.is_empty() {
        return Err(CheckpointRunError::NothingToCommit);
    }

    let leaves: Vec<[u8; 32]> = cycles
        .iter()
        .map(|c| {
            ContentHash::from_hex(&c.chained_root).map(|h| *h.as_bytes()).map_err(|e| {
                coordinator_store::StoreError::InvariantViolation(format!("MerkleCycle {} has a corrupted chained_root: {e}", c.id))
            })
        })
        .collect::<coordinator_store::StoreResult<Vec<[u8; 32]>>>()?;
    let tree = MerkleTree::build(leaves);
    let root = tree.root();

    let checkpoint_id = Uuid::new_v4().to_string();
    let mut nodes = Vec::new();
    for (level, row) in tree.levels().iter().enumerate() {
        for (position, hash) in row.iter().enumerate() {
            let (left_child, right_child) = if level == 0 {
                (None, None)
            } else {
                let left = format!("{checkpoint_id}:{}:{}", level - 1, position * 2);
                let right_position = if position * 2 + 1 < tree.levels()[level - 1].len() { position * 2 + 1 } else { position * 2 };
                let right = format!("{checkpoint_id}:{}:{}", level - 1, right_position);
                (Some(left), Some(right))
            };
            let cycle_id_for_leaf = if level == 0 { cycles.get(position).map(|c| c.id.clone()) } else { None };
            nodes.push(MerkleNode {
                id: format!("{checkpoint_id}:{level}:{position}"),
                owner: MerkleNodeOwner::Checkpoint(checkpoint_id.clone()),
                level: level as u32,
                position: position as u64,
                hash: ContentHash(*hash).to_hex(),
                left_child,
                right_child,
                snapshot_id: cycle_id_for_leaf,
                snapshot_content_hash: if level == 0 { Some(ContentHash(*hash).to_hex()) } else { None },
            });
        }
    }
    score_store.insert_merkle_nodes(&nodes)?;

    let mut ranked_models: Vec<(String, f64)> = score_store
        .list_models()?
        .into_iter()
        .filter(|m| !m.is_ensemble())
        .filter_map(|m| {
            let snapshots = score_store.snapshots_in_range(&m.id, period_start, period_end).ok()?;
            let value = aggregate_ranking(&snapshots, &aggregation.ranking_key)?;
            Some((m.id, value))
        })
        .collect();
    ranked_models.sort_by(|a, b| match aggregation.ranking_direction {
        RankingDirection::Descending => b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)),
        RankingDirection::Ascending => a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)),
    });

    let shares = tier_rewards(ranked_models.len());
    let reward_pct_by_cruncher_index: Vec<(u32, u64)> = shares.into_iter().enumerate().map(|(i, pct)| (i as u32, pct)).collect();
    let emission_payload = default_build_emission(crunch_id, checkpoint_config, &reward_pct_by_cruncher_index);

    let checkpoint = Checkpoint {
        id: checkpoint_id,
        period_start,
        period_end,
        merkle_root: ContentHash(root).to_hex(),
        emission_payload,
        status: CheckpointStatus::Pending,
        tx_hash: None,
        created_at: now,
        emitted_at: None,
    };
    checkpoint_store.put(&checkpoint)?;

    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_store::Store;
    use coordinator_types::{MerkleCycle, Model, Snapshot};

    fn snapshot(model_id: &str, period_end: i64, prediction_count: u64, ic: f64) -> Snapshot {
        Snapshot {
            id: format!("{model_id}-{period_end}"),
            model_id: model_id.to_string(),
            period_start: period_end - 60,
            period_end,
            prediction_count,
            result_summary: serde_json::json!({ "ic": ic }),
            content_hash: ContentHash([0u8; 32]).to_hex(),
            created_at: period_end,
        }
    }

    fn model(id: &str) -> Model {
        Model { id: id.to_string(), name: id.to_string(), deployment_id: String::new(), owner_id: String::new(), overall_score: None, scores_by_scope: None, meta: serde_json::json!({}) }
    }

    fn aggregation() -> AggregationConfig {
        AggregationConfig { ranking_key: "ic".to_string(), ranking_direction: RankingDirection::Descending }
    }

    #[test]
    fn ranking_count_weight_averages_every_snapshot_in_the_period_and_excludes_out_of_period_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let score_store = ScoreStore::new(store.clone());

        score_store.put_model(&model("m1")).unwrap();
        score_store.put_model(&model("m2")).unwrap();

        // m1: two in-period snapshots, count-weighted average should favor
        // the one with more predictions; one stale out-of-period snapshot
        // that must not affect the result.
        score_store.upsert_snapshot(&snapshot("m1", 60, 1, 0.9)).unwrap();
        score_store.upsert_snapshot(&snapshot("m1", 120, 9, 0.1)).unwrap();
        score_store.upsert_snapshot(&snapshot("m1", 9999, 100, -5.0)).unwrap();

        // m2: a single in-period snapshot.
        score_store.upsert_snapshot(&snapshot("m2", 90, 1, 0.5)).unwrap();

        score_store
            .insert_merkle_cycle(&MerkleCycle {
                id: "cycle-1".to_string(),
                previous_cycle_id: None,
                previous_cycle_root: None,
                snapshots_root: ContentHash([1u8; 32]).to_hex(),
                chained_root: ContentHash([2u8; 32]).to_hex(),
                snapshot_count: 2,
                created_at: 100,
            })
            .unwrap();

        let checkpoint_store = CheckpointStore::new(store);
        let checkpoint = run_checkpoint("crunch", &CheckpointConfig::default(), &aggregation(), &score_store, &checkpoint_store, 150).unwrap();
        assert_eq!(checkpoint.period_start, 0);
        assert_eq!(checkpoint.period_end, 150);

        let m1_value = aggregate_ranking(&score_store.snapshots_in_range("m1", 0, 150).unwrap(), "ic").unwrap();
        assert!((m1_value - (0.9 * 1.0 + 0.1 * 9.0) / 10.0).abs() < 1e-9);

        let m2_value = aggregate_ranking(&score_store.snapshots_in_range("m2", 0, 150).unwrap(), "ic").unwrap();
        assert_eq!(m2_value, 0.5);
    }

    #[test]
    fn a_model_with_no_in_period_snapshots_is_not_ranked() {
        let snapshots: Vec<Snapshot> = Vec::new();
        assert_eq!(aggregate_ranking(&snapshots, "ic"), None);
    }
}
