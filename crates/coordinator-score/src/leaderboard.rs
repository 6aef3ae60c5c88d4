//! Phase G — Leaderboard (spec §4.3): rebuilt (never mutated) each tick from
//! the latest Snapshot per model, ranked by the configured key/direction.

use coordinator_config::{AggregationConfig, RankingDirection};
use coordinator_store::{ScoreStore, StoreResult};
use coordinator_types::{Leaderboard, LeaderboardEntry, Snapshot};
use uuid::Uuid;

/// Ranks every model that snapshotted this tick (real and ensemble alike)
/// by `aggregation.ranking_key` read out of its `result_summary`.
pub fn rebuild_leaderboard(score_store: &ScoreStore, snapshots_this_tick: &[Snapshot], aggregation: &AggregationConfig, now: i64) -> StoreResult<Leaderboard> {
    let mut ranked: Vec<LeaderboardEntry> = snapshots_this_tick
        .iter()
        .map(|snapshot| {
            let score = snapshot
                .result_summary
                .as_object()
                .and_then(|o| o.get(&aggregation.ranking_key))
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::NEG_INFINITY);
            LeaderboardEntry {
                rank: 0,
                model_id: snapshot.model_id.clone(),
                score,
                metrics: snapshot.result_summary.clone(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| match aggregation.ranking_direction {
        RankingDirection::Descending => b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal),
        RankingDirection::Ascending => a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal),
    });
    for (i, entry) in ranked.iter_mut().enumerate() {
        entry.rank = (i + 1) as u32;
    }

    let board = Leaderboard {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        entries: ranked,
    };
    score_store.insert_leaderboard(&board)?;
    Ok(board)
}
