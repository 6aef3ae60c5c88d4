//! Default tier-based reward schedule (spec §4.4 step 4): rank 1 gets 35%,
//! ranks 2-5 get 10% each, ranks 6-10 get 5% each, ranks beyond 10 get
//! nothing. With fewer than 10 ranked entries, the unfilled tiers'
//! share is redistributed equally across every entry, with any integer
//! rounding drift absorbed by rank 1 so the total is exactly
//! `FRAC64_DENOMINATOR`.

use coordinator_types::FRAC64_DENOMINATOR;

fn base_share(rank: usize) -> u64 {
    match rank {
        1 => 350_000_000,
        2..=5 => 100_000_000,
        6..=10 => 50_000_000,
        _ => 0,
    }
}

/// `reward_pct` for ranks `1..=count`, in rank order. `count == 0` returns
/// an empty schedule.
pub fn tier_rewards(count: usize) -> Vec<u64> {
    if count == 0 {
        return Vec::new();
    }

    let filled_ranks = count.min(10);
    let defined_sum: u64 = (1..=filled_ranks).map(base_share).sum();
    let unfilled = FRAC64_DENOMINATOR - defined_sum;

    let bonus_per_entry = unfilled / count as u64;
    let drift = unfilled - bonus_per_entry * count as u64;

    (1..=count)
        .map(|rank| {
            let share = base_share(rank) + bonus_per_entry;
            if rank == 1 {
                share + drift
            } else {
                share
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_tier_sums_to_denominator_with_no_redistribution() {
        let shares = tier_rewards(10);
        assert_eq!(shares.iter().sum::<u64>(), FRAC64_DENOMINATOR);
        assert_eq!(shares[0], 350_000_000);
        assert_eq!(shares[9], 50_000_000);
    }

    #[test]
    fn more_than_ten_models_still_sums_exactly() {
        let shares = tier_rewards(15);
        assert_eq!(shares.len(), 15);
        assert_eq!(shares.iter().sum::<u64>(), FRAC64_DENOMINATOR);
        assert_eq!(shares[10..], [0; 5]);
    }

    #[test]
    fn unfilled_tiers_redistribute_equally_and_sum_exactly() {
        let shares = tier_rewards(3);
        assert_eq!(shares.iter().sum::<u64>(), FRAC64_DENOMINATOR);
        // ranks 2 and 3 should receive the same bonus-adjusted share
        assert_eq!(shares[1], shares[2]);
        assert!(shares[0] > shares[1]);
    }

    #[test]
    fn single_model_takes_the_entire_pool() {
        let shares = tier_rewards(1);
        assert_eq!(shares, vec![FRAC64_DENOMINATOR]);
    }
}
