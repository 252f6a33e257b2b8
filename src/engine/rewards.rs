//! Reward-tier assignment by winner rank.

/// Assigns a reward to each winner rank.
///
/// The tier list is broadcast to the winner count by repeating its last value
/// for ranks beyond the list's length; rank 1 gets the first (highest) tier.
/// An empty tier list assigns zero to every rank.
pub fn assign_rewards(tiers: &[u64], winner_count: usize) -> Vec<u64> {
    let last = tiers.last().copied().unwrap_or(0);
    (0..winner_count)
        .map(|rank| tiers.get(rank).copied().unwrap_or(last))
        .collect()
}

/// Sum of all assigned rewards.
pub fn total_reward(assigned: &[u64]) -> u64 {
    assigned.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tiers_broadcast_by_repeating_last() {
        assert_eq!(assign_rewards(&[100, 50], 4), vec![100, 50, 50, 50]);
    }

    #[test]
    fn exact_length_tiers_map_one_to_one() {
        assert_eq!(assign_rewards(&[300, 200, 100], 3), vec![300, 200, 100]);
    }

    #[test]
    fn excess_tiers_are_ignored() {
        assert_eq!(assign_rewards(&[300, 200, 100], 2), vec![300, 200]);
    }

    #[test]
    fn empty_tiers_assign_zero() {
        assert_eq!(assign_rewards(&[], 3), vec![0, 0, 0]);
        assert_eq!(total_reward(&assign_rewards(&[], 3)), 0);
    }

    #[test]
    fn single_zero_tier_means_no_reward() {
        let assigned = assign_rewards(&[0], 5);
        assert_eq!(assigned, vec![0; 5]);
        assert_eq!(total_reward(&assigned), 0);
    }

    proptest! {
        /// Every rank beyond the tier list gets exactly the last tier.
        #[test]
        fn broadcast_extends_with_last_value(
            tiers in proptest::collection::vec(0u64..10_000, 1..5),
            winner_count in 1usize..20,
        ) {
            let assigned = assign_rewards(&tiers, winner_count);
            prop_assert_eq!(assigned.len(), winner_count);
            for (rank, &reward) in assigned.iter().enumerate() {
                let expected = tiers.get(rank).copied().unwrap_or(*tiers.last().unwrap());
                prop_assert_eq!(reward, expected);
            }
        }

        /// The total is the sum of what each winner was credited.
        #[test]
        fn total_matches_sum(
            tiers in proptest::collection::vec(0u64..10_000, 1..5),
            winner_count in 1usize..20,
        ) {
            let assigned = assign_rewards(&tiers, winner_count);
            prop_assert_eq!(total_reward(&assigned), assigned.iter().sum::<u64>());
        }
    }
}
