//! Parsed raffle command and the configured bounds it is clamped against.

use serde::{Deserialize, Serialize};

/// Configured bounds applied while parsing a trigger.
///
/// Derived from the live configuration; the parser itself holds no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBounds {
    /// Upper clamp for the requested winner count.
    pub max_winners: u32,
    /// Lower clamp for nonzero reward tiers.
    pub min_reward: u64,
    /// Upper clamp for reward tiers.
    pub max_reward: u64,
    /// Maximum number of distinct reward tiers kept.
    pub max_reward_tiers: usize,
}

/// A fully validated raffle request extracted from a trigger comment.
///
/// Invariants (enforced by the parser):
/// - `winner_count` is in `[1, max_winners]`
/// - `reward_tiers` is non-empty, at most `max_reward_tiers` long, sorted
///   descending, and every nonzero tier is in `[min_reward, max_reward]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleCommand {
    pub winner_count: u32,
    pub reward_tiers: Vec<u64>,
}

impl RaffleCommand {
    /// True when no tier carries a reward.
    pub fn is_rewardless(&self) -> bool {
        self.reward_tiers.iter().all(|&t| t == 0)
    }
}

/// Outcome of scanning a comment body for the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The text does not address the bot at all.
    NoTrigger,
    /// The trigger token is present but the rest of the text is not a
    /// well-formed command. Carries no partial state.
    Invalid,
    /// A well-formed, clamped command.
    Command(RaffleCommand),
}
