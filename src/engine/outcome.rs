//! Terminal states of one trigger's journey through the engine.

use serde::{Deserialize, Serialize};

use crate::types::{ThreadId, Username};

/// A committed raffle's result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedRaffle {
    /// Sequence number drawn from the global raffle counter at commit time.
    pub sequence: u64,
    /// The resolved thread.
    pub thread: ThreadId,
    /// Winners in rank order with their credited rewards.
    pub winners: Vec<(Username, u64)>,
    /// Sum of all credited rewards.
    pub total_reward: u64,
    /// Size of the qualifying participant set the draw ran over.
    pub participant_count: usize,
}

/// Terminal state of processing one triggering comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaffleOutcome {
    /// The raffle ran to completion and was persisted.
    Committed(CommittedRaffle),

    /// The trigger token was present but the command was malformed.
    RejectedInvalidCommand,

    /// The triggering identity is neither a moderator nor whitelisted.
    RejectedUnauthorized,

    /// The thread already consumed its single resolution attempt.
    RejectedDuplicate,

    /// Fewer qualifying participants than requested winners. The thread's
    /// attempt is still consumed.
    RejectedInsufficientParticipants { required: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_payload_serde_roundtrip() {
        let raffle = CommittedRaffle {
            sequence: 3,
            thread: ThreadId::new("abc"),
            winners: vec![(Username::new("alice"), 100), (Username::new("bob"), 0)],
            total_reward: 100,
            participant_count: 8,
        };
        let json = serde_json::to_string(&raffle).unwrap();
        let parsed: CommittedRaffle = serde_json::from_str(&json).unwrap();
        assert_eq!(raffle, parsed);
    }
}
