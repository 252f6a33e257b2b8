//! Participant eligibility for a raffle thread.
//!
//! Given the full expanded comment set of a thread, computes the set of
//! identities allowed to win. This is the most expensive step of a raffle
//! (thread size × per-identity metadata scans), so exclusion rules run first
//! and each surviving identity is gated exactly once regardless of how many
//! comments it authored.

mod gates;

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::debug;

use crate::persistence::BotConfig;
use crate::platform::AccountLookup;
use crate::types::{Comment, FeedId, Username};

pub use gates::{check_gates, GateOutcome, IneligibilityReason, QualityGates};

/// Exclusion rules and optional quality gates, derived from configuration.
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    pub excluded_bots: BTreeSet<Username>,
    pub excluded_users: BTreeSet<Username>,
    pub exclude_thread_owner: bool,
    pub gates: Option<QualityGates>,
}

impl EligibilityPolicy {
    pub fn from_config(config: &BotConfig) -> Self {
        EligibilityPolicy {
            excluded_bots: config.excluded_bots.clone(),
            excluded_users: config.excluded_users.clone(),
            exclude_thread_owner: config.exclude_thread_owner,
            gates: QualityGates::from_config(config),
        }
    }

    /// Pure policy check: true when the identity is barred outright,
    /// independent of any fetched metadata.
    fn policy_excluded(
        &self,
        user: &Username,
        trigger: &Username,
        thread_owner: Option<&Username>,
    ) -> bool {
        if user == trigger {
            return true;
        }
        if self.exclude_thread_owner && thread_owner == Some(user) {
            return true;
        }
        self.excluded_bots.contains(user) || self.excluded_users.contains(user)
    }
}

/// Computes the participant set for a thread.
///
/// An identity is included iff it authored at least one comment in the
/// thread, survives the policy exclusions (bots, barred users, the
/// triggering identity, optionally the thread owner), and clears every
/// configured quality gate. Deleted authors are never counted. A metadata
/// fetch failure excludes only the affected identity.
pub async fn compute_participants<A: AccountLookup + ?Sized>(
    comments: &[Comment],
    trigger: &Username,
    thread_owner: Option<&Username>,
    feed: &FeedId,
    policy: &EligibilityPolicy,
    accounts: &A,
) -> BTreeSet<Username> {
    // Deduplicate authors before any metadata work.
    let mut candidates: BTreeSet<Username> = BTreeSet::new();
    for comment in comments {
        if let Some(author) = &comment.author {
            candidates.insert(author.clone());
        }
    }

    let mut participants = BTreeSet::new();
    let now = Utc::now();
    for candidate in candidates {
        if policy.policy_excluded(&candidate, trigger, thread_owner) {
            continue;
        }
        if let Some(gates) = &policy.gates {
            match check_gates(gates, &candidate, feed, accounts, now).await {
                GateOutcome::Eligible => {}
                GateOutcome::Ineligible(reason) => {
                    debug!(user = %candidate, ?reason, "candidate failed eligibility gates");
                    continue;
                }
            }
        }
        participants.insert(candidate);
    }
    participants
}
