//! Identity-quality gates: account age, reputation, and recent activity in
//! the raffle's feed.
//!
//! Gate failures are expressed as data rather than errors so the filter's
//! partial-failure tolerance stays explicit: an identity whose metadata could
//! not be fetched is distinguishable from one rejected by policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persistence::BotConfig;
use crate::platform::AccountLookup;
use crate::types::{FeedId, Username};

/// Thresholds an identity must clear to participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGates {
    /// Minimum account age in whole days.
    pub min_account_age_days: i64,
    /// Minimum combined reputation score.
    pub min_karma: i64,
    /// Minimum recent comments within the raffle's feed.
    pub min_feed_activity: u32,
    /// Bounded window of the identity's most recent comments scanned for the
    /// activity gate.
    pub activity_scan_limit: usize,
}

impl QualityGates {
    /// Builds the gates from configuration, or `None` when every threshold is
    /// disabled (no metadata fetch needed at all).
    pub fn from_config(config: &BotConfig) -> Option<Self> {
        if config.min_account_age_days == 0
            && config.min_karma == 0
            && config.min_feed_activity == 0
        {
            return None;
        }
        Some(QualityGates {
            min_account_age_days: config.min_account_age_days,
            min_karma: config.min_karma,
            min_feed_activity: config.min_feed_activity,
            activity_scan_limit: config.activity_scan_limit,
        })
    }
}

/// Why an identity failed the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibilityReason {
    /// Account younger than the configured minimum.
    AccountTooNew,
    /// Reputation below the configured minimum.
    InsufficientKarma,
    /// Too few recent comments within the raffle's feed.
    InsufficientFeedActivity,
    /// Metadata could not be fetched; the identity is excluded without
    /// aborting the wider computation.
    MetadataUnavailable,
}

/// Outcome of running one identity through the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Eligible,
    Ineligible(IneligibilityReason),
}

/// Runs one identity through every configured gate.
///
/// A fetch failure for this identity yields
/// `Ineligible(MetadataUnavailable)` rather than an error, so one flaky
/// account cannot abort the whole participant computation.
pub async fn check_gates<A: AccountLookup + ?Sized>(
    gates: &QualityGates,
    user: &Username,
    feed: &FeedId,
    accounts: &A,
    now: DateTime<Utc>,
) -> GateOutcome {
    if gates.min_account_age_days > 0 || gates.min_karma > 0 {
        let meta = match accounts.fetch_account(user).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(user = %user, error = %e, "account metadata fetch failed");
                return GateOutcome::Ineligible(IneligibilityReason::MetadataUnavailable);
            }
        };
        if gates.min_account_age_days > 0 && meta.age_days(now) < gates.min_account_age_days {
            return GateOutcome::Ineligible(IneligibilityReason::AccountTooNew);
        }
        if gates.min_karma > 0 && meta.karma < gates.min_karma {
            return GateOutcome::Ineligible(IneligibilityReason::InsufficientKarma);
        }
    }

    if gates.min_feed_activity > 0 {
        let window = match accounts
            .recent_feed_activity(user, gates.activity_scan_limit)
            .await
        {
            Ok(window) => window,
            Err(e) => {
                debug!(user = %user, error = %e, "activity window fetch failed");
                return GateOutcome::Ineligible(IneligibilityReason::MetadataUnavailable);
            }
        };
        // Short-circuits once the threshold is met.
        let enough = window
            .iter()
            .filter(|f| *f == feed)
            .take(gates.min_feed_activity as usize)
            .count()
            == gates.min_feed_activity as usize;
        if !enough {
            return GateOutcome::Ineligible(IneligibilityReason::InsufficientFeedActivity);
        }
    }

    GateOutcome::Eligible
}
