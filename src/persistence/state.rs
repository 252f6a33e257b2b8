//! The durable state record: operator configuration, processed threads,
//! per-feed watermarks, and rate-limit bookkeeping.
//!
//! One JSON document holds everything the bot must not lose across restarts.
//! `BTreeMap`/`BTreeSet` keep serialization order deterministic, so a
//! load-save cycle reproduces the file byte for byte.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ratelimit::RateLimitLedger;
use crate::types::{FeedId, ThreadId, Username};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Configuration validation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_winners must be at least 1")]
    ZeroMaxWinners,

    #[error("min_reward {min} exceeds max_reward {max}")]
    RewardBoundsInverted { min: u64, max: u64 },

    #[error("max_reward_tiers must be at least 1")]
    ZeroRewardTiers,

    #[error("no feeds configured")]
    NoFeeds,
}

/// Long-lived, operator-controlled configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Feeds to watch, one watcher task each.
    pub feeds: Vec<FeedId>,

    /// Trigger keyword; the bot reacts to `!<keyword>` comments.
    pub trigger_keyword: String,

    /// Upper bound for the winner count of one raffle.
    pub max_winners: u32,

    /// Smallest nonzero reward a tier may carry.
    pub min_reward: u64,

    /// Largest reward a tier may carry.
    pub max_reward: u64,

    /// Maximum number of distinct reward tiers per raffle.
    pub max_reward_tiers: usize,

    /// Display label for the reward unit in result replies.
    pub reward_currency: String,

    /// Bot accounts that never count as participants.
    pub excluded_bots: BTreeSet<Username>,

    /// User accounts barred from participating.
    pub excluded_users: BTreeSet<Username>,

    /// Non-moderator accounts allowed to start raffles.
    pub whitelisted_users: BTreeSet<Username>,

    /// Whether the thread's root-post author is excluded from participation.
    pub exclude_thread_owner: bool,

    /// Identity-quality gate: minimum account age in days (0 disables).
    pub min_account_age_days: i64,

    /// Identity-quality gate: minimum combined karma (0 disables).
    pub min_karma: i64,

    /// Identity-quality gate: minimum recent comments in the raffle's feed
    /// (0 disables).
    pub min_feed_activity: u32,

    /// How many of an account's most recent comments the activity gate scans.
    pub activity_scan_limit: usize,

    /// Monotonically increasing count of committed raffles.
    pub raffle_count: u64,

    /// Operator identity notified about unauthorized trigger attempts when
    /// `notify_operator_on_unauthorized` is set.
    pub operator: Option<Username>,

    /// Identity notified once per winner when a raffle carries rewards.
    pub disburser: Option<Username>,

    /// Verbosity toggle for unauthorized triggers: notify the operator rather
    /// than only logging. The public thread is never replied to either way.
    pub notify_operator_on_unauthorized: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            feeds: vec![FeedId::new("MainSubreddit")],
            trigger_keyword: "raffle".to_string(),
            max_winners: 5,
            min_reward: 10,
            max_reward: 1000,
            max_reward_tiers: 3,
            reward_currency: "CANNACOIN".to_string(),
            excluded_bots: [Username::new("AutoModerator"), Username::new("timee_bot")]
                .into_iter()
                .collect(),
            excluded_users: BTreeSet::new(),
            whitelisted_users: BTreeSet::new(),
            exclude_thread_owner: true,
            min_account_age_days: 1,
            min_karma: 10,
            min_feed_activity: 0,
            activity_scan_limit: 100,
            raffle_count: 0,
            operator: None,
            disburser: None,
            notify_operator_on_unauthorized: false,
        }
    }
}

impl BotConfig {
    /// Checks the bound invariants: max ≥ min for winners and rewards, at
    /// least one feed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_winners == 0 {
            return Err(ConfigError::ZeroMaxWinners);
        }
        if self.min_reward > self.max_reward {
            return Err(ConfigError::RewardBoundsInverted {
                min: self.min_reward,
                max: self.max_reward,
            });
        }
        if self.max_reward_tiers == 0 {
            return Err(ConfigError::ZeroRewardTiers);
        }
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        Ok(())
    }

    /// The parser bounds derived from this configuration.
    pub fn command_bounds(&self) -> crate::commands::CommandBounds {
        crate::commands::CommandBounds {
            max_winners: self.max_winners,
            min_reward: self.min_reward,
            max_reward: self.max_reward,
            max_reward_tiers: self.max_reward_tiers,
        }
    }
}

/// Everything the bot persists, as one structured record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// Operator configuration, including the raffle counter.
    pub config: BotConfig,

    /// Threads that have consumed their single resolution attempt.
    /// Append-only; entries leave only via external archival.
    pub processed_threads: BTreeSet<ThreadId>,

    /// Per-feed last-seen creation-time cursor.
    pub watermarks: BTreeMap<FeedId, DateTime<Utc>>,

    /// Recent trigger timestamps per identity and class.
    #[serde(default)]
    pub rate_limits: RateLimitLedger,
}

impl Default for PersistedState {
    fn default() -> Self {
        PersistedState {
            schema_version: SCHEMA_VERSION,
            config: BotConfig::default(),
            processed_threads: BTreeSet::new(),
            watermarks: BTreeMap::new(),
            rate_limits: RateLimitLedger::new(),
        }
    }
}

impl PersistedState {
    /// The watermark for a feed; feeds never seen before start at the epoch so
    /// every live comment passes the strictly-greater check.
    pub fn watermark(&self, feed: &FeedId) -> DateTime<Utc> {
        self.watermarks
            .get(feed)
            .copied()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Advances a feed's watermark. Monotonic: an older timestamp never
    /// rewinds the cursor.
    pub fn advance_watermark(&mut self, feed: &FeedId, seen: DateTime<Utc>) {
        let entry = self
            .watermarks
            .entry(feed.clone())
            .or_insert(DateTime::<Utc>::UNIX_EPOCH);
        if seen > *entry {
            *entry = seen;
        }
    }
}
