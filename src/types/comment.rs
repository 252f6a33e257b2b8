//! Comment and account metadata as delivered by the platform client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, FeedId, ThreadId, Username};

/// A single comment pulled from a feed.
///
/// `author` is `None` when the account has been deleted or anonymized; such a
/// comment can never trigger a raffle and its author never counts as a
/// participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub thread: ThreadId,
    pub feed: FeedId,
    pub author: Option<Username>,
    /// Author of the thread's root post, when the platform exposes it.
    pub thread_owner: Option<Username>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Identity-quality metadata for one account, fetched on demand during
/// eligibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Combined reputation score.
    pub karma: i64,
}

impl AccountMetadata {
    /// Account age in whole days at `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}
