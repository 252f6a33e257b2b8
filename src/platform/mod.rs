//! Contracts consumed from the social platform, plus the thin HTTP client
//! that implements them.
//!
//! The engine and watchers only ever see these traits; production wires in
//! [`reddit::RedditClient`], tests wire in the in-memory fakes from
//! `test_utils`.

use async_trait::async_trait;

use crate::types::{AccountMetadata, Comment, CommentId, FeedId, ThreadId, Username};

pub mod error;
pub mod reddit;
pub mod retry;

pub use error::{PlatformError, PlatformErrorKind};
pub use retry::{retry_with_backoff, RetryConfig};

/// An open comment subscription for one feed.
///
/// The sequence is infinite and not restartable: after an error the
/// subscription must be dropped and a fresh one established via
/// [`FeedSource::subscribe`].
#[async_trait]
pub trait Subscription: Send {
    /// Waits for and returns the next comment in arrival order.
    async fn next_comment(&mut self) -> Result<Comment, PlatformError>;
}

/// Feed subscription entry point.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn subscribe(&self, feed: &FeedId) -> Result<Box<dyn Subscription>, PlatformError>;
}

/// Moderator membership lookup.
#[async_trait]
pub trait ModeratorLookup: Send + Sync {
    async fn is_moderator(&self, user: &Username, feed: &FeedId) -> Result<bool, PlatformError>;
}

/// Full expanded comment tree of a thread. The implementation is responsible
/// for expanding any collapsed branches before returning.
#[async_trait]
pub trait ThreadReader: Send + Sync {
    async fn thread_comments(&self, thread: &ThreadId) -> Result<Vec<Comment>, PlatformError>;
}

/// Posting a public reply under a comment.
#[async_trait]
pub trait ReplyPoster: Send + Sync {
    async fn post_reply(&self, parent: &CommentId, body: &str) -> Result<(), PlatformError>;
}

/// Per-account metadata used by the eligibility quality gates.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// Creation time and reputation for one account.
    async fn fetch_account(&self, user: &Username) -> Result<AccountMetadata, PlatformError>;

    /// The feeds of the account's most recent comments, newest first, at most
    /// `limit` entries.
    async fn recent_feed_activity(
        &self,
        user: &Username,
        limit: usize,
    ) -> Result<Vec<FeedId>, PlatformError>;
}

/// Private message delivery (operator and disbursement notifications).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(
        &self,
        recipient: &Username,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError>;
}

/// The full platform surface the bot consumes.
pub trait Platform:
    FeedSource + ModeratorLookup + ThreadReader + ReplyPoster + AccountLookup + Notifier
{
}

impl<T> Platform for T where
    T: FeedSource + ModeratorLookup + ThreadReader + ReplyPoster + AccountLookup + Notifier
{
}
