//! Shared in-memory fakes and helpers for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::platform::{
    AccountLookup, FeedSource, ModeratorLookup, Notifier, PlatformError, ReplyPoster,
    Subscription, ThreadReader,
};
use crate::types::{AccountMetadata, Comment, CommentId, FeedId, ThreadId, Username};

static NEXT_COMMENT_ID: AtomicU64 = AtomicU64::new(1);

/// A comment by `author`, created `ts_secs` after the epoch.
pub fn comment_by(author: &str, thread: &ThreadId, feed: &FeedId, ts_secs: i64) -> Comment {
    Comment {
        id: CommentId::new(format!(
            "c{}",
            NEXT_COMMENT_ID.fetch_add(1, Ordering::Relaxed)
        )),
        thread: thread.clone(),
        feed: feed.clone(),
        author: Some(Username::new(author)),
        thread_owner: None,
        body: "hello".to_string(),
        created_at: DateTime::<Utc>::from_timestamp(ts_secs, 0).unwrap(),
    }
}

/// A comment whose author has been deleted.
pub fn deleted_comment(thread: &ThreadId, feed: &FeedId, ts_secs: i64) -> Comment {
    Comment {
        author: None,
        ..comment_by("ignored", thread, feed, ts_secs)
    }
}

#[derive(Default)]
struct PlatformState {
    queues: HashMap<FeedId, VecDeque<Comment>>,
    moderators: HashMap<FeedId, HashSet<Username>>,
    accounts: HashMap<Username, AccountMetadata>,
    failing_accounts: HashSet<Username>,
    activity: HashMap<Username, Vec<FeedId>>,
    threads: HashMap<ThreadId, Vec<Comment>>,
    replies: Vec<(CommentId, String)>,
    messages: Vec<(Username, String, String)>,
}

/// In-memory implementation of the full platform surface.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Arc<Mutex<PlatformState>>,
    fail_replies: AtomicBool,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap()
    }

    /// Appends comments to a feed's subscription queue.
    pub fn queue_comments(&self, feed: &FeedId, comments: Vec<Comment>) {
        self.locked()
            .queues
            .entry(feed.clone())
            .or_default()
            .extend(comments);
    }

    pub fn make_moderator(&self, user: &str, feed: &FeedId) {
        self.locked()
            .moderators
            .entry(feed.clone())
            .or_default()
            .insert(Username::new(user));
    }

    pub fn add_account(&self, user: &str, created_at: DateTime<Utc>, karma: i64) {
        self.locked()
            .accounts
            .insert(Username::new(user), AccountMetadata { created_at, karma });
    }

    /// Makes every metadata fetch for this account fail.
    pub fn fail_account_fetch(&self, user: &str) {
        self.locked().failing_accounts.insert(Username::new(user));
    }

    /// Sets the account's recent-comment feed window, newest first.
    pub fn set_activity(&self, user: &str, feeds: &[&str]) {
        self.locked()
            .activity
            .insert(Username::new(user), feeds.iter().map(|f| FeedId::new(*f)).collect());
    }

    /// Sets the full expanded comment set of a thread.
    pub fn set_thread_comments(&self, thread: &ThreadId, comments: Vec<Comment>) {
        self.locked().threads.insert(thread.clone(), comments);
    }

    /// Makes every reply post fail with a transient error.
    pub fn fail_replies(&self) {
        self.fail_replies.store(true, Ordering::SeqCst);
    }

    pub fn posted_replies(&self) -> Vec<(CommentId, String)> {
        self.locked().replies.clone()
    }

    pub fn sent_messages(&self) -> Vec<(Username, String, String)> {
        self.locked().messages.clone()
    }
}

struct InMemorySubscription {
    state: Arc<Mutex<PlatformState>>,
    feed: FeedId,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_comment(&mut self) -> Result<Comment, PlatformError> {
        loop {
            let popped = {
                let mut state = self.state.lock().unwrap();
                state.queues.entry(self.feed.clone()).or_default().pop_front()
            };
            match popped {
                Some(comment) => return Ok(comment),
                // Park until more comments are queued, like a live stream
                // with nothing new.
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    }
}

#[async_trait]
impl FeedSource for InMemoryPlatform {
    async fn subscribe(&self, feed: &FeedId) -> Result<Box<dyn Subscription>, PlatformError> {
        Ok(Box::new(InMemorySubscription {
            state: Arc::clone(&self.state),
            feed: feed.clone(),
        }))
    }
}

#[async_trait]
impl ModeratorLookup for InMemoryPlatform {
    async fn is_moderator(&self, user: &Username, feed: &FeedId) -> Result<bool, PlatformError> {
        Ok(self
            .locked()
            .moderators
            .get(feed)
            .is_some_and(|mods| mods.contains(user)))
    }
}

#[async_trait]
impl ThreadReader for InMemoryPlatform {
    async fn thread_comments(&self, thread: &ThreadId) -> Result<Vec<Comment>, PlatformError> {
        Ok(self.locked().threads.get(thread).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ReplyPoster for InMemoryPlatform {
    async fn post_reply(&self, parent: &CommentId, body: &str) -> Result<(), PlatformError> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(PlatformError::transient("reply post failed"));
        }
        self.locked()
            .replies
            .push((parent.clone(), body.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AccountLookup for InMemoryPlatform {
    async fn fetch_account(&self, user: &Username) -> Result<AccountMetadata, PlatformError> {
        let state = self.locked();
        if state.failing_accounts.contains(user) {
            return Err(PlatformError::transient("metadata fetch failed"));
        }
        state
            .accounts
            .get(user)
            .copied()
            .ok_or_else(|| PlatformError::permanent("no such account"))
    }

    async fn recent_feed_activity(
        &self,
        user: &Username,
        limit: usize,
    ) -> Result<Vec<FeedId>, PlatformError> {
        let state = self.locked();
        if state.failing_accounts.contains(user) {
            return Err(PlatformError::transient("activity fetch failed"));
        }
        let window = state.activity.get(user).cloned().unwrap_or_default();
        Ok(window.into_iter().take(limit).collect())
    }
}

#[async_trait]
impl Notifier for InMemoryPlatform {
    async fn send_message(
        &self,
        recipient: &Username,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        self.locked().messages.push((
            recipient.clone(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}
