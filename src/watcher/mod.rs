//! Per-feed pull loop.
//!
//! Each watcher owns one feed: it subscribes to the comment stream, skips
//! items at or below the feed's watermark, hands candidates to the engine,
//! and advances the watermark. Any error drops the subscription, waits out a
//! backoff delay, and re-subscribes; a watcher never terminates on its own
//! except through the shutdown token.

mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::RaffleEngine;
use crate::persistence::StateStore;
use crate::platform::Platform;
use crate::types::{Comment, FeedId};

pub use supervisor::Supervisor;

/// Delay before re-subscribing after a stream error.
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(10);

/// One feed's pull loop.
pub struct FeedWatcher {
    feed: FeedId,
    platform: Arc<dyn Platform>,
    engine: Arc<RaffleEngine>,
    store: Arc<StateStore>,
    cancel: CancellationToken,
}

impl FeedWatcher {
    pub fn new(
        feed: FeedId,
        platform: Arc<dyn Platform>,
        engine: Arc<RaffleEngine>,
        store: Arc<StateStore>,
        cancel: CancellationToken,
    ) -> Self {
        FeedWatcher {
            feed,
            platform,
            engine,
            store,
            cancel,
        }
    }

    /// Runs until shutdown. Returns the feed ID so the supervisor knows which
    /// watcher to restart if this ever returns early (it should not).
    pub async fn run(self) -> FeedId {
        info!(feed = %self.feed, "watcher started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut subscription = match self.platform.subscribe(&self.feed).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(feed = %self.feed, error = %e, "subscribe failed, backing off");
                    if self.sleep_or_cancel(RESUBSCRIBE_BACKOFF).await {
                        break;
                    }
                    continue;
                }
            };

            // Drain the subscription until it errors or shutdown is signaled.
            loop {
                let comment = tokio::select! {
                    _ = self.cancel.cancelled() => return self.feed,
                    item = subscription.next_comment() => match item {
                        Ok(comment) => comment,
                        Err(e) => {
                            warn!(feed = %self.feed, error = %e, "stream error, re-subscribing");
                            break;
                        }
                    },
                };
                self.handle_comment(comment).await;
            }

            if self.sleep_or_cancel(RESUBSCRIBE_BACKOFF).await {
                break;
            }
        }
        info!(feed = %self.feed, "watcher stopped");
        self.feed
    }

    /// Watermark gate, engine hand-off, watermark advance.
    ///
    /// Engine failures abort only the current attempt; the watcher keeps
    /// pulling. The processed set, not the watermark, is the authoritative
    /// duplicate guard, so advancing past a failed attempt is safe.
    async fn handle_comment(&self, comment: Comment) {
        if comment.created_at <= self.store.watermark(&self.feed) {
            debug!(comment = %comment.id, feed = %self.feed, "below watermark, skipped");
            return;
        }

        if let Err(e) = self.engine.process_comment(&comment).await {
            warn!(
                comment = %comment.id,
                thread = %comment.thread,
                feed = %self.feed,
                error = %e,
                "raffle attempt aborted"
            );
        }

        if let Err(e) = self.store.advance_watermark(&self.feed, comment.created_at) {
            warn!(feed = %self.feed, error = %e, "failed to persist watermark");
        }
    }

    /// Sleeps for `duration` unless shutdown arrives first. Returns true on
    /// shutdown.
    async fn sleep_or_cancel(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paste::NoPaste;
    use crate::randomness::RandomSource;
    use crate::test_utils::{comment_by, InMemoryPlatform};
    use crate::types::ThreadId;
    use tempfile::tempdir;

    fn harness(
        platform: Arc<InMemoryPlatform>,
        dir: &tempfile::TempDir,
    ) -> (Arc<RaffleEngine>, Arc<StateStore>) {
        let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
        let engine = Arc::new(RaffleEngine::new(
            Arc::clone(&store),
            platform,
            Arc::new(NoPaste),
            RandomSource::local_only(),
        ));
        (engine, store)
    }

    #[tokio::test]
    async fn watcher_advances_watermark_past_processed_comments() {
        let platform = Arc::new(InMemoryPlatform::new());
        let feed = FeedId::new("MainSubreddit");
        let dir = tempdir().unwrap();
        let (engine, store) = harness(Arc::clone(&platform), &dir);

        let c1 = comment_by("alice", &ThreadId::new("t1"), &feed, 100);
        let c2 = comment_by("bob", &ThreadId::new("t1"), &feed, 200);
        platform.queue_comments(&feed, vec![c1, c2.clone()]);

        let cancel = CancellationToken::new();
        let watcher = FeedWatcher::new(
            feed.clone(),
            platform,
            engine,
            Arc::clone(&store),
            cancel.clone(),
        );

        let handle = tokio::spawn(watcher.run());
        // The in-memory stream parks after draining; give it a moment.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.watermark(&feed), c2.created_at);
    }

    #[tokio::test]
    async fn watcher_skips_comments_at_or_below_watermark() {
        let platform = Arc::new(InMemoryPlatform::new());
        let feed = FeedId::new("MainSubreddit");
        let dir = tempdir().unwrap();
        let (engine, store) = harness(Arc::clone(&platform), &dir);

        let old = comment_by("mod", &ThreadId::new("t1"), &feed, 100);
        store.advance_watermark(&feed, old.created_at).unwrap();
        platform.make_moderator("mod", &feed);
        // A trigger at exactly the watermark must be skipped, not raffled.
        let mut trigger = comment_by("mod", &ThreadId::new("t1"), &feed, 100);
        trigger.body = "!raffle".to_string();
        platform.queue_comments(&feed, vec![trigger]);

        let cancel = CancellationToken::new();
        let watcher = FeedWatcher::new(
            feed.clone(),
            Arc::clone(&platform) as Arc<dyn Platform>,
            engine,
            Arc::clone(&store),
            cancel.clone(),
        );

        let handle = tokio::spawn(watcher.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(platform.posted_replies().is_empty());
        assert!(store.read(|s| s.processed_threads.is_empty()));
    }

    #[tokio::test]
    async fn watcher_exits_promptly_on_shutdown() {
        let platform = Arc::new(InMemoryPlatform::new());
        let feed = FeedId::new("MainSubreddit");
        let dir = tempdir().unwrap();
        let (engine, store) = harness(Arc::clone(&platform), &dir);

        let cancel = CancellationToken::new();
        let watcher = FeedWatcher::new(feed.clone(), platform, engine, store, cancel.clone());

        let handle = tokio::spawn(watcher.run());
        cancel.cancel();
        let returned = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watcher should exit quickly")
            .unwrap();
        assert_eq!(returned, feed);
    }
}
