//! Watcher pool ownership, restart, and graceful shutdown.
//!
//! The supervisor spawns one watcher task per configured feed and restarts
//! any that terminates (return or panic) while shutdown has not been
//! requested. A periodic housekeeping tick prunes expired rate-limit entries
//! so the persisted ledger stays bounded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::{Id as TaskId, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::RaffleEngine;
use crate::persistence::StateStore;
use crate::platform::Platform;
use crate::types::FeedId;

use super::FeedWatcher;

/// Delay before restarting a terminated watcher.
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Interval of the rate-limit pruning tick.
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Owns the watcher pool.
pub struct Supervisor {
    platform: Arc<dyn Platform>,
    engine: Arc<RaffleEngine>,
    store: Arc<StateStore>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        platform: Arc<dyn Platform>,
        engine: Arc<RaffleEngine>,
        store: Arc<StateStore>,
        cancel: CancellationToken,
    ) -> Self {
        Supervisor {
            platform,
            engine,
            store,
            cancel,
        }
    }

    /// Runs the pool until the shutdown token fires, then drains in-flight
    /// watchers so external calls complete or time out before returning.
    pub async fn run(&self) {
        let feeds = self.store.config().feeds;
        info!(feeds = feeds.len(), "supervisor starting watcher pool");

        let mut pool: JoinSet<FeedId> = JoinSet::new();
        // Task IDs map back to feeds so even a panicked watcher (whose return
        // value is lost) can be restarted for the right feed.
        let mut feeds_by_task: HashMap<TaskId, FeedId> = HashMap::new();
        for feed in feeds {
            self.spawn_watcher(&mut pool, &mut feeds_by_task, feed);
        }

        let mut prune_tick = tokio::time::interval(PRUNE_INTERVAL);
        prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it.
        prune_tick.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                _ = prune_tick.tick() => {
                    match self.store.prune_rate_limits(Utc::now()) {
                        Ok(0) => {}
                        Ok(pruned) => debug!(pruned, "pruned expired rate-limit entries"),
                        Err(e) => warn!(error = %e, "rate-limit pruning failed"),
                    }
                }

                joined = pool.join_next_with_id() => {
                    let Some(result) = joined else {
                        // Every watcher gone and shutdown not requested:
                        // nothing left to supervise.
                        warn!("watcher pool is empty, supervisor idling until shutdown");
                        self.cancel.cancelled().await;
                        break;
                    };
                    let feed = match result {
                        Ok((task_id, feed)) => {
                            feeds_by_task.remove(&task_id);
                            warn!(feed = %feed, "watcher terminated");
                            Some(feed)
                        }
                        Err(join_error) => {
                            let feed = feeds_by_task.remove(&join_error.id());
                            error!(error = %join_error, "watcher task panicked");
                            feed
                        }
                    };
                    if let Some(feed) = feed {
                        if !self.cancel.is_cancelled() {
                            warn!(feed = %feed, "restarting watcher");
                            tokio::time::sleep(RESTART_DELAY).await;
                            self.spawn_watcher(&mut pool, &mut feeds_by_task, feed);
                        }
                    }
                }
            }
        }

        info!("shutdown requested, draining watchers");
        while pool.join_next().await.is_some() {}
        info!("supervisor stopped");
    }

    fn spawn_watcher(
        &self,
        pool: &mut JoinSet<FeedId>,
        feeds_by_task: &mut HashMap<TaskId, FeedId>,
        feed: FeedId,
    ) {
        let watcher = FeedWatcher::new(
            feed.clone(),
            Arc::clone(&self.platform),
            Arc::clone(&self.engine),
            Arc::clone(&self.store),
            self.cancel.clone(),
        );
        let handle = pool.spawn(watcher.run());
        feeds_by_task.insert(handle.id(), feed);
    }
}
