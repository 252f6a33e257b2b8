//! The raffle orchestration state machine.
//!
//! Each triggering comment travels `Received → Authorizing →
//! DeduplicationCheck → CollectingParticipants → SelectingWinners →
//! Responding → Committed`, with early exits for invalid commands,
//! unauthorized identities, already-resolved threads, and undersized
//! participant pools.
//!
//! # Key Invariants
//!
//! 1. **At most once per thread**: the dedup membership test and insertion
//!    happen in one critical section of the state lock, so concurrent
//!    triggers on the same thread can never both pass.
//!
//! 2. **One attempt per thread**: a raffle that fails after the dedup mark
//!    (insufficient participants, collection error) does not un-mark the
//!    thread. Repeating the trigger yields a duplicate rejection rather than
//!    a second expensive scan.
//!
//! 3. **No I/O under the lock**: eligibility scans, randomness calls, paste
//!    uploads, and reply posts all happen outside the state lock; only the
//!    short bookkeeping steps hold it.
//!
//! 4. **Commit beats announcement**: a reply-post failure after the counter
//!    increment is logged and never rolls the raffle back.

mod format;
mod outcome;
mod rewards;


use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{parse_command, ParseOutcome, RaffleCommand};
use crate::eligibility::{compute_participants, EligibilityPolicy};
use crate::paste::PasteClient;
use crate::persistence::{BotConfig, StateStore, StoreError};
use crate::platform::{Platform, PlatformError};
use crate::randomness::RandomSource;
use crate::ratelimit::TriggerClass;
use crate::types::{Comment, Username};

pub use outcome::{CommittedRaffle, RaffleOutcome};

/// Delay between successive disbursement notifications, respecting the
/// platform's own messaging rate limits.
const DISBURSEMENT_SPACING: Duration = Duration::from_secs(2);

/// Errors that abort one raffle attempt.
///
/// These never crash the enclosing watcher; they are logged and the feed
/// moves on. Note invariant 2: an attempt that fails after the dedup mark
/// leaves the thread marked.
#[derive(Debug, Error)]
pub enum EngineError {
    /// State store failure.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Platform call failure.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The raffle engine. One instance serves every feed watcher.
pub struct RaffleEngine {
    store: Arc<StateStore>,
    platform: Arc<dyn Platform>,
    paste: Arc<dyn PasteClient>,
    random: RandomSource,
}

impl RaffleEngine {
    pub fn new(
        store: Arc<StateStore>,
        platform: Arc<dyn Platform>,
        paste: Arc<dyn PasteClient>,
        random: RandomSource,
    ) -> Self {
        RaffleEngine {
            store,
            platform,
            paste,
            random,
        }
    }

    /// Processes one comment pulled from a feed.
    ///
    /// Returns `Ok(None)` when the comment does not address the bot (or was
    /// dropped by valid-trigger rate limiting), and the terminal outcome
    /// otherwise.
    pub async fn process_comment(&self, comment: &Comment) -> Result<Option<RaffleOutcome>> {
        let config = self.store.config();

        let parsed = parse_command(
            &comment.body,
            &config.trigger_keyword,
            &config.command_bounds(),
        );
        if parsed == ParseOutcome::NoTrigger {
            return Ok(None);
        }

        // A deleted author can neither be authorized nor replied to.
        let Some(author) = comment.author.clone() else {
            debug!(comment = %comment.id, "trigger from deleted author ignored");
            return Ok(None);
        };

        match parsed {
            ParseOutcome::Invalid => self
                .reject_invalid(comment, &author, &config)
                .await
                .map(Some),
            ParseOutcome::Command(command) => {
                self.run_raffle(comment, &author, command, &config).await
            }
            ParseOutcome::NoTrigger => unreachable!("handled above"),
        }
    }

    /// Received → RejectedInvalidCommand.
    ///
    /// The explanatory reply goes out only when the author is itself
    /// authorized and not currently rate-limited for invalid commands;
    /// keyword mentions from arbitrary users stay silent.
    async fn reject_invalid(
        &self,
        comment: &Comment,
        author: &Username,
        config: &BotConfig,
    ) -> Result<RaffleOutcome> {
        let now = Utc::now();
        let limited = self
            .store
            .is_rate_limited(author, TriggerClass::Invalid, now);
        self.store
            .record_trigger(author, TriggerClass::Invalid, now)?;

        if !limited && self.is_authorized(author, comment, config).await? {
            let reply = format::invalid_command(&config.trigger_keyword);
            if let Err(e) = self.platform.post_reply(&comment.id, &reply).await {
                warn!(
                    comment = %comment.id,
                    feed = %comment.feed,
                    error = %e,
                    "failed to post invalid-command reply"
                );
            }
        } else {
            debug!(
                user = %author,
                comment = %comment.id,
                limited,
                "invalid command dropped silently"
            );
        }
        Ok(RaffleOutcome::RejectedInvalidCommand)
    }

    /// Authorizing → … → Committed for a well-formed command.
    async fn run_raffle(
        &self,
        comment: &Comment,
        author: &Username,
        command: RaffleCommand,
        config: &BotConfig,
    ) -> Result<Option<RaffleOutcome>> {
        // Authorizing.
        if !self.is_authorized(author, comment, config).await? {
            self.handle_unauthorized(author, comment, config).await;
            return Ok(Some(RaffleOutcome::RejectedUnauthorized));
        }

        // Authorized identities still get throttled on raw trigger volume.
        let now = Utc::now();
        if self.store.is_rate_limited(author, TriggerClass::Valid, now) {
            warn!(
                user = %author,
                thread = %comment.thread,
                feed = %comment.feed,
                "valid trigger dropped: identity is rate-limited"
            );
            return Ok(None);
        }
        self.store.record_trigger(author, TriggerClass::Valid, now)?;

        // DeduplicationCheck: membership test and insertion are one atomic
        // step, so only one of any concurrent triggers claims the thread.
        if !self.store.mark_processed_if_new(&comment.thread)? {
            info!(thread = %comment.thread, user = %author, "duplicate trigger rejected");
            self.post_best_effort(comment, &format::already_resolved())
                .await;
            return Ok(Some(RaffleOutcome::RejectedDuplicate));
        }

        // CollectingParticipants (no lock held from here on).
        let thread_comments = self.platform.thread_comments(&comment.thread).await?;
        let policy = EligibilityPolicy::from_config(config);
        let participants = compute_participants(
            &thread_comments,
            author,
            comment.thread_owner.as_ref(),
            &comment.feed,
            &policy,
            self.platform.as_ref(),
        )
        .await;

        let required = command.winner_count as usize;
        if participants.len() < required {
            info!(
                thread = %comment.thread,
                required,
                found = participants.len(),
                "raffle rejected: insufficient participants"
            );
            self.post_best_effort(
                comment,
                &format::insufficient_participants(required, participants.len()),
            )
            .await;
            return Ok(Some(RaffleOutcome::RejectedInsufficientParticipants {
                required,
                found: participants.len(),
            }));
        }

        // SelectingWinners: draw over a stable materialization of the set.
        // The insufficient-participants check above enforces k <= n.
        let pool: Vec<Username> = participants.iter().cloned().collect();
        let indices = self.random.draw_unique(required, pool.len()).await;
        let assigned = rewards::assign_rewards(&command.reward_tiers, required);
        let winners: Vec<(Username, u64)> = indices
            .into_iter()
            .zip(assigned.iter().copied())
            .map(|(index, reward)| (pool[index].clone(), reward))
            .collect();
        let total = rewards::total_reward(&assigned);

        // Responding: upload the participant list, degrade to a plain count
        // when the paste host is unavailable.
        let participants_url = match self
            .paste
            .upload(
                &pool
                    .iter()
                    .map(Username::as_str)
                    .collect::<Vec<_>>()
                    .join(" | "),
                &format!("Raffle participants: {}", comment.thread),
            )
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(thread = %comment.thread, error = %e, "participant list upload failed");
                None
            }
        };

        // Committed: the counter increment and save are the commit point.
        let sequence = self.store.next_raffle_sequence()?;
        let raffle = CommittedRaffle {
            sequence,
            thread: comment.thread.clone(),
            winners: winners.clone(),
            total_reward: total,
            participant_count: pool.len(),
        };
        info!(
            thread = %comment.thread,
            feed = %comment.feed,
            sequence,
            winners = winners.len(),
            total_reward = total,
            "raffle committed"
        );

        let reply = format::raffle_result(
            sequence,
            &winners,
            total,
            pool.len(),
            participants_url.as_deref(),
            &config.reward_currency,
        );
        // A failed announcement never rolls back the committed raffle.
        self.post_best_effort(comment, &reply).await;

        if total > 0 {
            self.spawn_disbursement_notifications(&raffle, config);
        }

        Ok(Some(RaffleOutcome::Committed(raffle)))
    }

    /// Moderator of the comment's feed, or whitelisted.
    async fn is_authorized(
        &self,
        author: &Username,
        comment: &Comment,
        config: &BotConfig,
    ) -> Result<bool> {
        if config.whitelisted_users.contains(author) {
            return Ok(true);
        }
        Ok(self.platform.is_moderator(author, &comment.feed).await?)
    }

    /// Unauthorized triggers never get a public reply; depending on
    /// configured verbosity the operator is notified instead.
    async fn handle_unauthorized(&self, author: &Username, comment: &Comment, config: &BotConfig) {
        warn!(
            user = %author,
            thread = %comment.thread,
            feed = %comment.feed,
            "unauthorized trigger rejected"
        );
        if config.notify_operator_on_unauthorized {
            if let Some(operator) = &config.operator {
                let body = format!(
                    "Unauthorized raffle trigger by u/{} in r/{} (thread {}).",
                    author, comment.feed, comment.thread
                );
                if let Err(e) = self
                    .platform
                    .send_message(operator, "Unauthorized raffle trigger", &body)
                    .await
                {
                    warn!(error = %e, "failed to notify operator");
                }
            }
        }
    }

    /// Posts a reply, logging failure instead of propagating it.
    async fn post_best_effort(&self, comment: &Comment, body: &str) {
        if let Err(e) = self.platform.post_reply(&comment.id, body).await {
            warn!(
                comment = %comment.id,
                thread = %comment.thread,
                feed = %comment.feed,
                error = %e,
                "failed to post reply"
            );
        }
    }

    /// Notifies the disbursement identity once per winner from a detached
    /// task, spaced to respect the platform's messaging limits.
    fn spawn_disbursement_notifications(&self, raffle: &CommittedRaffle, config: &BotConfig) {
        let Some(disburser) = config.disburser.clone() else {
            debug!("raffle carries rewards but no disburser is configured");
            return;
        };
        let platform = Arc::clone(&self.platform);
        let currency = config.reward_currency.clone();
        let raffle = raffle.clone();

        tokio::spawn(async move {
            for (winner, reward) in &raffle.winners {
                if *reward == 0 {
                    continue;
                }
                let body = format::disbursement_notice(winner, *reward, &currency, raffle.sequence);
                if let Err(e) = platform
                    .send_message(&disburser, "Raffle reward disbursement", &body)
                    .await
                {
                    warn!(
                        winner = %winner,
                        sequence = raffle.sequence,
                        error = %e,
                        "failed to send disbursement notification"
                    );
                }
                tokio::time::sleep(DISBURSEMENT_SPACING).await;
            }
        });
    }
}
