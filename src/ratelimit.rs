//! Per-identity trigger rate limiting.
//!
//! Each identity gets two rolling-window buckets, one for valid triggers and
//! one for invalid ones. An identity with [`MAX_TRIGGERS_PER_WINDOW`] or more
//! timestamps inside the window for a class is currently limited for that
//! class. The ledger is persisted with the rest of the bot state so limits
//! survive restarts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Username;

/// Rolling window length in seconds.
pub const WINDOW_SECS: i64 = 3600;

/// In-window triggers at which an identity becomes limited.
pub const MAX_TRIGGERS_PER_WINDOW: usize = 3;

fn window() -> Duration {
    Duration::seconds(WINDOW_SECS)
}

/// Classification of a trigger for rate-limiting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerClass {
    /// A well-formed, authorized trigger.
    Valid,
    /// A malformed trigger (parse failure).
    Invalid,
}

/// Timestamps of one identity's recent triggers, per class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ClassBuckets {
    #[serde(default)]
    valid: Vec<DateTime<Utc>>,
    #[serde(default)]
    invalid: Vec<DateTime<Utc>>,
}

impl ClassBuckets {
    fn bucket(&self, class: TriggerClass) -> &Vec<DateTime<Utc>> {
        match class {
            TriggerClass::Valid => &self.valid,
            TriggerClass::Invalid => &self.invalid,
        }
    }

    fn bucket_mut(&mut self, class: TriggerClass) -> &mut Vec<DateTime<Utc>> {
        match class {
            TriggerClass::Valid => &mut self.valid,
            TriggerClass::Invalid => &mut self.invalid,
        }
    }

    fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.invalid.is_empty()
    }
}

/// Durable record of recent triggers per identity and class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLimitLedger {
    entries: BTreeMap<Username, ClassBuckets>,
}

impl RateLimitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a trigger at `now` for the identity and class.
    pub fn record(&mut self, user: &Username, class: TriggerClass, now: DateTime<Utc>) {
        self.entries
            .entry(user.clone())
            .or_default()
            .bucket_mut(class)
            .push(now);
    }

    /// True when the identity has reached the in-window trigger budget for the
    /// class as of `now`.
    pub fn is_limited(&self, user: &Username, class: TriggerClass, now: DateTime<Utc>) -> bool {
        let cutoff = now - window();
        self.entries
            .get(user)
            .map(|buckets| {
                buckets
                    .bucket(class)
                    .iter()
                    .filter(|&&ts| ts > cutoff)
                    .count()
                    >= MAX_TRIGGERS_PER_WINDOW
            })
            .unwrap_or(false)
    }

    /// Drops all timestamps outside the window as of `now`, removing
    /// identities whose buckets become empty. Returns the number of
    /// timestamps pruned.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - window();
        let mut pruned = 0;
        self.entries.retain(|_, buckets| {
            for class in [TriggerClass::Valid, TriggerClass::Invalid] {
                let bucket = buckets.bucket_mut(class);
                let before = bucket.len();
                bucket.retain(|&ts| ts > cutoff);
                pruned += before - bucket.len();
            }
            !buckets.is_empty()
        });
        pruned
    }

    /// Number of identities currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(name: &str) -> Username {
        Username::new(name)
    }

    #[test]
    fn fresh_identity_is_not_limited() {
        let ledger = RateLimitLedger::new();
        assert!(!ledger.is_limited(&user("alice"), TriggerClass::Valid, Utc::now()));
    }

    #[test]
    fn limit_kicks_in_at_three_in_window() {
        let mut ledger = RateLimitLedger::new();
        let now = Utc::now();
        let alice = user("alice");

        ledger.record(&alice, TriggerClass::Valid, now - Duration::minutes(30));
        ledger.record(&alice, TriggerClass::Valid, now - Duration::minutes(20));
        assert!(!ledger.is_limited(&alice, TriggerClass::Valid, now));

        ledger.record(&alice, TriggerClass::Valid, now - Duration::minutes(10));
        assert!(ledger.is_limited(&alice, TriggerClass::Valid, now));
    }

    #[test]
    fn classes_are_tracked_independently() {
        let mut ledger = RateLimitLedger::new();
        let now = Utc::now();
        let alice = user("alice");

        for _ in 0..3 {
            ledger.record(&alice, TriggerClass::Invalid, now);
        }
        assert!(ledger.is_limited(&alice, TriggerClass::Invalid, now));
        assert!(!ledger.is_limited(&alice, TriggerClass::Valid, now));
    }

    #[test]
    fn timestamps_outside_window_do_not_count() {
        let mut ledger = RateLimitLedger::new();
        let now = Utc::now();
        let alice = user("alice");

        for age_minutes in [90, 70, 61] {
            ledger.record(
                &alice,
                TriggerClass::Valid,
                now - Duration::minutes(age_minutes),
            );
        }
        assert!(!ledger.is_limited(&alice, TriggerClass::Valid, now));
    }

    #[test]
    fn limit_expires_as_the_window_slides() {
        let mut ledger = RateLimitLedger::new();
        let now = Utc::now();
        let alice = user("alice");

        for _ in 0..3 {
            ledger.record(&alice, TriggerClass::Valid, now);
        }
        assert!(ledger.is_limited(&alice, TriggerClass::Valid, now));
        assert!(!ledger.is_limited(&alice, TriggerClass::Valid, now + Duration::minutes(61)));
    }

    #[test]
    fn prune_drops_expired_and_empty_entries() {
        let mut ledger = RateLimitLedger::new();
        let now = Utc::now();
        let alice = user("alice");
        let bob = user("bob");

        ledger.record(&alice, TriggerClass::Valid, now - Duration::hours(2));
        ledger.record(&bob, TriggerClass::Invalid, now);
        assert_eq!(ledger.len(), 2);

        let pruned = ledger.prune(now);
        assert_eq!(pruned, 1);
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_limited(&alice, TriggerClass::Valid, now));
        assert!(!ledger.is_empty());
    }

    proptest! {
        /// Pruning never changes a limit decision made at the same instant.
        #[test]
        fn prune_preserves_limit_decisions(
            offsets in proptest::collection::vec(0i64..7200, 0..10)
        ) {
            let now = Utc::now();
            let alice = user("alice");
            let mut ledger = RateLimitLedger::new();
            for offset in &offsets {
                ledger.record(&alice, TriggerClass::Valid, now - Duration::seconds(*offset));
            }

            let before = ledger.is_limited(&alice, TriggerClass::Valid, now);
            ledger.prune(now);
            let after = ledger.is_limited(&alice, TriggerClass::Valid, now);
            prop_assert_eq!(before, after);
        }

        /// Serde roundtrip preserves the ledger.
        #[test]
        fn serde_roundtrip(
            names in proptest::collection::vec("[a-z]{3,8}", 0..5)
        ) {
            let now = Utc::now();
            let mut ledger = RateLimitLedger::new();
            for name in &names {
                ledger.record(&user(name), TriggerClass::Valid, now);
                ledger.record(&user(name), TriggerClass::Invalid, now);
            }
            let json = serde_json::to_string(&ledger).unwrap();
            let parsed: RateLimitLedger = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(ledger, parsed);
        }
    }
}
