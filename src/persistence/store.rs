//! Single-writer durable store for [`PersistedState`].
//!
//! All mutating access goes through one process-wide lock; every mutation is
//! flushed to disk before the lock is released, so a crash never loses a
//! committed decision. Writes use the write-to-temp-then-rename pattern:
//!
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the parent directory
//!
//! Readers therefore always see either the old or the new record, never a
//! partial write. Raffle frequency is low relative to write latency, so a
//! full-file rewrite per mutation is deliberate.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use super::fsync::{fsync_dir, fsync_file};
use super::state::{PersistedState, SCHEMA_VERSION};
use crate::ratelimit::TriggerClass;
use crate::types::{FeedId, ThreadId, Username};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The process-wide state owner.
///
/// Holds the in-memory copy of the persisted record behind a single lock and
/// keeps the on-disk file in sync with every mutation. Critical sections are
/// short bookkeeping only; callers must not hold the lock across network I/O.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<PersistedState>,
}

impl StateStore {
    /// Opens the store at `path`.
    ///
    /// A missing file yields defaults and is written out immediately. A
    /// corrupt file is treated as absent: defaults are logged, adopted, and
    /// the corrupt content is overwritten rather than left on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match load_state(&path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = %path.display(), "no state file, starting from defaults");
                let state = PersistedState::default();
                save_state_atomic(&path, &state)?;
                state
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "state file unreadable, reverting to defaults"
                );
                let state = PersistedState::default();
                save_state_atomic(&path, &state)?;
                state
            }
        };

        Ok(StateStore {
            path,
            inner: Mutex::new(state),
        })
    }

    /// Creates a store over an explicit state, writing it out immediately.
    pub fn create(path: impl Into<PathBuf>, state: PersistedState) -> Result<Self> {
        let path = path.into();
        save_state_atomic(&path, &state)?;
        Ok(StateStore {
            path,
            inner: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PersistedState> {
        // A poisoned lock means a panic mid-bookkeeping; the record itself is
        // still the last durably saved one, which is safe to keep using.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs a read-only closure against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&PersistedState) -> T) -> T {
        f(&self.lock())
    }

    /// Clones the current configuration.
    pub fn config(&self) -> super::state::BotConfig {
        self.read(|state| state.config.clone())
    }

    /// Runs a mutating closure, then saves the record before releasing the
    /// lock. The closure's result is returned only if the save succeeds.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut PersistedState) -> T) -> Result<T> {
        let mut guard = self.lock();
        let value = f(&mut guard);
        save_state_atomic(&self.path, &guard)?;
        Ok(value)
    }

    /// Atomically tests and marks a thread as processed.
    ///
    /// Returns `true` when this call claimed the thread (it was unseen) and
    /// `false` when the thread had already consumed its resolution attempt.
    /// Membership test and insertion happen in the same critical section, so
    /// two concurrent triggers on one thread can never both claim it.
    pub fn mark_processed_if_new(&self, thread: &ThreadId) -> Result<bool> {
        self.with_state(|state| state.processed_threads.insert(thread.clone()))
    }

    /// Returns the watermark for a feed.
    pub fn watermark(&self, feed: &FeedId) -> DateTime<Utc> {
        self.read(|state| state.watermark(feed))
    }

    /// Advances a feed's watermark (monotonic) and persists.
    pub fn advance_watermark(&self, feed: &FeedId, seen: DateTime<Utc>) -> Result<()> {
        self.with_state(|state| state.advance_watermark(feed, seen))
    }

    /// Increments the raffle counter and persists, returning the sequence
    /// number assigned to the raffle being committed.
    pub fn next_raffle_sequence(&self) -> Result<u64> {
        self.with_state(|state| {
            state.config.raffle_count += 1;
            state.config.raffle_count
        })
    }

    /// Records a trigger for rate limiting and persists.
    pub fn record_trigger(
        &self,
        user: &Username,
        class: TriggerClass,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_state(|state| state.rate_limits.record(user, class, now))
    }

    /// Whether an identity is currently rate-limited for a trigger class.
    pub fn is_rate_limited(&self, user: &Username, class: TriggerClass, now: DateTime<Utc>) -> bool {
        self.read(|state| state.rate_limits.is_limited(user, class, now))
    }

    /// Prunes expired rate-limit entries; persists only when something was
    /// dropped. Returns the number of timestamps pruned.
    pub fn prune_rate_limits(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut guard = self.lock();
        let pruned = guard.rate_limits.prune(now);
        if pruned > 0 {
            save_state_atomic(&self.path, &guard)?;
        }
        Ok(pruned)
    }

    /// Re-reads the state file, replacing the in-memory record.
    ///
    /// This is the explicit reload operation (wired to a signal by the
    /// binary) for picking up operator edits to the configuration. Returns
    /// `Ok(false)` and keeps the current record when the file is missing;
    /// unreadable content is an error and also leaves the record untouched,
    /// so a bad edit cannot clobber live state.
    pub fn reload_from_disk(&self) -> Result<bool> {
        let mut guard = self.lock();
        match load_state(&self.path)? {
            Some(state) => {
                *guard = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The file this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loads the state record. `Ok(None)` when the file does not exist.
fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let state: PersistedState = serde_json::from_slice(&bytes)?;
    if state.schema_version != SCHEMA_VERSION {
        warn!(
            got = state.schema_version,
            expected = SCHEMA_VERSION,
            "state schema version mismatch, keeping record as-is"
        );
    }
    Ok(Some(state))
}

/// Saves the state record atomically.
fn save_state_atomic(path: &Path, state: &PersistedState) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(state)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fsync_dir(parent)?;
        }
    }

    Ok(())
}
