//! Local uniform sampling without replacement.

use rand::seq::index;

/// Draws `k` distinct indices uniformly from `[0, n)` using the thread-local
/// RNG.
///
/// Precondition: `k <= n` (enforced by the caller before any draw).
pub fn sample_unique(k: usize, n: usize) -> Vec<usize> {
    index::sample(&mut rand::thread_rng(), n, k).into_vec()
}
