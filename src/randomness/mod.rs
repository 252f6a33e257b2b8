//! Winner-index selection: external randomness service with a local
//! uniform-sampling fallback.

mod local;
mod remote;

use tracing::warn;

pub use local::sample_unique;
pub use remote::{RandomOrgClient, RandomOrgError, DEFAULT_ENDPOINT};

/// Draws unique winner indices, preferring the external service when
/// configured and falling back to local sampling on any failure.
#[derive(Debug, Clone, Default)]
pub struct RandomSource {
    remote: Option<RandomOrgClient>,
}

impl RandomSource {
    /// A source that only ever samples locally.
    pub fn local_only() -> Self {
        RandomSource { remote: None }
    }

    /// A source that consults the external service first.
    pub fn with_remote(client: RandomOrgClient) -> Self {
        RandomSource {
            remote: Some(client),
        }
    }

    /// Builds from an optional API key: absent credentials mean local-only.
    pub fn from_api_key(api_key: Option<String>) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => Self::with_remote(RandomOrgClient::new(key)),
            _ => Self::local_only(),
        }
    }

    /// Returns `k` pairwise distinct indices in `[0, n)`.
    ///
    /// `k <= n` is a precondition enforced by the caller; this function never
    /// silently truncates a draw.
    pub async fn draw_unique(&self, k: usize, n: usize) -> Vec<usize> {
        assert!(k <= n, "draw_unique requires k <= n (got k={k}, n={n})");
        if k == 0 {
            return Vec::new();
        }

        if let Some(remote) = &self.remote {
            match remote.generate_unique(k, n).await {
                Ok(indices) => return indices,
                Err(e) => {
                    warn!(error = %e, "randomness service unavailable, falling back to local sampling");
                }
            }
        }

        local::sample_unique(k, n)
    }
}
