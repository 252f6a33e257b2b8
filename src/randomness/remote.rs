//! random.org JSON-RPC client for unique integer draws.
//!
//! Implements the `generateIntegers` call with replacement disabled. The
//! response is structurally validated (exactly `k` distinct values inside
//! `[0, n)`) before it is trusted; anything else is an error and the caller
//! falls back to local sampling.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default JSON-RPC endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.random.org/json-rpc/4/invoke";

/// Per-call timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the randomness service.
#[derive(Debug, Error)]
pub enum RandomOrgError {
    /// Transport failure or timeout.
    #[error("randomness service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP response.
    #[error("randomness service returned HTTP {0}")]
    Status(u16),

    /// JSON-RPC level error object.
    #[error("randomness service error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Structurally invalid payload (wrong count, out of range, duplicates).
    #[error("randomness service payload invalid: {0}")]
    InvalidPayload(&'static str),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: GenerateIntegersParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct GenerateIntegersParams<'a> {
    #[serde(rename = "apiKey")]
    api_key: &'a str,
    n: usize,
    min: i64,
    max: i64,
    replacement: bool,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<RpcResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResult {
    random: RandomData,
}

#[derive(Deserialize)]
struct RandomData {
    data: Vec<i64>,
}

/// Client for the external randomness service.
#[derive(Debug, Clone)]
pub struct RandomOrgClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    next_id: std::sync::Arc<AtomicU64>,
}

impl RandomOrgClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT)
    }

    /// Overrides the endpoint; used by tests pointing at a stub server.
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        RandomOrgClient {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            next_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    /// Requests `k` unique integers in `[0, n)`.
    ///
    /// The response is validated before being returned; any structural
    /// anomaly is an error rather than a partially trusted draw.
    pub async fn generate_unique(&self, k: usize, n: usize) -> Result<Vec<usize>, RandomOrgError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "generateIntegers",
            params: GenerateIntegersParams {
                api_key: &self.api_key,
                n: k,
                min: 0,
                max: n as i64 - 1,
                replacement: false,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RandomOrgError::Status(status.as_u16()));
        }

        let parsed: RpcResponse = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(RandomOrgError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let data = parsed
            .result
            .ok_or(RandomOrgError::InvalidPayload("missing result"))?
            .random
            .data;

        validate_draw(&data, k, n)
    }
}

/// Checks that a draw is exactly `k` distinct values inside `[0, n)`.
fn validate_draw(data: &[i64], k: usize, n: usize) -> Result<Vec<usize>, RandomOrgError> {
    if data.len() != k {
        return Err(RandomOrgError::InvalidPayload("wrong value count"));
    }
    let mut seen = HashSet::with_capacity(k);
    let mut indices = Vec::with_capacity(k);
    for &value in data {
        if value < 0 || value as usize >= n {
            return Err(RandomOrgError::InvalidPayload("value out of range"));
        }
        if !seen.insert(value) {
            return Err(RandomOrgError::InvalidPayload("duplicate value"));
        }
        indices.push(value as usize);
    }
    Ok(indices)
}
