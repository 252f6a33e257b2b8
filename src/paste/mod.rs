//! Paste-hosting upload for full participant lists.
//!
//! Result replies link to an externally hosted copy of the participant list
//! instead of inlining hundreds of names. Upload failure only degrades the
//! reply (participant count without a link); it never aborts a raffle.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the paste host.
#[derive(Debug, Error)]
pub enum PasteError {
    /// Transport failure or timeout.
    #[error("paste upload failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP response.
    #[error("paste host returned HTTP {0}")]
    Status(u16),

    /// Session login rejected.
    #[error("paste host login failed")]
    Login,

    /// No paste host configured.
    #[error("paste uploads disabled")]
    Disabled,
}

/// Upload contract: text plus title in, public URL out.
#[async_trait]
pub trait PasteClient: Send + Sync {
    async fn upload(&self, text: &str, title: &str) -> Result<String, PasteError>;
}

/// Stand-in used when no paste credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaste;

#[async_trait]
impl PasteClient for NoPaste {
    async fn upload(&self, _text: &str, _title: &str) -> Result<String, PasteError> {
        Err(PasteError::Disabled)
    }
}

const LOGIN_URL: &str = "https://pastebin.com/api/api_login.php";
const POST_URL: &str = "https://pastebin.com/api/api_post.php";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pastebin credentials, typically read from the environment.
#[derive(Debug, Clone)]
pub struct PastebinCredentials {
    pub api_key: String,
    pub username: String,
    pub password: String,
}

impl PastebinCredentials {
    /// Reads credentials from `PASTEBIN_API_KEY`, `PASTEBIN_USERNAME`, and
    /// `PASTEBIN_PASSWORD`; `None` when any is missing.
    pub fn from_env() -> Option<Self> {
        Some(PastebinCredentials {
            api_key: std::env::var("PASTEBIN_API_KEY").ok()?,
            username: std::env::var("PASTEBIN_USERNAME").ok()?,
            password: std::env::var("PASTEBIN_PASSWORD").ok()?,
        })
    }
}

/// Pastebin-flavored implementation: session login per upload, unlisted
/// pastes expiring after one week.
#[derive(Debug, Clone)]
pub struct PastebinClient {
    http: reqwest::Client,
    creds: PastebinCredentials,
}

impl PastebinClient {
    pub fn new(creds: PastebinCredentials) -> Result<Self, PasteError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(PastebinClient { http, creds })
    }

    async fn login(&self) -> Result<String, PasteError> {
        let response = self
            .http
            .post(LOGIN_URL)
            .form(&[
                ("api_dev_key", self.creds.api_key.as_str()),
                ("api_user_name", self.creds.username.as_str()),
                ("api_user_password", self.creds.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PasteError::Status(status.as_u16()));
        }
        let key = response.text().await?;
        if key.is_empty() || key.starts_with("Bad API request") {
            return Err(PasteError::Login);
        }
        Ok(key)
    }
}

#[async_trait]
impl PasteClient for PastebinClient {
    async fn upload(&self, text: &str, title: &str) -> Result<String, PasteError> {
        let user_key = self.login().await?;
        let response = self
            .http
            .post(POST_URL)
            .form(&[
                ("api_dev_key", self.creds.api_key.as_str()),
                ("api_user_key", user_key.as_str()),
                ("api_option", "paste"),
                ("api_paste_code", text),
                ("api_paste_name", title),
                // Unlisted, gone after a week.
                ("api_paste_private", "1"),
                ("api_paste_expire_date", "1W"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PasteError::Status(status.as_u16()));
        }
        let url = response.text().await?;
        if url.starts_with("Bad API request") {
            return Err(PasteError::Login);
        }
        Ok(raw_link(&url))
    }
}

/// Rewrites a pastebin URL to its raw form so the reply links to plain text.
pub fn raw_link(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((prefix, key)) if prefix.ends_with("pastebin.com") && !key.is_empty() => {
            format!("https://pastebin.com/raw/{key}")
        }
        _ => url.to_string(),
    }
}
