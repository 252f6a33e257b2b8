//! Thin Reddit client implementing the platform traits over `reqwest`.
//!
//! Authentication uses the OAuth2 refresh-token grant; the access token is
//! cached and refreshed shortly before expiry. Feed subscriptions are
//! implemented by polling the feed's newest comments and de-duplicating
//! against a bounded window of already-yielded IDs. The engine's processed
//! set remains the authoritative guard, so overlap here is harmless.
//!
//! All calls carry a bounded timeout; a call without a response within its
//! timeout is a transient failure.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::{AccountMetadata, Comment, CommentId, FeedId, ThreadId, Username};

use super::error::PlatformError;
use super::retry::{retry_with_backoff, RetryConfig};
use super::{
    AccountLookup, FeedSource, ModeratorLookup, Notifier, ReplyPoster, Subscription, ThreadReader,
};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between subscription polls when no new comments arrived.
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How many recently-yielded comment IDs a subscription remembers.
const SEEN_WINDOW: usize = 1000;

/// Refresh the token this long before it actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Credentials for the refresh-token grant, typically read from the
/// environment.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub user_agent: String,
}

impl RedditCredentials {
    /// Reads credentials from `APP_ID`, `APP_SECRET`, and `APP_REFRESH`.
    pub fn from_env() -> Result<Self, PlatformError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| PlatformError::auth(format!("missing environment variable {name}")))
        };
        Ok(RedditCredentials {
            client_id: var("APP_ID")?,
            client_secret: var("APP_SECRET")?,
            refresh_token: var("APP_REFRESH")?,
            user_agent: "sub-raffler (raffle moderation bot)".to_string(),
        })
    }
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Reddit-flavored implementation of the platform traits.
#[derive(Clone)]
pub struct RedditClient {
    http: reqwest::Client,
    creds: Arc<RedditCredentials>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl RedditClient {
    /// Builds a client without contacting the platform.
    pub fn new(creds: RedditCredentials) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .user_agent(creds.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(RedditClient {
            http,
            creds: Arc::new(creds),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Builds a client and verifies the credentials by obtaining a token,
    /// retrying per the login budget. Exhaustion or a rejected credential is
    /// fatal for the caller.
    pub async fn connect(creds: RedditCredentials) -> Result<Self, PlatformError> {
        let client = Self::new(creds)?;
        retry_with_backoff(RetryConfig::LOGIN, || async {
            client.refresh_token().await?;
            Ok(())
        })
        .await?;
        debug!("platform login succeeded");
        Ok(client)
    }

    async fn refresh_token(&self) -> Result<String, PlatformError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.creds.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::from_status(
                status.as_u16(),
                "token refresh rejected",
            ));
        }

        let parsed: TokenResponse = response.json().await?;
        let mut guard = self.token.lock().await;
        let expires_at = Instant::now() + Duration::from_secs(parsed.expires_in)
            - TOKEN_REFRESH_MARGIN.min(Duration::from_secs(parsed.expires_in));
        let access = parsed.access_token.clone();
        *guard = Some(CachedToken {
            access_token: parsed.access_token,
            expires_at,
        });
        Ok(access)
    }

    async fn bearer(&self) -> Result<String, PlatformError> {
        {
            let guard = self.token.lock().await;
            if let Some(token) = guard.as_ref() {
                if Instant::now() < token.expires_at {
                    return Ok(token.access_token.clone());
                }
            }
        }
        self.refresh_token().await
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, PlatformError> {
        let token = self.bearer().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::from_status(
                status.as_u16(),
                format!("GET {url}"),
            ));
        }
        Ok(response.json().await?)
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<(), PlatformError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::from_status(
                status.as_u16(),
                format!("POST {url}"),
            ));
        }
        Ok(())
    }

    fn newest_comments_url(&self, feed: &FeedId) -> String {
        format!("{API_BASE}/r/{}/comments?limit=100", feed)
    }
}

/// Converts one comment object from a listing into a [`Comment`].
///
/// Returns `None` when required fields are missing, which happens for
/// non-comment things mixed into listings.
fn comment_from_value(value: &serde_json::Value) -> Option<Comment> {
    let data = value.get("data")?;
    let id = data.get("id")?.as_str()?;
    let body = data.get("body")?.as_str()?;
    let feed = data.get("subreddit")?.as_str()?;
    let created = data.get("created_utc")?.as_f64()?;
    let link_id = data.get("link_id")?.as_str()?;
    let thread = link_id.strip_prefix("t3_").unwrap_or(link_id);

    Some(Comment {
        id: CommentId::new(id),
        thread: ThreadId::new(thread),
        feed: FeedId::new(feed),
        author: author_from(data.get("author")),
        thread_owner: author_from(data.get("link_author")),
        body: body.to_string(),
        created_at: timestamp_from(created),
    })
}

/// Maps an author field to an identity, treating deleted/anonymized authors
/// as absent.
fn author_from(value: Option<&serde_json::Value>) -> Option<Username> {
    let name = value?.as_str()?;
    if name.is_empty() || name == "[deleted]" || name == "[removed]" {
        None
    } else {
        Some(Username::new(name))
    }
}

fn timestamp_from(created_utc: f64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(created_utc as i64, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Recursively collects comments (and their replies) from a comment listing.
fn collect_tree(value: &serde_json::Value, out: &mut Vec<Comment>) {
    let children = value
        .pointer("/data/children")
        .and_then(|c| c.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);

    for child in children {
        if let Some(comment) = comment_from_value(child) {
            out.push(comment);
        }
        if let Some(replies) = child.pointer("/data/replies") {
            // Leaf comments carry an empty string instead of a listing.
            if replies.is_object() {
                collect_tree(replies, out);
            }
        }
    }
}

/// Polling-based subscription over a feed's newest comments.
struct PollingSubscription {
    client: RedditClient,
    feed: FeedId,
    pending: VecDeque<Comment>,
    seen: HashSet<CommentId>,
    seen_order: VecDeque<CommentId>,
}

impl PollingSubscription {
    fn remember(&mut self, id: CommentId) {
        if self.seen.insert(id.clone()) {
            self.seen_order.push_back(id);
            if self.seen_order.len() > SEEN_WINDOW {
                if let Some(evicted) = self.seen_order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
    }

    async fn poll_once(&mut self) -> Result<(), PlatformError> {
        let url = self.client.newest_comments_url(&self.feed);
        let listing = self.client.get_json(&url).await?;

        let mut batch = Vec::new();
        collect_tree(&listing, &mut batch);

        // Listings are newest-first; yield in arrival order.
        for comment in batch.into_iter().rev() {
            if !self.seen.contains(&comment.id) {
                self.remember(comment.id.clone());
                self.pending.push_back(comment);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Subscription for PollingSubscription {
    async fn next_comment(&mut self) -> Result<Comment, PlatformError> {
        loop {
            if let Some(comment) = self.pending.pop_front() {
                return Ok(comment);
            }
            self.poll_once().await?;
            if self.pending.is_empty() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn subscribe(&self, feed: &FeedId) -> Result<Box<dyn Subscription>, PlatformError> {
        let mut subscription = PollingSubscription {
            client: self.clone(),
            feed: feed.clone(),
            pending: VecDeque::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
        };

        // Prime the seen window so the stream starts at "now" rather than
        // replaying the whole first page; the watermark skips replays anyway.
        if let Err(e) = subscription.poll_once().await {
            warn!(feed = %feed, error = %e, "initial poll failed, subscription starts cold");
        }
        subscription.pending.clear();

        Ok(Box::new(subscription))
    }
}

#[async_trait]
impl ModeratorLookup for RedditClient {
    async fn is_moderator(&self, user: &Username, feed: &FeedId) -> Result<bool, PlatformError> {
        let url = format!("{API_BASE}/r/{}/about/moderators", feed);
        let listing = self.get_json(&url).await?;
        let children = listing
            .pointer("/data/children")
            .and_then(|c| c.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]);
        Ok(children
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .any(|name| name == user.as_str()))
    }
}

#[async_trait]
impl ThreadReader for RedditClient {
    async fn thread_comments(&self, thread: &ThreadId) -> Result<Vec<Comment>, PlatformError> {
        // depth/limit maxed out so collapsed branches come back expanded.
        let url = format!("{API_BASE}/comments/{}?limit=500&depth=100", thread);
        let value = self.get_json(&url).await?;

        // The endpoint returns [post listing, comment listing].
        let comments_listing = value
            .as_array()
            .and_then(|parts| parts.get(1))
            .ok_or_else(|| PlatformError::permanent("malformed thread listing"))?;

        let mut out = Vec::new();
        collect_tree(comments_listing, &mut out);
        Ok(out)
    }
}

#[async_trait]
impl ReplyPoster for RedditClient {
    async fn post_reply(&self, parent: &CommentId, body: &str) -> Result<(), PlatformError> {
        let thing_id = format!("t1_{}", parent);
        self.post_form(
            &format!("{API_BASE}/api/comment"),
            &[
                ("api_type", "json"),
                ("thing_id", thing_id.as_str()),
                ("text", body),
            ],
        )
        .await
    }
}

#[async_trait]
impl AccountLookup for RedditClient {
    async fn fetch_account(&self, user: &Username) -> Result<AccountMetadata, PlatformError> {
        let url = format!("{API_BASE}/user/{}/about", user);
        let value = self.get_json(&url).await?;
        let data = value
            .get("data")
            .ok_or_else(|| PlatformError::permanent("malformed account payload"))?;

        let created = data
            .get("created_utc")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| PlatformError::permanent("account payload missing created_utc"))?;
        let link_karma = data.get("link_karma").and_then(|v| v.as_i64()).unwrap_or(0);
        let comment_karma = data
            .get("comment_karma")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        Ok(AccountMetadata {
            created_at: timestamp_from(created),
            karma: link_karma + comment_karma,
        })
    }

    async fn recent_feed_activity(
        &self,
        user: &Username,
        limit: usize,
    ) -> Result<Vec<FeedId>, PlatformError> {
        let url = format!("{API_BASE}/user/{}/comments?limit={}", user, limit.min(100));
        let listing = self.get_json(&url).await?;
        let children = listing
            .pointer("/data/children")
            .and_then(|c| c.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]);
        Ok(children
            .iter()
            .filter_map(|c| c.pointer("/data/subreddit").and_then(|s| s.as_str()))
            .map(FeedId::new)
            .collect())
    }
}

#[async_trait]
impl Notifier for RedditClient {
    async fn send_message(
        &self,
        recipient: &Username,
        subject: &str,
        body: &str,
    ) -> Result<(), PlatformError> {
        self.post_form(
            &format!("{API_BASE}/api/compose"),
            &[
                ("api_type", "json"),
                ("to", recipient.as_str()),
                ("subject", subject),
                ("text", body),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comment_parses_from_listing_entry() {
        let value = json!({
            "kind": "t1",
            "data": {
                "id": "abc",
                "body": "hello",
                "subreddit": "TestFeed",
                "author": "alice",
                "link_author": "bob",
                "link_id": "t3_xyz",
                "created_utc": 1700000000.0
            }
        });

        let comment = comment_from_value(&value).unwrap();
        assert_eq!(comment.id, CommentId::new("abc"));
        assert_eq!(comment.thread, ThreadId::new("xyz"));
        assert_eq!(comment.feed, FeedId::new("TestFeed"));
        assert_eq!(comment.author, Some(Username::new("alice")));
        assert_eq!(comment.thread_owner, Some(Username::new("bob")));
    }

    #[test]
    fn deleted_author_maps_to_none() {
        assert_eq!(author_from(Some(&json!("[deleted]"))), None);
        assert_eq!(author_from(Some(&json!("[removed]"))), None);
        assert_eq!(author_from(Some(&json!(""))), None);
        assert_eq!(author_from(None), None);
        assert_eq!(
            author_from(Some(&json!("carol"))),
            Some(Username::new("carol"))
        );
    }

    #[test]
    fn malformed_entry_is_skipped() {
        assert!(comment_from_value(&json!({"kind": "more"})).is_none());
        assert!(comment_from_value(&json!({"data": {"id": "x"}})).is_none());
    }

    #[test]
    fn tree_collection_descends_replies() {
        let listing = json!({
            "data": {
                "children": [
                    {
                        "data": {
                            "id": "top",
                            "body": "root comment",
                            "subreddit": "f",
                            "author": "alice",
                            "link_id": "t3_t",
                            "created_utc": 1.0,
                            "replies": {
                                "data": {
                                    "children": [
                                        {
                                            "data": {
                                                "id": "nested",
                                                "body": "reply",
                                                "subreddit": "f",
                                                "author": "bob",
                                                "link_id": "t3_t",
                                                "created_utc": 2.0,
                                                "replies": ""
                                            }
                                        }
                                    ]
                                }
                            }
                        }
                    }
                ]
            }
        });

        let mut out = Vec::new();
        collect_tree(&listing, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, CommentId::new("top"));
        assert_eq!(out[1].id, CommentId::new("nested"));
    }
}
