//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! CommentId where a ThreadId is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored discussion feed (subreddit-equivalent).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(pub String);

impl FeedId {
    pub fn new(s: impl Into<String>) -> Self {
        FeedId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FeedId {
    fn from(s: &str) -> Self {
        FeedId(s.to_string())
    }
}

impl From<String> for FeedId {
    fn from(s: String) -> Self {
        FeedId(s)
    }
}

/// A root post and its nested discussion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(s: impl Into<String>) -> Self {
        ThreadId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        ThreadId(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        ThreadId(s)
    }
}

/// A single comment within a thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub String);

impl CommentId {
    pub fn new(s: impl Into<String>) -> Self {
        CommentId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CommentId {
    fn from(s: &str) -> Self {
        CommentId(s.to_string())
    }
}

impl From<String> for CommentId {
    fn from(s: String) -> Self {
        CommentId(s)
    }
}

/// A user account acting as comment author, moderator, or excluded/whitelisted
/// entry.
///
/// Comparison is exact: the platform treats account names as canonical strings,
/// and a deleted author is represented as `None` upstream rather than as a
/// sentinel name, so it never matches any `Username` by equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn new(s: impl Into<String>) -> Self {
        Username(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Username(s.to_string())
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Username(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod feed_id {
        use super::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[a-zA-Z][a-zA-Z0-9_]{0,20}") {
                let id = FeedId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: FeedId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }

            #[test]
            fn display_matches_inner(s in "[a-zA-Z][a-zA-Z0-9_]{0,20}") {
                let id = FeedId::new(&s);
                prop_assert_eq!(format!("{}", id), s);
            }
        }
    }

    mod thread_id {
        use super::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[a-z0-9]{1,10}") {
                let id = ThreadId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: ThreadId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }

            #[test]
            fn comparison_matches_underlying(a in "[a-z0-9]{1,10}", b in "[a-z0-9]{1,10}") {
                let id_a = ThreadId::new(&a);
                let id_b = ThreadId::new(&b);
                prop_assert_eq!(id_a == id_b, a == b);
            }
        }
    }

    mod username {
        use super::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[a-zA-Z0-9_-]{1,20}") {
                let user = Username::new(&s);
                let json = serde_json::to_string(&user).unwrap();
                let parsed: Username = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(user, parsed);
            }

            #[test]
            fn comparison_is_case_sensitive(s in "[a-z]{3,10}") {
                let lower = Username::new(&s);
                let upper = Username::new(s.to_uppercase());
                prop_assert_ne!(lower, upper);
            }
        }

        #[test]
        fn serializes_as_bare_string() {
            let user = Username::new("alice");
            assert_eq!(serde_json::to_string(&user).unwrap(), "\"alice\"");
        }
    }
}
