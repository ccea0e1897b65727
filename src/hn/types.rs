//! Wire types for the Hacker News Firebase API.
//!
//! The upstream omits fields freely (dead items, jobs without URLs, comments
//! without authors), so everything optional is defaulted rather than rejected.

use serde::{Deserialize, Serialize};

/// A story (or any item) as returned by `GET item/{id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// Upstream item id.
    pub id: u64,
    /// Item title. Comments have none.
    #[serde(default)]
    pub title: Option<String>,
    /// External URL; Ask HN posts have none.
    #[serde(default)]
    pub url: Option<String>,
    /// Submitting user.
    #[serde(default)]
    pub by: Option<String>,
    /// Upvote score.
    #[serde(default)]
    pub score: i64,
    /// Total comment count for the thread.
    #[serde(default)]
    pub descendants: i64,
    /// Direct child comment ids.
    #[serde(default)]
    pub kids: Vec<u64>,
    /// Item kind ("story", "comment", "job", ...).
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    /// Comment body HTML, absent on stories.
    #[serde(default)]
    pub text: Option<String>,
    /// Unix creation time.
    #[serde(default)]
    pub time: Option<i64>,
}

impl Story {
    /// Title with a stable fallback for untitled items.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

/// A user profile as returned by `GET user/{id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Username.
    pub id: String,
    /// Unix account creation time.
    #[serde(default)]
    pub created: Option<i64>,
    /// Accumulated karma.
    #[serde(default)]
    pub karma: i64,
    /// Profile text.
    #[serde(default)]
    pub about: Option<String>,
    /// Item ids submitted by the user.
    #[serde(default)]
    pub submitted: Vec<u64>,
}

/// A comment within a fetched thread, with children resolved up to the
/// requested depth.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    /// Upstream comment id.
    pub id: u64,
    /// Comment author, absent on deleted comments.
    pub by: Option<String>,
    /// Comment body HTML.
    pub text: Option<String>,
    /// Depth below the root story (direct replies are depth 1).
    pub depth: u32,
    /// Nested replies, empty past the depth limit.
    pub children: Vec<CommentNode>,
}
