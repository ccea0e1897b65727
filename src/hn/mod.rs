//! Ingestion client for the Hacker News feed.
//!
//! This module provides concurrent, rate-limited, cached access to the feed:
//! - Token-bucket rate limiting shared by every outbound request
//! - A per-run response cache that short-circuits rate limiter and network
//! - Bounded-concurrency batch fetches with isolated per-item failures
//! - Iterative, depth-bounded comment thread traversal

mod cache;
mod client;
mod rate_limit;
mod types;

pub use cache::ResponseCache;
pub use client::HnClient;
pub use rate_limit::RateLimiter;
pub use types::{CommentNode, Story, UserProfile};
