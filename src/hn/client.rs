use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::cache::ResponseCache;
use super::rate_limit::RateLimiter;
use super::types::{CommentNode, Story, UserProfile};
use crate::config::{FeedConfig, FetchConfig};
use crate::error::{FeedError, FeedResult};

/// The upstream never returns more than 500 ranked ids.
const RANKING_CAP: usize = 500;

/// Client for the Hacker News Firebase API
///
/// Every network call goes through the shared rate limiter; the response
/// cache short-circuits both the limiter and the network within a run. Batch
/// fetches fan out across a bounded worker pool.
#[derive(Clone)]
pub struct HnClient {
    client: Client,
    base_url: String,
    fetch_config: FetchConfig,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    workers: Arc<Semaphore>,
}

impl HnClient {
    /// Create a new feed client
    pub fn new(config: &FeedConfig, fetch_config: FetchConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(fetch_config.timeout_ms))
            .build()
            .map_err(FeedError::Http)?;

        let limiter = Arc::new(RateLimiter::new(
            fetch_config.requests_per_second,
            fetch_config.burst_capacity,
        ));
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(
            fetch_config.cache_ttl_secs,
        )));
        let workers = Arc::new(Semaphore::new(fetch_config.concurrency.max(1)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            fetch_config,
            limiter,
            cache,
            workers,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Discard all cached responses. Called at the start of each run so one
    /// pass never observes another's state.
    pub async fn reset(&self) {
        self.cache.clear().await;
        debug!("Response cache cleared");
    }

    /// Fetch the ranked list of top story ids, truncated to `count`.
    pub async fn fetch_ranking(&self, count: usize) -> FeedResult<Vec<u64>> {
        let count = count.min(RANKING_CAP);
        let url = format!("{}/topstories.json", self.base_url);

        info!(count, "Fetching story ranking");

        let value = self
            .get_json(&url)
            .await?
            .ok_or_else(|| FeedError::InvalidResponse {
                message: "ranking endpoint returned null".to_string(),
            })?;

        let mut ids: Vec<u64> =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidResponse {
                message: format!("Failed to parse ranking: {}", e),
            })?;
        ids.truncate(count);

        info!(count = ids.len(), "Story ranking fetched");
        Ok(ids)
    }

    /// Fetch a single item. A missing/deleted item is `FeedError::NotFound`.
    pub async fn fetch_item(&self, id: u64) -> FeedResult<Story> {
        let url = format!("{}/item/{}.json", self.base_url, id);

        let value = self
            .get_json(&url)
            .await?
            .ok_or(FeedError::NotFound { id })?;

        let story: Story =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidResponse {
                message: format!("Failed to parse item {}: {}", id, e),
            })?;

        debug!(id, title = story.title_or_default(), "Item fetched");
        Ok(story)
    }

    /// Fetch many items across the bounded worker pool.
    ///
    /// Every id is attempted exactly once; a failing id never aborts the
    /// batch. Results carry the per-id outcome so callers can report partial
    /// failures.
    pub async fn fetch_batch(&self, ids: &[u64]) -> Vec<(u64, FeedResult<Story>)> {
        info!(count = ids.len(), "Fetching item batch");

        let mut handles = Vec::with_capacity(ids.len());

        for &id in ids {
            let client = self.clone();
            let workers = self.workers.clone();

            let handle = tokio::spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                client.fetch_item(id).await
            });
            handles.push((id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(outcome) => results.push((id, outcome)),
                Err(e) => {
                    // A dead worker still accounts for its id in the report.
                    error!(id, error = %e, "Batch fetch task failed");
                    results.push((
                        id,
                        Err(FeedError::Unavailable {
                            message: format!("fetch task failed: {}", e),
                            retries: 0,
                        }),
                    ));
                }
            }
        }

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        info!(
            succeeded,
            failed = results.len() - succeeded,
            "Batch fetch complete"
        );

        results
    }

    /// Fetch the comment tree below `root_id`, bounded by `max_depth` levels.
    ///
    /// Traversal is iterative with an explicit depth counter and work queue;
    /// missing or malformed comments are skipped, not fatal.
    pub async fn fetch_thread(&self, root_id: u64, max_depth: u32) -> FeedResult<Vec<CommentNode>> {
        info!(root_id, max_depth, "Fetching comment thread");

        let root = self.fetch_item(root_id).await?;
        if max_depth == 0 || root.kids.is_empty() {
            return Ok(Vec::new());
        }

        // One entry per fetched comment: (parent id, comment, depth).
        let mut levels: Vec<Vec<(u64, Story, u32)>> = Vec::new();
        let mut frontier: Vec<(u64, u64)> = root.kids.iter().map(|&kid| (root_id, kid)).collect();
        let mut depth: u32 = 1;

        while !frontier.is_empty() && depth <= max_depth {
            let ids: Vec<u64> = frontier.iter().map(|&(_, id)| id).collect();
            let parent_of: HashMap<u64, u64> = frontier.iter().map(|&(p, id)| (id, p)).collect();

            let mut level = Vec::new();
            let mut next_frontier = Vec::new();

            for (id, result) in self.fetch_batch(&ids).await {
                match result {
                    Ok(comment) => {
                        let parent = parent_of[&id];
                        if depth < max_depth {
                            next_frontier.extend(comment.kids.iter().map(|&kid| (id, kid)));
                        }
                        level.push((parent, comment, depth));
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Skipping unfetchable comment");
                    }
                }
            }

            levels.push(level);
            frontier = next_frontier;
            depth += 1;
        }

        // Assemble bottom-up so each node's children are complete before it
        // is attached to its parent.
        let mut children_of: HashMap<u64, Vec<CommentNode>> = HashMap::new();
        for level in levels.into_iter().rev() {
            for (parent, comment, depth) in level {
                let mut children = children_of.remove(&comment.id).unwrap_or_default();
                // Batch completion order is nondeterministic; restore the
                // upstream's sibling ordering.
                sort_siblings(&mut children, &comment.kids);
                let node = CommentNode {
                    id: comment.id,
                    by: comment.by,
                    text: comment.text,
                    depth,
                    children,
                };
                children_of.entry(parent).or_default().push(node);
            }
        }

        let mut thread = children_of.remove(&root_id).unwrap_or_default();
        sort_siblings(&mut thread, &root.kids);

        info!(root_id, comments = count_nodes(&thread), "Comment thread fetched");
        Ok(thread)
    }

    /// Fetch a user profile. Unknown users resolve to `None`.
    pub async fn fetch_user(&self, username: &str) -> FeedResult<Option<UserProfile>> {
        let url = format!("{}/user/{}.json", self.base_url, username);

        let Some(value) = self.get_json(&url).await? else {
            return Ok(None);
        };

        let user: UserProfile =
            serde_json::from_value(value).map_err(|e| FeedError::InvalidResponse {
                message: format!("Failed to parse user {}: {}", username, e),
            })?;

        debug!(username, "User profile fetched");
        Ok(Some(user))
    }

    /// Cache-checked, retried GET. `None` means the upstream answered with
    /// 404 or a JSON `null` body (how the feed represents deleted items).
    async fn get_json(&self, url: &str) -> FeedResult<Option<serde_json::Value>> {
        if let Some(cached) = self.cache.get(url).await {
            debug!(url, "Cache hit");
            return Ok(Some(cached));
        }

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.fetch_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.fetch_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    url,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying feed request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(url).await {
                Ok(Some(value)) => {
                    self.cache.put(url, value.clone()).await;
                    return Ok(Some(value));
                }
                Ok(None) => return Ok(None),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    error!(
                        url,
                        error = %e,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retry = retries,
                        "Feed request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(FeedError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single rate-limited request (internal)
    async fn execute_request(&self, url: &str) -> FeedResult<Option<serde_json::Value>> {
        self.limiter.acquire().await;

        debug!(url, "Feed request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout {
                    timeout_ms: self.fetch_config.timeout_ms,
                }
            } else {
                FeedError::Http(e)
            }
        })?;

        let status = response.status();

        if status.as_u16() == 404 {
            debug!(url, "Not found");
            return Ok(None);
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let value: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| FeedError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        // The feed answers 200 with a literal `null` for missing items.
        if value.is_null() {
            return Ok(None);
        }

        Ok(Some(value))
    }
}

/// Order a sibling list by the parent's `kids` ordering.
fn sort_siblings(nodes: &mut [CommentNode], order: &[u64]) {
    let position: HashMap<u64, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    nodes.sort_by_key(|n| position.get(&n.id).copied().unwrap_or(usize::MAX));
}

fn count_nodes(nodes: &[CommentNode]) -> usize {
    let mut total = 0;
    let mut stack: Vec<&CommentNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        total += 1;
        stack.extend(node.children.iter());
    }
    total
}
