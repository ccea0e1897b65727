use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Store layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Expected table missing: {table} (run `hn-triage init` first)")]
    SchemaMissing { table: String },

    #[error("Item not found: {story_id}")]
    ItemNotFound { story_id: String },

    #[error("Override decision not found: {decision_id}")]
    DecisionNotFound { decision_id: i64 },

    #[error("Override decision {decision_id} is already resolved")]
    AlreadyResolved { decision_id: i64 },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Upstream feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Item not found: {id}")]
    NotFound { id: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FeedError {
    /// Whether retrying the request could succeed.
    ///
    /// A missing/deleted item is a definitive answer from the upstream and is
    /// never retried; everything else is transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FeedError::NotFound { .. })
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
