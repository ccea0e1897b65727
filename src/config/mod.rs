use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub fetch: FetchConfig,
    pub scoring: ScoringConfig,
}

/// Hacker News API configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub ranking_count: usize,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP fetch configuration: timeouts, retries, concurrency, rate limiting
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Worker pool size for batch fetches.
    pub concurrency: usize,
    /// Token bucket refill rate (requests per second).
    pub requests_per_second: f64,
    /// Token bucket burst capacity.
    pub burst_capacity: u32,
    /// Response cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Overall deadline for one ingestion pass; 0 disables it.
    pub run_timeout_secs: u64,
}

/// Scoring thresholds and risk weights for the stage agents
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Ambiguity score at or above which an item is flagged.
    pub ambiguity_threshold: f64,
    /// Minimum confidence for a pattern template match to be recorded.
    pub min_pattern_confidence: f64,
    /// Risk score at or above which a human override is required.
    pub override_threshold: f64,
    /// Risk weight for the low-engagement penalty.
    pub engagement_weight: f64,
    /// Risk weight for the spam-indicator penalty.
    pub spam_weight: f64,
    /// Risk weight for the sentiment-variance penalty.
    pub sentiment_weight: f64,
    /// Optional path to a pattern template catalog (JSON). Built-in catalog
    /// is used when unset.
    pub patterns_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let feed = FeedConfig {
            base_url: env::var("HN_BASE_URL")
                .unwrap_or_else(|_| "https://hacker-news.firebaseio.com/v0".to_string()),
            ranking_count: env::var("HN_RANKING_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/triage.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let fetch = FetchConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            concurrency: env::var("FETCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            requests_per_second: env::var("REQUESTS_PER_SECOND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10.0),
            burst_capacity: env::var("BURST_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            run_timeout_secs: env::var("RUN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        };

        let scoring = ScoringConfig {
            ambiguity_threshold: env::var("AMBIGUITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.78),
            min_pattern_confidence: env::var("MIN_PATTERN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.5),
            override_threshold: env::var("OVERRIDE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.9),
            engagement_weight: env::var("ENGAGEMENT_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.4),
            spam_weight: env::var("SPAM_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.35),
            sentiment_weight: env::var("SENTIMENT_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.25),
            patterns_path: env::var("PATTERNS_PATH").ok().map(PathBuf::from),
        };

        scoring.validate()?;

        Ok(Config {
            feed,
            database,
            logging,
            fetch,
            scoring,
        })
    }
}

impl ScoringConfig {
    /// Reject thresholds or weights outside [0, 1].
    ///
    /// Out-of-range values are a startup failure, never silently clamped.
    pub fn validate(&self) -> Result<(), AppError> {
        let bounded = [
            ("AMBIGUITY_THRESHOLD", self.ambiguity_threshold),
            ("MIN_PATTERN_CONFIDENCE", self.min_pattern_confidence),
            ("OVERRIDE_THRESHOLD", self.override_threshold),
            ("ENGAGEMENT_WEIGHT", self.engagement_weight),
            ("SPAM_WEIGHT", self.spam_weight),
            ("SENTIMENT_WEIGHT", self.sentiment_weight),
        ];

        for (name, value) in bounded {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(AppError::Config {
                    message: format!("{} must be within [0.0, 1.0], got {}", name, value),
                });
            }
        }

        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
            concurrency: 8,
            requests_per_second: 10.0,
            burst_capacity: 10,
            cache_ttl_secs: 3600,
            run_timeout_secs: 0,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ambiguity_threshold: 0.78,
            min_pattern_confidence: 0.5,
            override_threshold: 0.9,
            engagement_weight: 0.4,
            spam_weight: 0.35,
            sentiment_weight: 0.25,
            patterns_path: None,
        }
    }
}
