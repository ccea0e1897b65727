//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides, and rejects out-of-range scoring values.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use hn_triage::config::{Config, LogFormat};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_defaults() {
    let config = Config::from_env().unwrap();

    assert_eq!(
        config.feed.base_url,
        "https://hacker-news.firebaseio.com/v0"
    );
    assert_eq!(config.scoring.ambiguity_threshold, 0.78);
    assert_eq!(config.scoring.override_threshold, 0.9);
    assert_eq!(config.fetch.concurrency, 8);
}

#[test]
#[serial]
fn test_config_from_env_custom_feed() {
    env::set_var("HN_BASE_URL", "https://mirror.example.com/v0");
    env::set_var("HN_RANKING_COUNT", "25");

    let config = Config::from_env().unwrap();
    assert_eq!(config.feed.base_url, "https://mirror.example.com/v0");
    assert_eq!(config.feed.ranking_count, 25);

    env::remove_var("HN_BASE_URL");
    env::remove_var("HN_RANKING_COUNT");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_custom_fetch() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("FETCH_CONCURRENCY", "16");
    env::set_var("REQUESTS_PER_SECOND", "2.5");

    let config = Config::from_env().unwrap();
    assert_eq!(config.fetch.timeout_ms, 60000);
    assert_eq!(config.fetch.max_retries, 5);
    assert_eq!(config.fetch.concurrency, 16);
    assert_eq!(config.fetch.requests_per_second, 2.5);

    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("FETCH_CONCURRENCY");
    env::remove_var("REQUESTS_PER_SECOND");
}

#[test]
#[serial]
fn test_config_from_env_custom_scoring() {
    env::set_var("AMBIGUITY_THRESHOLD", "0.65");
    env::set_var("OVERRIDE_THRESHOLD", "0.85");

    let config = Config::from_env().unwrap();
    assert_eq!(config.scoring.ambiguity_threshold, 0.65);
    assert_eq!(config.scoring.override_threshold, 0.85);

    env::remove_var("AMBIGUITY_THRESHOLD");
    env::remove_var("OVERRIDE_THRESHOLD");
}

#[test]
#[serial]
fn test_config_rejects_out_of_range_threshold() {
    env::set_var("AMBIGUITY_THRESHOLD", "1.5");

    let result = Config::from_env();
    assert!(result.is_err(), "out-of-range threshold must fail startup");
    let message = result.err().unwrap().to_string();
    assert!(message.contains("AMBIGUITY_THRESHOLD"));

    env::remove_var("AMBIGUITY_THRESHOLD");
}

#[test]
#[serial]
fn test_config_rejects_negative_weight() {
    env::set_var("SPAM_WEIGHT", "-0.2");

    let result = Config::from_env();
    assert!(result.is_err(), "negative weight must fail startup");

    env::remove_var("SPAM_WEIGHT");
}
