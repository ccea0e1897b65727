//! # hn-triage
//!
//! A deterministic triage pipeline for the Hacker News feed: concurrent
//! ingestion with bounded concurrency, rate limiting and caching, followed by
//! four ordered scoring stages over persisted state, ending in a
//! human-override gate.
//!
//! ## Features
//!
//! - **Ingestion Client**: rate-limited, cached, bounded-concurrency fetches
//! - **Store**: transactional SQLite persistence; every stage's output is a
//!   table, so any stage can be replayed against captured state
//! - **Ambiguity Detector**: lexical + volume heuristics over titles
//! - **Pattern Miner**: template catalog matching with weighted confidence
//! - **Risk Analyzer**: weighted penalty composite with banded mitigations
//! - **Override Gate**: halts risky or sensitive items for an operator
//!
//! ## Architecture
//!
//! ```text
//! HN Feed (HTTP) → Ingestion Client → SQLite
//!                                       ↓
//!            Ambiguity → Patterns → Risk → Override Gate
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use hn_triage::{Config, Pipeline, RunOptions};
//! use hn_triage::hn::HnClient;
//! use hn_triage::store::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = SqliteStore::open(&config.database).await?;
//!     let client = HnClient::new(&config.feed, config.fetch.clone())?;
//!     let pipeline = Pipeline::new(client, store, config.scoring, config.fetch)?;
//!     let summary = pipeline.run(RunOptions { count: 100, dry_run: false }).await?;
//!     println!("{} items, {} pending override", summary.items_total, summary.pending_overrides);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Stage agents: the four ordered scoring steps.
pub mod agents;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Ingestion client for the Hacker News feed.
pub mod hn;
/// Orchestrator for ingestion + scoring runs.
pub mod pipeline;
/// Read-only weekly report queries.
pub mod report;
/// SQLite store layer for persistence.
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
