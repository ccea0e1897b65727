use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    AmbiguityRecord, FailureMode, NewAmbiguity, NewFailureMode, NewOverride, NewPattern,
    OverrideDecision, OverrideResolution, OverrideStatus, PatternInstance, RawItem, RunRecord,
    Store,
};
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Tables the core expects to exist before it will operate.
const EXPECTED_TABLES: &[&str] = &[
    "raw_items",
    "ambiguity_records",
    "pattern_instances",
    "failure_modes",
    "override_decisions",
    "runs",
];

/// SQLite-backed store implementation
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open an existing database and verify the expected schema is present.
    ///
    /// Schema creation is deliberately not performed here; a missing table is
    /// a fast, descriptive failure instead.
    pub async fn open(config: &DatabaseConfig) -> StoreResult<Self> {
        let store = Self::connect(config, false).await?;
        store.verify_schema().await?;
        Ok(store)
    }

    /// Create the database (if needed) and apply embedded migrations. Backs
    /// the `init` command; the pipeline itself only ever calls [`Self::open`].
    pub async fn init(config: &DatabaseConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = Self::connect(config, true).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory store with schema applied, for tests.
    pub async fn new_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StoreError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        // A pooled second connection would see a different empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn connect(config: &DatabaseConfig, create: bool) -> StoreResult<Self> {
        let database_url = format!("sqlite://{}", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StoreError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(create);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Fail fast if any expected table is absent.
    async fn verify_schema(&self) -> StoreResult<()> {
        for table in EXPECTED_TABLES {
            let found: Option<(String,)> = sqlx::query_as(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(*table)
            .fetch_optional(&self.pool)
            .await?;

            if found.is_none() {
                return Err(StoreError::SchemaMissing {
                    table: (*table).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_raw_item(&self, item: &RawItem) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO raw_items (story_id, title, url, author, score, descendants, fetched_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(story_id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                author = excluded.author,
                score = excluded.score,
                descendants = excluded.descendants,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&item.story_id)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.author)
        .bind(item.score)
        .bind(item.descendants)
        .bind(item.fetched_at.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_raw_item(&self, story_id: &str) -> StoreResult<Option<RawItem>> {
        let row: Option<RawItemRow> = sqlx::query_as(
            r#"
            SELECT story_id, title, url, author, score, descendants, fetched_at
            FROM raw_items
            WHERE story_id = ?
            "#,
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_raw_items(&self) -> StoreResult<Vec<RawItem>> {
        let rows: Vec<RawItemRow> = sqlx::query_as(
            r#"
            SELECT story_id, title, url, author, score, descendants, fetched_at
            FROM raw_items
            ORDER BY fetched_at ASC, story_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn append_ambiguity(&self, record: &NewAmbiguity) -> StoreResult<i64> {
        if let Some(existing) = self
            .ambiguity_for_item(&record.run_id, &record.story_id)
            .await?
        {
            debug!(
                run_id = %record.run_id,
                story_id = %record.story_id,
                "Ambiguity record already present for this run"
            );
            return Ok(existing.id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO ambiguity_records (run_id, story_id, ambiguity_score, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.story_id)
        .bind(record.ambiguity_score)
        .bind(&record.reason)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn ambiguity_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Option<AmbiguityRecord>> {
        let row: Option<AmbiguityRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, ambiguity_score, reason, created_at
            FROM ambiguity_records
            WHERE run_id = ? AND story_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(run_id)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn append_pattern(&self, record: &NewPattern) -> StoreResult<i64> {
        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM pattern_instances
            WHERE run_id = ? AND story_id = ? AND pattern_id = ?
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.story_id)
        .bind(&record.pattern_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = existing {
            debug!(
                run_id = %record.run_id,
                story_id = %record.story_id,
                pattern_id = %record.pattern_id,
                "Pattern instance already present for this run"
            );
            return Ok(id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO pattern_instances (run_id, story_id, pattern_id, confidence, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.story_id)
        .bind(&record.pattern_id)
        .bind(record.confidence)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn patterns_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Vec<PatternInstance>> {
        let rows: Vec<PatternRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, pattern_id, confidence, created_at
            FROM pattern_instances
            WHERE run_id = ? AND story_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(run_id)
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn append_failure_mode(&self, record: &NewFailureMode) -> StoreResult<i64> {
        if let Some(existing) = self
            .failure_mode_for_pattern(record.pattern_instance_id)
            .await?
        {
            debug!(
                pattern_instance_id = record.pattern_instance_id,
                "Failure mode already present"
            );
            return Ok(existing.id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO failure_modes
                (pattern_instance_id, risk_score, engagement_risk, spam_risk, sentiment_drift, mitigation, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.pattern_instance_id)
        .bind(record.risk_score)
        .bind(record.engagement_risk)
        .bind(record.spam_risk)
        .bind(record.sentiment_drift)
        .bind(&record.mitigation)
        .bind(&record.reason)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn failure_mode_for_pattern(
        &self,
        pattern_instance_id: i64,
    ) -> StoreResult<Option<FailureMode>> {
        let row: Option<FailureModeRow> = sqlx::query_as(
            r#"
            SELECT id, pattern_instance_id, risk_score, engagement_risk, spam_risk,
                   sentiment_drift, mitigation, reason, created_at
            FROM failure_modes
            WHERE pattern_instance_id = ?
            "#,
        )
        .bind(pattern_instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn append_override(&self, record: &NewOverride) -> StoreResult<i64> {
        if let Some(existing) = self
            .override_for_item(&record.run_id, &record.story_id)
            .await?
        {
            debug!(
                run_id = %record.run_id,
                story_id = %record.story_id,
                "Override decision already present for this run"
            );
            return Ok(existing.id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO override_decisions
                (run_id, story_id, requires_override, risk_score, reason, recommendation, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(&record.run_id)
        .bind(&record.story_id)
        .bind(record.requires_override)
        .bind(record.risk_score)
        .bind(&record.reason)
        .bind(&record.recommendation)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn override_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Option<OverrideDecision>> {
        let row: Option<OverrideRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, requires_override, risk_score, reason,
                   recommendation, status, operator_id, resolved_at, created_at
            FROM override_decisions
            WHERE run_id = ? AND story_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(run_id)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn pending_overrides(&self) -> StoreResult<Vec<OverrideDecision>> {
        let rows: Vec<OverrideRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, requires_override, risk_score, reason,
                   recommendation, status, operator_id, resolved_at, created_at
            FROM override_decisions
            WHERE status = 'pending' AND requires_override = 1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn resolve_override(
        &self,
        decision_id: i64,
        resolution: OverrideResolution,
        operator_id: &str,
    ) -> StoreResult<()> {
        let status: OverrideStatus = resolution.into();

        let result = sqlx::query(
            r#"
            UPDATE override_decisions
            SET status = ?, operator_id = ?, resolved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.to_string())
        .bind(operator_id)
        .bind(Utc::now().to_rfc3339())
        .bind(decision_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM override_decisions WHERE id = ?")
                    .bind(decision_id)
                    .fetch_optional(&self.pool)
                    .await?;

            return Err(match exists {
                Some(_) => StoreError::AlreadyResolved { decision_id },
                None => StoreError::DecisionNotFound { decision_id },
            });
        }

        info!(decision_id, status = %status, operator = operator_id, "Override resolved");
        Ok(())
    }

    async fn create_run(&self, run: &RunRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, status, started_at, items_total, items_failed)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(run.status.to_string())
        .bind(run.started_at.to_rfc3339())
        .bind(run.items_total)
        .bind(run.items_failed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finish_run(&self, run: &RunRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE runs
            SET status = ?, finished_at = ?, items_total = ?, items_failed = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.to_string())
        .bind(run.finished_at.map(|t| t.to_rfc3339()))
        .bind(run.items_total)
        .bind(run.items_failed)
        .bind(&run.error_message)
        .bind(&run.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn raw_items_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<RawItem>> {
        let rows: Vec<RawItemRow> = sqlx::query_as(
            r#"
            SELECT story_id, title, url, author, score, descendants, fetched_at
            FROM raw_items
            WHERE fetched_at >= ? AND fetched_at < ?
            ORDER BY fetched_at ASC, story_id ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn ambiguity_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AmbiguityRecord>> {
        let rows: Vec<AmbiguityRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, ambiguity_score, reason, created_at
            FROM ambiguity_records
            WHERE created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn patterns_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<PatternInstance>> {
        let rows: Vec<PatternRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, pattern_id, confidence, created_at
            FROM pattern_instances
            WHERE created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn failure_modes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<FailureMode>> {
        let rows: Vec<FailureModeRow> = sqlx::query_as(
            r#"
            SELECT id, pattern_instance_id, risk_score, engagement_risk, spam_risk,
                   sentiment_drift, mitigation, reason, created_at
            FROM failure_modes
            WHERE created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn overrides_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<OverrideDecision>> {
        let rows: Vec<OverrideRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, story_id, requires_override, risk_score, reason,
                   recommendation, status, operator_id, resolved_at, created_at
            FROM override_decisions
            WHERE created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// Internal row types for SQLx mapping

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[derive(sqlx::FromRow)]
struct RawItemRow {
    story_id: String,
    title: String,
    url: Option<String>,
    author: Option<String>,
    score: i64,
    descendants: i64,
    fetched_at: String,
}

impl From<RawItemRow> for RawItem {
    fn from(row: RawItemRow) -> Self {
        Self {
            story_id: row.story_id,
            title: row.title,
            url: row.url,
            author: row.author,
            score: row.score,
            descendants: row.descendants,
            fetched_at: parse_timestamp(&row.fetched_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AmbiguityRow {
    id: i64,
    run_id: String,
    story_id: String,
    ambiguity_score: f64,
    reason: String,
    created_at: String,
}

impl From<AmbiguityRow> for AmbiguityRecord {
    fn from(row: AmbiguityRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            story_id: row.story_id,
            ambiguity_score: row.ambiguity_score,
            reason: row.reason,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: i64,
    run_id: String,
    story_id: String,
    pattern_id: String,
    confidence: f64,
    created_at: String,
}

impl From<PatternRow> for PatternInstance {
    fn from(row: PatternRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            story_id: row.story_id,
            pattern_id: row.pattern_id,
            confidence: row.confidence,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FailureModeRow {
    id: i64,
    pattern_instance_id: i64,
    risk_score: f64,
    engagement_risk: f64,
    spam_risk: f64,
    sentiment_drift: f64,
    mitigation: String,
    reason: String,
    created_at: String,
}

impl From<FailureModeRow> for FailureMode {
    fn from(row: FailureModeRow) -> Self {
        Self {
            id: row.id,
            pattern_instance_id: row.pattern_instance_id,
            risk_score: row.risk_score,
            engagement_risk: row.engagement_risk,
            spam_risk: row.spam_risk,
            sentiment_drift: row.sentiment_drift,
            mitigation: row.mitigation,
            reason: row.reason,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct OverrideRow {
    id: i64,
    run_id: String,
    story_id: String,
    requires_override: bool,
    risk_score: f64,
    reason: String,
    recommendation: Option<String>,
    status: String,
    operator_id: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

impl From<OverrideRow> for OverrideDecision {
    fn from(row: OverrideRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            story_id: row.story_id,
            requires_override: row.requires_override,
            risk_score: row.risk_score,
            reason: row.reason,
            recommendation: row.recommendation,
            status: row.status.parse().unwrap_or_default(),
            operator_id: row.operator_id,
            resolved_at: row.resolved_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}
