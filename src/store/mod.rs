//! Store layer: durable, transactional persistence for raw items and every
//! stage's output.
//!
//! The store is the single source of truth between pipeline stages: each
//! stage reads its predecessor's persisted records and writes its own, so any
//! stage can be re-run in isolation against captured state. All mutation goes
//! through the entry points on [`Store`]; appends are idempotent under
//! per-run retry and reads iterate in creation order.

mod sqlite;


pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A raw feed item, immutable once written; re-fetches upsert by `story_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Upstream story id (unique).
    pub story_id: String,
    /// Story title.
    pub title: String,
    /// External URL, if any.
    pub url: Option<String>,
    /// Submitting user.
    pub author: Option<String>,
    /// Upvote score at fetch time.
    pub score: i64,
    /// Comment count at fetch time.
    pub descendants: i64,
    /// When this snapshot was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// Ambiguity detector output for one item in one run. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguityRecord {
    /// Row id.
    pub id: i64,
    /// Run that produced the record.
    pub run_id: String,
    /// Scored item.
    pub story_id: String,
    /// Composite ambiguity score in [0, 1].
    pub ambiguity_score: f64,
    /// Which sub-signal dominated, in plain language.
    pub reason: String,
    /// When the record was produced.
    pub created_at: DateTime<Utc>,
}

/// A matched pattern template instance. Zero or many per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternInstance {
    /// Row id.
    pub id: i64,
    /// Run that produced the instance.
    pub run_id: String,
    /// Matched item.
    pub story_id: String,
    /// Template identifier from the catalog.
    pub pattern_id: String,
    /// Match confidence in [0, 1].
    pub confidence: f64,
    /// When the instance was recorded.
    pub created_at: DateTime<Utc>,
}

/// Risk analyzer output. Exactly one per pattern instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMode {
    /// Row id.
    pub id: i64,
    /// The analyzed pattern instance.
    pub pattern_instance_id: i64,
    /// Composite risk score in [0, 1].
    pub risk_score: f64,
    /// Low-engagement penalty component.
    pub engagement_risk: f64,
    /// Spam-indicator penalty component.
    pub spam_risk: f64,
    /// Sentiment-variance penalty component.
    pub sentiment_drift: f64,
    /// Banded mitigation label ("monitor", "watch-list", "auto-defer").
    pub mitigation: String,
    /// Human-readable assessment.
    pub reason: String,
    /// When the assessment was produced.
    pub created_at: DateTime<Utc>,
}

/// Override gate decision for one item in one run.
///
/// `status` starts [`OverrideStatus::Pending`] and transitions to a terminal
/// value exactly once; rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideDecision {
    /// Row id.
    pub id: i64,
    /// Run that produced the decision.
    pub run_id: String,
    /// Gated item.
    pub story_id: String,
    /// Whether automated progress is halted pending an operator.
    pub requires_override: bool,
    /// Risk score that drove the decision.
    pub risk_score: f64,
    /// Why the gate fired (or did not).
    pub reason: String,
    /// Suggested operator action.
    pub recommendation: Option<String>,
    /// Current resolution state.
    pub status: OverrideStatus,
    /// Operator who resolved the decision.
    pub operator_id: Option<String>,
    /// When the decision was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the decision was created.
    pub created_at: DateTime<Utc>,
}

/// Resolution state of an override decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideStatus {
    /// Waiting for an operator.
    #[default]
    Pending,
    /// Operator accepted the item.
    Accepted,
    /// Operator rejected the item.
    Rejected,
    /// Operator escalated the item.
    Escalated,
}

impl OverrideStatus {
    /// Whether this state can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OverrideStatus::Pending)
    }
}

impl std::fmt::Display for OverrideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverrideStatus::Pending => write!(f, "pending"),
            OverrideStatus::Accepted => write!(f, "accepted"),
            OverrideStatus::Rejected => write!(f, "rejected"),
            OverrideStatus::Escalated => write!(f, "escalated"),
        }
    }
}

impl std::str::FromStr for OverrideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OverrideStatus::Pending),
            "accepted" => Ok(OverrideStatus::Accepted),
            "rejected" => Ok(OverrideStatus::Rejected),
            "escalated" => Ok(OverrideStatus::Escalated),
            _ => Err(format!("Unknown override status: {}", s)),
        }
    }
}

/// Terminal resolution applied by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideResolution {
    /// Accept the item.
    Accepted,
    /// Reject the item.
    Rejected,
    /// Escalate the item.
    Escalated,
}

impl From<OverrideResolution> for OverrideStatus {
    fn from(resolution: OverrideResolution) -> Self {
        match resolution {
            OverrideResolution::Accepted => OverrideStatus::Accepted,
            OverrideResolution::Rejected => OverrideStatus::Rejected,
            OverrideResolution::Escalated => OverrideStatus::Escalated,
        }
    }
}

/// State of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress.
    Running,
    /// Run finished; per-item failures may still be recorded.
    Completed,
    /// Run aborted before completing.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Bookkeeping row for one ingestion + scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id (UUID).
    pub id: String,
    /// Current state.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has.
    pub finished_at: Option<DateTime<Utc>>,
    /// Items attempted.
    pub items_total: i64,
    /// Items that failed a fetch or stage.
    pub items_failed: i64,
    /// Run-level error, if the run aborted.
    pub error_message: Option<String>,
}

/// Draft ambiguity record for appending.
#[derive(Debug, Clone)]
pub struct NewAmbiguity {
    pub run_id: String,
    pub story_id: String,
    pub ambiguity_score: f64,
    pub reason: String,
}

/// Draft pattern instance for appending.
#[derive(Debug, Clone)]
pub struct NewPattern {
    pub run_id: String,
    pub story_id: String,
    pub pattern_id: String,
    pub confidence: f64,
}

/// Draft failure mode for appending.
#[derive(Debug, Clone)]
pub struct NewFailureMode {
    pub pattern_instance_id: i64,
    pub risk_score: f64,
    pub engagement_risk: f64,
    pub spam_risk: f64,
    pub sentiment_drift: f64,
    pub mitigation: String,
    pub reason: String,
}

/// Draft override decision for appending.
#[derive(Debug, Clone)]
pub struct NewOverride {
    pub run_id: String,
    pub story_id: String,
    pub requires_override: bool,
    pub risk_score: f64,
    pub reason: String,
    pub recommendation: Option<String>,
}

/// Transactional persistence contract for the pipeline.
///
/// Every append is idempotent under (run, item) retry: a prior record for the
/// same run short-circuits to the existing row id instead of duplicating.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update a raw item by `story_id`. Never duplicates.
    async fn upsert_raw_item(&self, item: &RawItem) -> StoreResult<()>;

    /// Fetch one raw item.
    async fn get_raw_item(&self, story_id: &str) -> StoreResult<Option<RawItem>>;

    /// All raw items, ordered by fetch time then story id.
    async fn list_raw_items(&self) -> StoreResult<Vec<RawItem>>;

    /// Append an ambiguity record; returns the row id.
    async fn append_ambiguity(&self, record: &NewAmbiguity) -> StoreResult<i64>;

    /// Current ambiguity record for an item within a run.
    async fn ambiguity_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Option<AmbiguityRecord>>;

    /// Append a pattern instance; returns the row id.
    async fn append_pattern(&self, record: &NewPattern) -> StoreResult<i64>;

    /// Pattern instances recorded for an item within a run.
    async fn patterns_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Vec<PatternInstance>>;

    /// Append a failure mode; returns the row id.
    async fn append_failure_mode(&self, record: &NewFailureMode) -> StoreResult<i64>;

    /// The failure mode for a pattern instance, if assessed.
    async fn failure_mode_for_pattern(
        &self,
        pattern_instance_id: i64,
    ) -> StoreResult<Option<FailureMode>>;

    /// Append an override decision; returns the row id.
    async fn append_override(&self, record: &NewOverride) -> StoreResult<i64>;

    /// Override decision for an item within a run.
    async fn override_for_item(
        &self,
        run_id: &str,
        story_id: &str,
    ) -> StoreResult<Option<OverrideDecision>>;

    /// All unresolved override decisions, oldest first.
    async fn pending_overrides(&self) -> StoreResult<Vec<OverrideDecision>>;

    /// Resolve a pending override exactly once.
    ///
    /// Fails with [`crate::error::StoreError::AlreadyResolved`] if the
    /// decision already left `pending`; the stored row is unchanged.
    async fn resolve_override(
        &self,
        decision_id: i64,
        resolution: OverrideResolution,
        operator_id: &str,
    ) -> StoreResult<()>;

    /// Record the start of a run.
    async fn create_run(&self, run: &RunRecord) -> StoreResult<()>;

    /// Record a run's terminal state and counters.
    async fn finish_run(&self, run: &RunRecord) -> StoreResult<()>;

    /// Raw items fetched within [start, end), creation order.
    async fn raw_items_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<RawItem>>;

    /// Ambiguity records created within [start, end), creation order.
    async fn ambiguity_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AmbiguityRecord>>;

    /// Pattern instances created within [start, end), creation order.
    async fn patterns_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<PatternInstance>>;

    /// Failure modes created within [start, end), creation order.
    async fn failure_modes_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<FailureMode>>;

    /// Override decisions created within [start, end), creation order.
    async fn overrides_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<OverrideDecision>>;
}
