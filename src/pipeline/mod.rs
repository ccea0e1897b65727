//! Orchestrator for one ingestion + scoring run.
//!
//! Drives a single pass: fetch the ranking, fan out item fetches, persist raw
//! items, then execute the four stage agents per item in fixed order. Every
//! stage's record is committed before the next stage reads it; per-item
//! failures are recorded and exclude the item from later stages without
//! aborting the run. Dry-run mode executes every stage but suppresses all
//! writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{ambiguity, override_gate, patterns, risk, ItemState};
use crate::agents::patterns::PatternCatalog;
use crate::agents::risk::RiskConfig;
use crate::config::{FetchConfig, ScoringConfig};
use crate::error::{AppError, AppResult, FeedError};
use crate::hn::{HnClient, Story};
use crate::store::{
    NewAmbiguity, NewFailureMode, NewOverride, NewPattern, RawItem, RunRecord, RunStatus, Store,
};

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How many ranked items to ingest.
    pub count: usize,
    /// Execute every stage but write nothing.
    pub dry_run: bool,
}

/// Explicit per-run context threaded through the pipeline, so concurrent
/// runs (e.g. in tests) never share ambient state.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Whether writes are suppressed.
    pub dry_run: bool,
}

impl RunContext {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            dry_run,
        }
    }
}

/// Outcome for one item within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    /// Upstream story id.
    pub story_id: String,
    /// Final state the item reached.
    pub state: ItemState,
    /// Ambiguity score, when the stage ran.
    pub ambiguity_score: Option<f64>,
    /// Whether the ambiguity detector flagged the item.
    pub flagged: bool,
    /// Number of matched pattern instances.
    pub pattern_count: usize,
    /// Highest risk score across the item's pattern instances.
    pub max_risk: Option<f64>,
    /// Whether the override gate halted the item.
    pub requires_override: bool,
    /// Failure reason, when the item failed.
    pub error: Option<String>,
}

/// Summary of one run; nothing fails silently.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Items attempted.
    pub items_total: usize,
    /// Items that failed a fetch or stage.
    pub items_failed: usize,
    /// Items flagged by the ambiguity detector.
    pub items_flagged: usize,
    /// Items halted at the override gate.
    pub pending_overrides: usize,
    /// Items that cleared the gate.
    pub auto_cleared: usize,
    /// Per-item outcomes, in ranking order.
    pub outcomes: Vec<ItemOutcome>,
}

/// The orchestrator. Generic over [`Store`] so runs can execute against any
/// persistence backend.
pub struct Pipeline<S: Store> {
    client: HnClient,
    store: S,
    scoring: ScoringConfig,
    fetch: FetchConfig,
    catalog: PatternCatalog,
}

impl<S: Store> Pipeline<S> {
    /// Assemble a pipeline from its collaborators. The catalog is loaded
    /// once here and treated as immutable for the lifetime of the pipeline.
    pub fn new(
        client: HnClient,
        store: S,
        scoring: ScoringConfig,
        fetch: FetchConfig,
    ) -> AppResult<Self> {
        let catalog = match &scoring.patterns_path {
            Some(path) => PatternCatalog::load(path)?,
            None => PatternCatalog::builtin(),
        };

        Ok(Self {
            client,
            store,
            scoring,
            fetch,
            catalog,
        })
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one run.
    pub async fn run(&self, options: RunOptions) -> AppResult<RunSummary> {
        let ctx = RunContext::new(options.dry_run);

        info!(
            run_id = %ctx.run_id,
            count = options.count,
            dry_run = ctx.dry_run,
            "Run started"
        );

        // The cache is scoped to a single pass.
        self.client.reset().await;

        if !ctx.dry_run {
            self.store
                .create_run(&RunRecord {
                    id: ctx.run_id.clone(),
                    status: RunStatus::Running,
                    started_at: ctx.started_at,
                    finished_at: None,
                    items_total: 0,
                    items_failed: 0,
                    error_message: None,
                })
                .await?;
        }

        let fetched = match self.ingest(options.count).await {
            Ok(fetched) => fetched,
            Err(e) => {
                // Run-level failure: nothing to score, surface the error.
                error!(run_id = %ctx.run_id, error = %e, "Run aborted during ingestion");
                if !ctx.dry_run {
                    self.store
                        .finish_run(&RunRecord {
                            id: ctx.run_id.clone(),
                            status: RunStatus::Failed,
                            started_at: ctx.started_at,
                            finished_at: Some(Utc::now()),
                            items_total: 0,
                            items_failed: 0,
                            error_message: Some(e.to_string()),
                        })
                        .await?;
                }
                return Err(e);
            }
        };

        let mut outcomes = Vec::with_capacity(fetched.len());

        for (id, result) in fetched {
            let story_id = id.to_string();
            let outcome = match result {
                Ok(story) => match self.process_item(&ctx, story).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(run_id = %ctx.run_id, story_id = %story_id, error = %e, "Stage failed");
                        failed_outcome(story_id, format!("stage failure: {}", e))
                    }
                },
                Err(e) => {
                    warn!(run_id = %ctx.run_id, story_id = %story_id, error = %e, "Fetch failed");
                    failed_outcome(story_id, format!("fetch failure: {}", e))
                }
            };
            outcomes.push(outcome);
        }

        let summary = summarize(&ctx, outcomes);

        if !ctx.dry_run {
            self.store
                .finish_run(&RunRecord {
                    id: ctx.run_id.clone(),
                    status: RunStatus::Completed,
                    started_at: ctx.started_at,
                    finished_at: Some(Utc::now()),
                    items_total: summary.items_total as i64,
                    items_failed: summary.items_failed as i64,
                    error_message: None,
                })
                .await?;
        }

        info!(
            run_id = %summary.run_id,
            items_total = summary.items_total,
            items_failed = summary.items_failed,
            pending_overrides = summary.pending_overrides,
            "Run complete"
        );

        Ok(summary)
    }

    /// Fetch the ranking and fan out item fetches, under the run-level
    /// timeout when one is configured.
    async fn ingest(&self, count: usize) -> AppResult<Vec<(u64, Result<Story, FeedError>)>> {
        let fetch_all = async {
            let ids = self.client.fetch_ranking(count).await?;
            Ok::<_, FeedError>(self.client.fetch_batch(&ids).await)
        };

        let result = if self.fetch.run_timeout_secs > 0 {
            let deadline = Duration::from_secs(self.fetch.run_timeout_secs);
            match tokio::time::timeout(deadline, fetch_all).await {
                Ok(result) => result,
                Err(_) => {
                    // Aborted mid-flight: drop any cache entries the dead
                    // fetches populated so a retry starts clean.
                    self.client.reset().await;
                    Err(FeedError::Timeout {
                        timeout_ms: self.fetch.run_timeout_secs * 1000,
                    })
                }
            }
        } else {
            fetch_all.await
        };

        result.map_err(AppError::from)
    }

    /// Run the four stages for one fetched item, committing after each stage.
    async fn process_item(&self, ctx: &RunContext, story: Story) -> AppResult<ItemOutcome> {
        let story_id = story.id.to_string();
        let item = RawItem {
            story_id: story_id.clone(),
            title: story.title_or_default().to_string(),
            url: story.url.clone(),
            author: story.by.clone(),
            score: story.score,
            descendants: story.descendants,
            fetched_at: Utc::now(),
        };

        // The raw item must be committed before any stage reads it.
        if !ctx.dry_run {
            self.store.upsert_raw_item(&item).await?;
        }

        // Stage 1: ambiguity detector.
        let assessment =
            ambiguity::assess(&item.title, item.descendants, self.scoring.ambiguity_threshold);
        if !ctx.dry_run {
            self.store
                .append_ambiguity(&NewAmbiguity {
                    run_id: ctx.run_id.clone(),
                    story_id: story_id.clone(),
                    ambiguity_score: assessment.score,
                    reason: assessment.reason.clone(),
                })
                .await?;
        }

        // Stage 2: pattern miner.
        let matches = patterns::mine(&item, &self.catalog, self.scoring.min_pattern_confidence);

        // Stage 3: risk analyzer, one failure mode per pattern instance.
        let risk_config = RiskConfig::from_scoring(&self.scoring);
        let mut max_risk: Option<f64> = None;
        let mut top_domain: Option<String> = None;

        for matched in &matches {
            let instance_id = if !ctx.dry_run {
                self.store
                    .append_pattern(&NewPattern {
                        run_id: ctx.run_id.clone(),
                        story_id: story_id.clone(),
                        pattern_id: matched.pattern_id.clone(),
                        confidence: matched.confidence,
                    })
                    .await?
            } else {
                0
            };

            let assessment = risk::assess(&item, &risk_config);
            if !ctx.dry_run {
                self.store
                    .append_failure_mode(&NewFailureMode {
                        pattern_instance_id: instance_id,
                        risk_score: assessment.risk_score,
                        engagement_risk: assessment.engagement_risk,
                        spam_risk: assessment.spam_risk,
                        sentiment_drift: assessment.sentiment_drift,
                        mitigation: assessment.mitigation.clone(),
                        reason: assessment.reason.clone(),
                    })
                    .await?;
            }

            if max_risk.map_or(true, |current| assessment.risk_score > current) {
                max_risk = Some(assessment.risk_score);
            }
        }

        // Matches are ordered by confidence; the top one names the domain.
        if let Some(first) = matches.first() {
            top_domain = self
                .catalog
                .get(&first.pattern_id)
                .and_then(|t| t.domain.clone());
        }

        // Stage 4: override gate.
        let decision = override_gate::evaluate(
            &item.title,
            item.url.as_deref(),
            max_risk.unwrap_or(0.0),
            top_domain.as_deref(),
            self.scoring.override_threshold,
        );

        let state = if decision.requires_override {
            if !ctx.dry_run {
                self.store
                    .append_override(&NewOverride {
                        run_id: ctx.run_id.clone(),
                        story_id: story_id.clone(),
                        requires_override: true,
                        risk_score: max_risk.unwrap_or(0.0),
                        reason: decision.reason.clone(),
                        recommendation: decision.recommendation.clone(),
                    })
                    .await?;
            }
            ItemState::PendingOverride
        } else {
            ItemState::AutoCleared
        };

        Ok(ItemOutcome {
            story_id,
            state,
            ambiguity_score: Some(assessment.score),
            flagged: assessment.flagged,
            pattern_count: matches.len(),
            max_risk,
            requires_override: decision.requires_override,
            error: None,
        })
    }
}

fn failed_outcome(story_id: String, error: String) -> ItemOutcome {
    ItemOutcome {
        story_id,
        state: ItemState::Failed,
        ambiguity_score: None,
        flagged: false,
        pattern_count: 0,
        max_risk: None,
        requires_override: false,
        error: Some(error),
    }
}

fn summarize(ctx: &RunContext, outcomes: Vec<ItemOutcome>) -> RunSummary {
    RunSummary {
        run_id: ctx.run_id.clone(),
        dry_run: ctx.dry_run,
        items_total: outcomes.len(),
        items_failed: outcomes
            .iter()
            .filter(|o| o.state == ItemState::Failed)
            .count(),
        items_flagged: outcomes.iter().filter(|o| o.flagged).count(),
        pending_overrides: outcomes
            .iter()
            .filter(|o| o.state == ItemState::PendingOverride)
            .count(),
        auto_cleared: outcomes
            .iter()
            .filter(|o| o.state == ItemState::AutoCleared)
            .count(),
        outcomes,
    }
}
