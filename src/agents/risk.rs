//! Risk analyzer stage.
//!
//! For each pattern instance, computes a weighted composite of three
//! normalized penalties (low engagement, spam indicators, sentiment
//! variance), clamps it to [0, 1], and bands the result into a fixed
//! mitigation label.

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::store::RawItem;

/// Comment count below which an item is considered under-engaged.
const LOW_ENGAGEMENT_DEFAULT: i64 = 5;

/// URL fragments treated as spam indicators.
const SPAM_URL_FRAGMENTS: &[&str] = &["bit.ly", "tinyurl", "utm_", "ref="];

/// Title phrases treated as spam indicators.
const SPAM_TITLE_TERMS: &[&str] = &["free", "giveaway", "winner", "limited time"];

/// Weights and thresholds driving the risk computation.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub engagement_weight: f64,
    pub spam_weight: f64,
    pub sentiment_weight: f64,
    /// Comment count at which the engagement penalty reaches zero.
    pub low_engagement_threshold: i64,
}

impl RiskConfig {
    /// Derive risk weights from the scoring configuration.
    pub fn from_scoring(scoring: &ScoringConfig) -> Self {
        Self {
            engagement_weight: scoring.engagement_weight,
            spam_weight: scoring.spam_weight,
            sentiment_weight: scoring.sentiment_weight,
            low_engagement_threshold: LOW_ENGAGEMENT_DEFAULT,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            engagement_weight: 0.4,
            spam_weight: 0.35,
            sentiment_weight: 0.25,
            low_engagement_threshold: LOW_ENGAGEMENT_DEFAULT,
        }
    }
}

/// Risk assessment for one pattern instance.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    /// Composite risk in [0, 1].
    pub risk_score: f64,
    /// Low-engagement penalty in [0, 1].
    pub engagement_risk: f64,
    /// Spam-indicator penalty in [0, 1].
    pub spam_risk: f64,
    /// Sentiment-variance penalty in [0, 1].
    pub sentiment_drift: f64,
    /// Banded mitigation label.
    pub mitigation: String,
    /// Human-readable assessment.
    pub reason: String,
}

/// Assess the risk carried by one matched item.
pub fn assess(item: &RawItem, config: &RiskConfig) -> RiskAssessment {
    let engagement_risk = engagement_penalty(item.descendants, config.low_engagement_threshold);
    let spam_risk = spam_penalty(item);
    let sentiment_drift = sentiment_variance_proxy(item);

    let risk_score = (engagement_risk * config.engagement_weight
        + spam_risk * config.spam_weight
        + sentiment_drift * config.sentiment_weight)
        .clamp(0.0, 1.0);

    RiskAssessment {
        risk_score,
        engagement_risk,
        spam_risk,
        sentiment_drift,
        mitigation: mitigation_for(risk_score).to_string(),
        reason: build_reason(engagement_risk, spam_risk, sentiment_drift, item.descendants),
    }
}

/// Linear penalty: zero comments is full risk, the threshold is none.
fn engagement_penalty(comment_count: i64, threshold: i64) -> f64 {
    if threshold <= 0 || comment_count >= threshold {
        return 0.0;
    }
    (1.0 - comment_count.max(0) as f64 / threshold as f64).clamp(0.0, 1.0)
}

/// Deterministic spam heuristic over URL and title.
fn spam_penalty(item: &RawItem) -> f64 {
    let mut score: f64 = 0.0;

    let url_lower = item.url.as_deref().unwrap_or("").to_lowercase();
    for fragment in SPAM_URL_FRAGMENTS {
        if url_lower.contains(fragment) {
            score += 0.4;
        }
    }

    let title_lower = item.title.to_lowercase();
    for term in SPAM_TITLE_TERMS {
        if title_lower.contains(term) {
            score += 0.3;
        }
    }

    let exclamations = item.title.chars().filter(|c| *c == '!').count();
    if exclamations >= 2 {
        score += 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// Variance proxy: heavy discussion relative to score suggests a contested
/// thread.
fn sentiment_variance_proxy(item: &RawItem) -> f64 {
    let ratio = item.descendants.max(0) as f64 / item.score.max(1) as f64;
    (ratio / 3.0).clamp(0.0, 1.0)
}

/// Band the composite score into a fixed mitigation label.
fn mitigation_for(risk_score: f64) -> &'static str {
    if risk_score < 0.4 {
        "monitor"
    } else if risk_score < 0.7 {
        "watch-list"
    } else {
        "auto-defer"
    }
}

fn build_reason(
    engagement_risk: f64,
    spam_risk: f64,
    sentiment_drift: f64,
    comment_count: i64,
) -> String {
    let mut reasons = Vec::new();

    if engagement_risk > 0.7 {
        reasons.push(format!("low engagement ({} comments)", comment_count));
    }
    if spam_risk > 0.6 {
        reasons.push(format!("spam risk ({:.2})", spam_risk));
    }
    if sentiment_drift > 0.7 {
        reasons.push(format!("high sentiment variance ({:.2})", sentiment_drift));
    }

    if reasons.is_empty() {
        "Low overall risk".to_string()
    } else {
        reasons.join("; ")
    }
}
