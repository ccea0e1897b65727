//! Pattern miner stage.
//!
//! Matches raw items against a read-only catalog of pattern templates. Each
//! template names trigger predicates (keyword containment, numeric
//! thresholds) and per-signal confidence weights; confidence is the weighted
//! combination of matched signals normalized by the total weight, clamped to
//! [0, 1]. An item matching no template is a valid empty result.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::store::RawItem;

/// Trigger predicates for one template. Unset predicates contribute nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConditions {
    /// Keywords matched against the lowercased title.
    #[serde(default)]
    pub title_contains: Vec<String>,
    /// Keywords matched against the lowercased URL.
    #[serde(default)]
    pub url_contains: Vec<String>,
    /// Minimum upvote score for the score signal to fire.
    #[serde(default)]
    pub min_score: Option<i64>,
    /// Minimum comment count for the engagement signal to fire.
    #[serde(default)]
    pub min_comments: Option<i64>,
}

/// Per-signal confidence weights. Missing weights default to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default)]
    pub title_match: f64,
    #[serde(default)]
    pub url_match: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub engagement: f64,
}

/// One read-only pattern template from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTemplate {
    /// Stable identifier recorded on every instance.
    pub id: String,
    /// What the template detects.
    pub description: String,
    /// Domain tag consumed by the override gate ("financial", "security", ...).
    #[serde(default)]
    pub domain: Option<String>,
    /// Trigger predicates.
    #[serde(default)]
    pub trigger_conditions: TriggerConditions,
    /// Per-signal confidence weights.
    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,
}

/// The template catalog, loaded once per run and treated as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCatalog {
    patterns: Vec<PatternTemplate>,
}

impl PatternCatalog {
    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("Failed to read pattern catalog {}: {}", path.display(), e),
        })?;

        let catalog: PatternCatalog =
            serde_json::from_str(&raw).map_err(|e| AppError::Config {
                message: format!("Failed to parse pattern catalog {}: {}", path.display(), e),
            })?;

        info!(
            path = %path.display(),
            patterns = catalog.patterns.len(),
            "Pattern catalog loaded"
        );
        Ok(catalog)
    }

    /// The built-in catalog used when no file is configured.
    pub fn builtin() -> Self {
        Self {
            patterns: vec![
                PatternTemplate {
                    id: "clickbait_title".to_string(),
                    description: "Sensationalized title engineered for clicks".to_string(),
                    domain: Some("editorial".to_string()),
                    trigger_conditions: TriggerConditions {
                        title_contains: vec![
                            "you won't believe".to_string(),
                            "shocking".to_string(),
                            "unbelievable".to_string(),
                            "this one".to_string(),
                        ],
                        ..TriggerConditions::default()
                    },
                    confidence_weights: ConfidenceWeights {
                        title_match: 0.7,
                        engagement: 0.3,
                        ..ConfidenceWeights::default()
                    },
                },
                PatternTemplate {
                    id: "financial_speculation".to_string(),
                    description: "Market-moving or investment-adjacent content".to_string(),
                    domain: Some("financial".to_string()),
                    trigger_conditions: TriggerConditions {
                        title_contains: vec![
                            "stock".to_string(),
                            "crypto".to_string(),
                            "ipo".to_string(),
                            "acquisition".to_string(),
                            "funding".to_string(),
                        ],
                        min_score: Some(50),
                        ..TriggerConditions::default()
                    },
                    confidence_weights: ConfidenceWeights {
                        title_match: 0.6,
                        score: 0.4,
                        ..ConfidenceWeights::default()
                    },
                },
                PatternTemplate {
                    id: "security_incident".to_string(),
                    description: "Vulnerability disclosure or active incident".to_string(),
                    domain: Some("security".to_string()),
                    trigger_conditions: TriggerConditions {
                        title_contains: vec![
                            "vulnerability".to_string(),
                            "exploit".to_string(),
                            "breach".to_string(),
                            "cve".to_string(),
                            "ransomware".to_string(),
                        ],
                        url_contains: vec!["security".to_string(), "advisory".to_string()],
                        ..TriggerConditions::default()
                    },
                    confidence_weights: ConfidenceWeights {
                        title_match: 0.5,
                        url_match: 0.5,
                        ..ConfidenceWeights::default()
                    },
                },
                PatternTemplate {
                    id: "contested_discussion".to_string(),
                    description: "Thread drawing unusually heavy discussion".to_string(),
                    domain: None,
                    trigger_conditions: TriggerConditions {
                        min_comments: Some(200),
                        min_score: Some(100),
                        ..TriggerConditions::default()
                    },
                    confidence_weights: ConfidenceWeights {
                        engagement: 0.6,
                        score: 0.4,
                        ..ConfidenceWeights::default()
                    },
                },
            ],
        }
    }

    /// All templates.
    pub fn templates(&self) -> &[PatternTemplate] {
        &self.patterns
    }

    /// Look up a template by id.
    pub fn get(&self, pattern_id: &str) -> Option<&PatternTemplate> {
        self.patterns.iter().find(|p| p.id == pattern_id)
    }
}

/// A template matched against a concrete item.
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    /// Matched template id.
    pub pattern_id: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// Match `item` against every template, keeping matches at or above
/// `min_confidence`, ordered by confidence descending (ties by template id).
pub fn mine(item: &RawItem, catalog: &PatternCatalog, min_confidence: f64) -> Vec<PatternMatch> {
    let mut matches: Vec<PatternMatch> = catalog
        .templates()
        .iter()
        .filter_map(|template| {
            let confidence = confidence_for(item, template);
            if confidence >= min_confidence {
                debug!(
                    story_id = %item.story_id,
                    pattern_id = %template.id,
                    confidence,
                    "Pattern matched"
                );
                Some(PatternMatch {
                    pattern_id: template.id.clone(),
                    confidence,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .expect("confidence is finite")
            .then_with(|| a.pattern_id.cmp(&b.pattern_id))
    });

    matches
}

/// Weighted, normalized confidence for one template against one item.
fn confidence_for(item: &RawItem, template: &PatternTemplate) -> f64 {
    let trigger = &template.trigger_conditions;
    let weights = &template.confidence_weights;
    let title_lower = item.title.to_lowercase();
    let url_lower = item.url.as_deref().unwrap_or("").to_lowercase();

    // Fixed evaluation order keeps the floating-point sum bit-stable.
    let mut signals: Vec<(f64, f64)> = Vec::with_capacity(4);

    if !trigger.title_contains.is_empty() {
        signals.push((
            keyword_ratio(&title_lower, &trigger.title_contains),
            weights.title_match,
        ));
    }
    if !trigger.url_contains.is_empty() {
        signals.push((
            keyword_ratio(&url_lower, &trigger.url_contains),
            weights.url_match,
        ));
    }
    if let Some(min_score) = trigger.min_score {
        let fired = if item.score >= min_score { 1.0 } else { 0.0 };
        signals.push((fired, weights.score));
    }
    if let Some(min_comments) = trigger.min_comments {
        let fired = if item.descendants >= min_comments {
            1.0
        } else {
            0.0
        };
        signals.push((fired, weights.engagement));
    }

    let weight_sum: f64 = signals.iter().map(|(_, w)| w).sum();
    if weight_sum <= 0.0 {
        if !signals.is_empty() {
            warn!(pattern_id = %template.id, "Template has triggers but zero total weight");
        }
        return 0.0;
    }

    let weighted_sum: f64 = signals.iter().map(|(value, w)| value * w).sum();
    (weighted_sum / weight_sum).clamp(0.0, 1.0)
}

/// Fraction of keywords found in `text`.
fn keyword_ratio(text: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let matched = keywords
        .iter()
        .filter(|kw| text.contains(kw.to_lowercase().as_str()))
        .count();
    (matched as f64 / keywords.len() as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str, url: Option<&str>, score: i64, descendants: i64) -> RawItem {
        RawItem {
            story_id: "101".to_string(),
            title: title.to_string(),
            url: url.map(String::from),
            author: Some("tester".to_string()),
            score,
            descendants,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_clickbait_item_matches_builtin_template() {
        let catalog = PatternCatalog::builtin();
        let item = item("You won't believe this!!", None, 10, 80);

        let matches = mine(&item, &catalog, 0.1);

        assert!(matches.iter().any(|m| m.pattern_id == "clickbait_title"));
        let hit = matches
            .iter()
            .find(|m| m.pattern_id == "clickbait_title")
            .unwrap();
        assert!(hit.confidence > 0.0);
    }

    #[test]
    fn test_ordinary_item_matches_nothing() {
        let catalog = PatternCatalog::builtin();
        let item = item("A quiet infrastructure writeup", None, 12, 3);

        let matches = mine(&item, &catalog, 0.5);
        assert!(matches.is_empty(), "zero matches is a valid outcome");
    }

    #[test]
    fn test_multiple_templates_can_match_independently() {
        let catalog = PatternCatalog::builtin();
        let item = item(
            "Shocking crypto exchange breach",
            Some("https://security.example.com/advisory/1"),
            300,
            400,
        );

        let matches = mine(&item, &catalog, 0.2);
        assert!(matches.len() >= 2);
    }

    #[test]
    fn test_matches_sorted_by_confidence() {
        let catalog = PatternCatalog::builtin();
        let item = item(
            "Shocking crypto exchange breach",
            Some("https://security.example.com/advisory/1"),
            300,
            400,
        );

        let matches = mine(&item, &catalog, 0.0);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_confidence_clamped_and_normalized() {
        let template = PatternTemplate {
            id: "t".to_string(),
            description: String::new(),
            domain: None,
            trigger_conditions: TriggerConditions {
                title_contains: vec!["rust".to_string()],
                min_score: Some(1),
                ..TriggerConditions::default()
            },
            confidence_weights: ConfidenceWeights {
                title_match: 0.5,
                score: 0.5,
                ..ConfidenceWeights::default()
            },
        };
        let catalog = PatternCatalog {
            patterns: vec![template],
        };
        let item = item("Rust in production", None, 100, 0);

        let matches = mine(&item, &catalog, 0.0);
        assert_eq!(matches.len(), 1);
        assert!((matches[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_template_never_matches() {
        let template = PatternTemplate {
            id: "t".to_string(),
            description: String::new(),
            domain: None,
            trigger_conditions: TriggerConditions {
                title_contains: vec!["rust".to_string()],
                ..TriggerConditions::default()
            },
            confidence_weights: ConfidenceWeights::default(),
        };
        let catalog = PatternCatalog {
            patterns: vec![template],
        };
        let item = item("Rust in production", None, 100, 0);

        assert!(mine(&item, &catalog, 0.1).is_empty());
    }

    #[test]
    fn test_catalog_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "patterns": [
                {
                    "id": "minimal",
                    "description": "only required fields"
                }
            ]
        }"#;
        let catalog: PatternCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.templates().len(), 1);
        assert!(catalog.get("minimal").is_some());
    }

    #[test]
    fn test_determinism() {
        let catalog = PatternCatalog::builtin();
        let item = item("Shocking crypto breach", None, 100, 250);

        let a = mine(&item, &catalog, 0.1);
        let b = mine(&item, &catalog, 0.1);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.pattern_id, y.pattern_id);
            assert_eq!(x.confidence.to_bits(), y.confidence.to_bits());
        }
    }
}
