//! Override gate stage.
//!
//! Decides whether automated processing must halt for an operator. The gate
//! fires when the composite risk reaches the override threshold, or when the
//! item touches a sensitive domain regardless of score. The two conditions
//! are independent boolean gates, never combined multiplicatively.

use serde::Serialize;

/// Pattern domains that always require a human decision.
const SENSITIVE_DOMAINS: &[&str] = &["financial", "security"];

/// Title/URL keywords that mark an item as sensitive even without a matching
/// template domain.
const SENSITIVE_KEYWORDS: &[&str] = &[
    "stock",
    "invest",
    "crypto",
    "ipo",
    "acquisition",
    "vulnerability",
    "exploit",
    "breach",
    "ransomware",
    "cve-",
];

/// Gate verdict for one item.
#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    /// Whether the item must wait for an operator.
    pub requires_override: bool,
    /// Why the gate fired (or did not).
    pub reason: String,
    /// Suggested operator action when the gate fired.
    pub recommendation: Option<String>,
}

/// Evaluate the gate for an item.
///
/// `pattern_domain` is the domain tag of the highest-confidence matched
/// template, if any.
pub fn evaluate(
    title: &str,
    url: Option<&str>,
    risk_score: f64,
    pattern_domain: Option<&str>,
    override_threshold: f64,
) -> GateDecision {
    let risk_gate = risk_score >= override_threshold;
    let domain = sensitive_domain(title, url, pattern_domain);
    let requires_override = risk_gate || domain.is_some();

    if !requires_override {
        return GateDecision {
            requires_override: false,
            reason: format!(
                "Risk score {:.2} within acceptable threshold",
                risk_score
            ),
            recommendation: None,
        };
    }

    let (reason, recommendation) = match domain {
        Some("financial") => (
            "Potential market-impact investment decision".to_string(),
            "Review with CFO before proceeding".to_string(),
        ),
        Some("security") => (
            "Security or privacy-related pattern detected".to_string(),
            "Security review required".to_string(),
        ),
        _ => (
            format!(
                "Risk score {:.2} exceeds override threshold {}",
                risk_score, override_threshold
            ),
            "Manual review recommended".to_string(),
        ),
    };

    GateDecision {
        requires_override: true,
        reason,
        recommendation: Some(recommendation),
    }
}

/// Resolve the sensitive domain for an item, preferring the matched
/// template's tag over keyword inference.
fn sensitive_domain<'a>(
    title: &str,
    url: Option<&str>,
    pattern_domain: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(domain) = pattern_domain {
        if SENSITIVE_DOMAINS.contains(&domain) {
            return Some(domain);
        }
    }

    let haystack = format!(
        "{} {}",
        title.to_lowercase(),
        url.unwrap_or("").to_lowercase()
    );
    for keyword in SENSITIVE_KEYWORDS {
        if haystack.contains(keyword) {
            // Keyword position in the list determines the inferred domain.
            return if matches!(
                *keyword,
                "stock" | "invest" | "crypto" | "ipo" | "acquisition"
            ) {
                Some("financial")
            } else {
                Some("security")
            };
        }
    }

    None
}
