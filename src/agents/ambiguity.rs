//! Ambiguity detector stage.
//!
//! Scores how open to interpretation an item's presentation is, from lexical
//! heuristics over the title plus a comment-volume controversy proxy. The
//! computation is a pure function of its inputs: identical item and threshold
//! always produce the identical score and reason.

use serde::Serialize;

/// Clickbait phrases matched against the lowercased title.
const CLICKBAIT_TERMS: &[&str] = &["shocking", "you won't believe", "this one", "unbelievable"];

/// Comment count at which the volume proxy saturates.
const VOLUME_SATURATION: i64 = 100;

/// Outcome of scoring one item.
#[derive(Debug, Clone, Serialize)]
pub struct AmbiguityAssessment {
    /// Composite score in [0, 1].
    pub score: f64,
    /// Which sub-signal dominated, in plain language.
    pub reason: String,
    /// Whether the score reached the configured threshold.
    pub flagged: bool,
}

/// Score an item's title and comment volume against `threshold`.
pub fn assess(title: &str, comment_count: i64, threshold: f64) -> AmbiguityAssessment {
    let signals = compute_signals(title, comment_count);
    let score = signals.total();

    AmbiguityAssessment {
        score,
        reason: signals.dominant_reason(score),
        flagged: score >= threshold,
    }
}

/// Individual sub-signal contributions, kept separate so the reason string
/// can name the dominant one.
struct Signals {
    clickbait: f64,
    punctuation: f64,
    casing: f64,
    volume: f64,
}

fn compute_signals(title: &str, comment_count: i64) -> Signals {
    let title_lower = title.to_lowercase();

    // Presence matters more than repetition: the first matched phrase
    // carries most of the weight.
    let matched_terms = CLICKBAIT_TERMS
        .iter()
        .filter(|term| title_lower.contains(*term))
        .count();
    let clickbait = match matched_terms {
        0 => 0.0,
        n => (0.5 + 0.1 * (n as f64 - 1.0)).min(0.7),
    };

    let marks = title.chars().filter(|c| *c == '?' || *c == '!').count();
    let words = title.split_whitespace().count().max(1);
    let punctuation = if marks as f64 / words as f64 > 0.25 {
        0.2
    } else if marks > 0 {
        0.1
    } else {
        0.0
    };

    let letters: Vec<char> = title.chars().filter(|c| c.is_alphabetic()).collect();
    let uppercase = letters.iter().filter(|c| c.is_uppercase()).count();
    let casing = if !letters.is_empty() && uppercase == letters.len() {
        0.15
    } else if uppercase as f64 > title.chars().count() as f64 * 0.4 {
        0.1
    } else {
        0.0
    };

    let volume = (comment_count.clamp(0, VOLUME_SATURATION) as f64
        / VOLUME_SATURATION as f64)
        * 0.15;

    Signals {
        clickbait,
        punctuation,
        casing,
        volume,
    }
}

impl Signals {
    fn total(&self) -> f64 {
        (self.clickbait + self.punctuation + self.casing + self.volume).min(1.0)
    }

    /// Name the largest contributor. Ties resolve in a fixed order so the
    /// output is stable across runs.
    fn dominant_reason(&self, score: f64) -> String {
        let ranked = [
            (self.clickbait, "Title contains clickbait indicators"),
            (
                self.punctuation,
                "Title leans on question/emphasis punctuation",
            ),
            (self.casing, "Title capitalization suggests sensationalism"),
            (
                self.volume,
                "High comment volume indicates contested interpretation",
            ),
        ];

        let dominant = ranked
            .iter()
            .filter(|(value, _)| *value > 0.0)
            .max_by(|a, b| a.0.partial_cmp(&b.0).expect("signal scores are finite"));

        match dominant {
            Some((_, label)) => (*label).to_string(),
            None => format!("No ambiguity signals present (score {:.2})", score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clickbait_title_with_busy_thread_flagged() {
        let assessment = assess("You won't believe this!!", 80, 0.78);
        assert!(
            assessment.score >= 0.78,
            "score was {}",
            assessment.score
        );
        assert!(assessment.flagged);
        assert_eq!(assessment.reason, "Title contains clickbait indicators");
    }

    #[test]
    fn test_ordinary_title_not_flagged() {
        let assessment = assess("A database migration retrospective", 3, 0.78);
        assert!(assessment.score < 0.78);
        assert!(!assessment.flagged);
    }

    #[test]
    fn test_question_mark_contributes() {
        let plain = assess("Is Rust ready for games", 0, 0.78);
        let question = assess("Is Rust ready for games?", 0, 0.78);
        assert!(question.score > plain.score);
        assert_eq!(
            question.reason,
            "Title leans on question/emphasis punctuation"
        );
    }

    #[test]
    fn test_all_caps_title_scores_higher_than_mixed() {
        let caps = assess("THIS IS IMPORTANT", 0, 0.78);
        let mixed = assess("This is important", 0, 0.78);
        assert!(caps.score > mixed.score);
    }

    #[test]
    fn test_comment_volume_contributes() {
        let quiet = assess("A title", 10, 0.78);
        let busy = assess("A title", 150, 0.78);
        assert!(busy.score > quiet.score);
    }

    #[test]
    fn test_score_clamped_to_one() {
        let assessment = assess(
            "SHOCKING UNBELIEVABLE YOU WON'T BELIEVE THIS ONE?",
            500,
            0.5,
        );
        assert!(assessment.score <= 1.0);
        assert!(assessment.flagged);
    }

    #[test]
    fn test_determinism() {
        let a = assess("You won't believe this!!", 80, 0.78);
        let b = assess("You won't believe this!!", 80, 0.78);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn test_threshold_boundary_equality_flags() {
        let assessment = assess("Why?", 0, 0.2);
        assert_eq!(assessment.score, 0.2);
        assert!(assessment.flagged, "score equal to threshold must flag");
    }

    #[test]
    fn test_empty_title() {
        let assessment = assess("", 0, 0.78);
        assert_eq!(assessment.score, 0.0);
        assert!(!assessment.flagged);
    }
}
