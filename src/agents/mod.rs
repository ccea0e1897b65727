//! Stage agents: the four ordered scoring steps.
//!
//! Each agent is a side-effect-free function of (item, prior-stage output,
//! configuration). Agents never call each other; the orchestrator feeds each
//! stage from the store so any stage can be replayed against persisted state.
//!
//! Per-item state machine:
//!
//! ```text
//! Fetched -> AmbiguityScored -> PatternMined -> RiskAssessed
//!         -> { AutoCleared | PendingOverride } -> Resolved
//! ```

pub mod ambiguity;
pub mod override_gate;
pub mod patterns;
pub mod risk;

use serde::{Deserialize, Serialize};

/// Per-item pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Raw item persisted, no stage run yet.
    Fetched,
    /// Ambiguity detector output committed.
    AmbiguityScored,
    /// Pattern miner output committed.
    PatternMined,
    /// Risk analyzer output committed.
    RiskAssessed,
    /// Gate passed; processing for the item is finished.
    AutoCleared,
    /// Halted awaiting an operator decision.
    PendingOverride,
    /// Operator resolved the override.
    Resolved,
    /// A fetch or stage failed; excluded from later stages.
    Failed,
}

impl ItemState {
    /// Whether the pipeline takes no further automated action on this item.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::AutoCleared
                | ItemState::PendingOverride
                | ItemState::Resolved
                | ItemState::Failed
        )
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemState::Fetched => write!(f, "fetched"),
            ItemState::AmbiguityScored => write!(f, "ambiguity_scored"),
            ItemState::PatternMined => write!(f, "pattern_mined"),
            ItemState::RiskAssessed => write!(f, "risk_assessed"),
            ItemState::AutoCleared => write!(f, "auto_cleared"),
            ItemState::PendingOverride => write!(f, "pending_override"),
            ItemState::Resolved => write!(f, "resolved"),
            ItemState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ItemState::AutoCleared.is_terminal());
        assert!(ItemState::PendingOverride.is_terminal());
        assert!(ItemState::Resolved.is_terminal());
        assert!(ItemState::Failed.is_terminal());
        assert!(!ItemState::Fetched.is_terminal());
        assert!(!ItemState::RiskAssessed.is_terminal());
    }

    #[test]
    fn test_display_snake_case() {
        assert_eq!(ItemState::PendingOverride.to_string(), "pending_override");
        assert_eq!(ItemState::AmbiguityScored.to_string(), "ambiguity_scored");
    }
}
