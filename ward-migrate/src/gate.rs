//! Operator confirmation before applying risky changes.

use tracing::warn;

use crate::classify::MigrationChange;

/// Phrase the operator must type to apply destructive changes.
pub const DEFAULT_CONFIRMATION_PHRASE: &str = "delete data";

/// Source of operator answers.
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question; anything but an explicit yes is a no.
    fn confirm(&self, prompt: &str) -> bool;

    /// Ask for free text. `None` when no answer could be read.
    fn input(&self, prompt: &str) -> Option<String>;
}

/// Result of asking the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed with applying.
    Confirmed,
    /// Abort the run.
    Declined,
}

impl GateDecision {
    /// Check whether the operator agreed.
    pub fn is_confirmed(self) -> bool {
        self == Self::Confirmed
    }
}

/// Whether any change needs explicit confirmation.
pub fn requires_confirmation(changes: &[MigrationChange]) -> bool {
    changes.iter().any(|change| change.destructive)
}

/// Blocks destructive application until the exact phrase is typed.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    phrase: String,
}

impl ConfirmationGate {
    /// Create a gate requiring `phrase`.
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }

    /// The phrase that must be typed.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Yes/no gate in front of a production apply.
    pub fn confirm_production(&self, prompter: &dyn Prompter) -> GateDecision {
        if prompter.confirm("You are about to migrate a production database. Continue?") {
            GateDecision::Confirmed
        } else {
            warn!("production migration not confirmed");
            GateDecision::Declined
        }
    }

    /// Require the exact confirmation phrase; any other answer declines.
    pub fn confirm_destructive(&self, prompter: &dyn Prompter) -> GateDecision {
        let prompt = format!("Type '{}' to apply these destructive changes", self.phrase);
        match prompter.input(&prompt) {
            Some(answer) if answer.trim() == self.phrase => GateDecision::Confirmed,
            answer => {
                warn!(answer = ?answer, "destructive changes not confirmed");
                GateDecision::Declined
            }
        }
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_PHRASE)
    }
}
