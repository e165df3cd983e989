//! Composable termination conditions over the conversation history.
//!
//! Conditions form a small expression tree evaluated short-circuit, left to
//! right, after every appended message. Any composite the driver uses must
//! include a [`TerminationCondition::MessageCountAtLeast`] arm so a run is
//! guaranteed to stop even when no phrase ever appears.

use crate::core::types::Message;

/// Phrase the Proposer emits to signal the task is fully resolved.
pub const COMPLETE_MARKER: &str = "COMPLETE";

/// A predicate over the conversation history deciding whether the run stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCondition {
    /// True once the history holds at least `n` messages.
    MessageCountAtLeast(usize),
    /// True if the most recent message contains the phrase (case-sensitive).
    ContentContains(String),
    Or(Box<TerminationCondition>, Box<TerminationCondition>),
    And(Box<TerminationCondition>, Box<TerminationCondition>),
}

impl TerminationCondition {
    pub fn content_contains(phrase: impl Into<String>) -> Self {
        TerminationCondition::ContentContains(phrase.into())
    }

    pub fn or(self, other: TerminationCondition) -> Self {
        TerminationCondition::Or(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: TerminationCondition) -> Self {
        TerminationCondition::And(Box::new(self), Box::new(other))
    }

    /// Evaluate against the full history. Returns the human-readable reason
    /// when the condition is met, `None` otherwise.
    pub fn evaluate(&self, history: &[Message]) -> Option<String> {
        match self {
            TerminationCondition::MessageCountAtLeast(n) => {
                if history.len() >= *n {
                    Some(format!("message count reached {n}"))
                } else {
                    None
                }
            }
            TerminationCondition::ContentContains(phrase) => {
                let last = history.last()?;
                if last.content.contains(phrase) {
                    Some(format!("last message contains {phrase:?}"))
                } else {
                    None
                }
            }
            TerminationCondition::Or(left, right) => left
                .evaluate(history)
                .or_else(|| right.evaluate(history)),
            TerminationCondition::And(left, right) => {
                let left_reason = left.evaluate(history)?;
                let right_reason = right.evaluate(history)?;
                Some(format!("{left_reason} and {right_reason}"))
            }
        }
    }
}

/// The composite the driver uses by default: an explicit completion signal or
/// the hard message cap, whichever comes first.
pub fn default_termination(max_turns: usize) -> TerminationCondition {
    TerminationCondition::content_contains(COMPLETE_MARKER)
        .or(TerminationCondition::MessageCountAtLeast(max_turns))
}
