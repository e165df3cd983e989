//! Conversation driver coordinating the three roles.
//!
//! One turn selects the next role from the last message, asks it to produce,
//! appends exactly one message, and re-evaluates termination. The configured
//! turn cap is enforced here as a backstop independent of the termination
//! condition, so a run can never grow the history without bound.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::selector::select;
use crate::core::termination::TerminationCondition;
use crate::core::types::{Message, RoleId};
use crate::roles::Role;

/// Why a conversation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The termination condition was met (with its reason).
    Condition(String),
    /// The hard turn cap was reached before any condition fired.
    TurnCap(usize),
    /// The run was cancelled (flag raised or deadline passed).
    Cancelled(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Condition(reason) => write!(f, "terminated: {reason}"),
            StopReason::TurnCap(cap) => write!(f, "turn cap of {cap} messages reached"),
            StopReason::Cancelled(reason) => write!(f, "cancelled: {reason}"),
        }
    }
}

/// Final state of a conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// Full ordered history, seed message included.
    pub history: Vec<Message>,
    pub stop: StopReason,
}

/// Driver limits.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Hard cap on total history length, seed included.
    pub max_turns: usize,
    /// Optional wall-clock deadline for the whole conversation.
    pub deadline: Option<Instant>,
}

/// Run a conversation from a non-empty seed history until it stops.
///
/// `roles` must cover every [`RoleId`] the selector can return. `on_message`
/// fires once per produced message, in order (seed messages are not
/// replayed). A raised `cancel` flag stops the run between turns; in-flight
/// subprocess work observes the same flag.
#[instrument(skip_all, fields(max_turns = config.max_turns, seed_len = seed.len()))]
pub fn run_conversation<F: FnMut(&Message)>(
    roles: &[&dyn Role],
    seed: Vec<Message>,
    termination: &TerminationCondition,
    config: &DriverConfig,
    cancel: &AtomicBool,
    mut on_message: F,
) -> Result<ConversationOutcome> {
    if seed.is_empty() {
        return Err(anyhow!("seed history must not be empty"));
    }
    let mut history = seed;

    if let Some(reason) = termination.evaluate(&history) {
        info!(%reason, "conversation stopped on the seed history");
        return Ok(ConversationOutcome {
            history,
            stop: StopReason::Condition(reason),
        });
    }

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(ConversationOutcome {
                history,
                stop: StopReason::Cancelled("cancellation flag raised".to_string()),
            });
        }
        if let Some(deadline) = config.deadline
            && Instant::now() >= deadline
        {
            // Raise the flag too, so any cleanup subprocess aborts promptly.
            cancel.store(true, Ordering::Relaxed);
            return Ok(ConversationOutcome {
                history,
                stop: StopReason::Cancelled("conversation deadline passed".to_string()),
            });
        }
        if history.len() >= config.max_turns {
            return Ok(ConversationOutcome {
                history,
                stop: StopReason::TurnCap(config.max_turns),
            });
        }

        let next = select(&history);
        let role = find_role(roles, next)?;
        debug!(role = next.as_str(), turn = history.len(), "producing next message");
        let message = role.produce(&history)?;
        on_message(&message);
        history.push(message);

        if let Some(reason) = termination.evaluate(&history) {
            info!(%reason, turns = history.len(), "conversation terminated");
            return Ok(ConversationOutcome {
                history,
                stop: StopReason::Condition(reason),
            });
        }
    }
}

fn find_role<'a>(roles: &'a [&'a dyn Role], id: RoleId) -> Result<&'a dyn Role> {
    roles
        .iter()
        .copied()
        .find(|role| role.id() == id)
        .ok_or_else(|| anyhow!("no participant registered for role {}", id.as_str()))
}
