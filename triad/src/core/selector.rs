//! Deterministic turn selection for the conversation.
//!
//! Routing is a four-state machine keyed on the source of the last message.
//! It is total (always returns a role) and stateless; termination is a
//! separate concern handled by [`crate::core::termination`] so the two can be
//! tested independently.

use crate::core::types::{Message, RoleId, Source};

/// Exact phrase a Validator message must contain for execution to proceed.
pub const SAFETY_MARKER: &str = "SAFETY VERIFIED";

/// Return the role that speaks next, given the ordered history.
///
/// Transition table:
/// - empty history -> Proposer
/// - Proposer spoke -> Validator
/// - Validator spoke -> Executor if the message contains [`SAFETY_MARKER`],
///   otherwise Proposer (a revision was requested)
/// - Executor spoke -> Proposer (results are summarized back to the user)
/// - user spoke -> Proposer
pub fn select(history: &[Message]) -> RoleId {
    let Some(last) = history.last() else {
        return RoleId::Proposer;
    };
    match last.source {
        Source::Proposer => RoleId::Validator,
        Source::Validator => {
            if last.content.contains(SAFETY_MARKER) {
                RoleId::Executor
            } else {
                RoleId::Proposer
            }
        }
        Source::Executor => RoleId::Proposer,
        Source::User => RoleId::Proposer,
    }
}
