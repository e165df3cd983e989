//! Shared deterministic types for the conversation core.
//!
//! These types define stable contracts between core components. They should
//! not depend on external state or I/O and must remain deterministic across
//! runs.

use serde::{Deserialize, Serialize};

/// A role that can be selected to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleId {
    Proposer,
    Validator,
    Executor,
}

impl RoleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleId::Proposer => "proposer",
            RoleId::Validator => "validator",
            RoleId::Executor => "executor",
        }
    }
}

/// Origin of a message: one of the roles, or the user who seeded the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    User,
    Proposer,
    Validator,
    Executor,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::User => "user",
            Source::Proposer => "proposer",
            Source::Validator => "validator",
            Source::Executor => "executor",
        }
    }
}

impl From<RoleId> for Source {
    fn from(role: RoleId) -> Self {
        match role {
            RoleId::Proposer => Source::Proposer,
            RoleId::Validator => Source::Validator,
            RoleId::Executor => Source::Executor,
        }
    }
}

/// Whether a message carries conversational text or an execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Result,
}

/// One entry in the conversation history. Immutable once appended; the
/// ordered `Vec<Message>` is the only ordering the system relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub source: Source,
    pub content: String,
    pub kind: MessageKind,
}

impl Message {
    pub fn text(source: Source, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    pub fn result(source: Source, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
            kind: MessageKind::Result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_lowercase() {
        let json = serde_json::to_string(&Source::Proposer).expect("serialize");
        assert_eq!(json, "\"proposer\"");
    }

    #[test]
    fn message_round_trips() {
        let msg = Message::result(Source::Executor, "exit 0");
        let json = serde_json::to_string(&msg).expect("serialize");
        let back: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, msg);
    }
}
