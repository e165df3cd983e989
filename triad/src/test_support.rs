//! Test-only doubles for the model and sandbox seams.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::types::Message;
use crate::io::model::ModelClient;
use crate::io::sandbox::{ExecOutput, Sandbox};

/// Model client that replays a fixed queue of replies.
#[derive(Debug)]
pub struct ScriptedModelClient {
    replies: RefCell<VecDeque<String>>,
}

impl ScriptedModelClient {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(str::to_string).collect()),
        }
    }
}

impl ModelClient for ScriptedModelClient {
    fn complete(&self, _system_prompt: &str, _history: &[Message]) -> Result<String> {
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model client ran out of replies"))
    }
}

/// Sandbox that replays fixed outputs and records every command it was given.
#[derive(Debug)]
pub struct ScriptedSandbox {
    outputs: RefCell<VecDeque<ExecOutput>>,
    commands: RefCell<Vec<Vec<String>>>,
    running: bool,
}

impl ScriptedSandbox {
    pub fn new(outputs: Vec<ExecOutput>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            commands: RefCell::new(Vec::new()),
            running: true,
        }
    }

    /// A sandbox whose environment is not active.
    pub fn stopped() -> Self {
        Self {
            running: false,
            ..Self::new(Vec::new())
        }
    }

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn exec(&self, command: &[String], _timeout: Duration) -> Result<ExecOutput> {
        self.commands.borrow_mut().push(command.to_vec());
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted sandbox ran out of outputs"))
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
