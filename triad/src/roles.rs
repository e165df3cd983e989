//! The three conversational roles and their message production.
//!
//! Proposer and Validator are model-backed with fixed system prompts; the
//! Executor is deterministic and turns the latest proposal's code fragments
//! into an execution report.

use std::time::Duration;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::{info, instrument};

use crate::core::fragment::{extract_fragments, runnable_languages};
use crate::core::selector::SAFETY_MARKER;
use crate::core::termination::COMPLETE_MARKER;
use crate::core::types::{Message, RoleId, Source};
use crate::io::fragment_store::FragmentStore;
use crate::io::model::ModelClient;
use crate::io::sandbox::Sandbox;
use crate::runner::{ExecutionResult, RunnerError, run_fragments};

/// Marker the validator prefixes to a rejection.
pub const UNSAFE_MARKER: &str = "UNSAFE";

const PROPOSER_TEMPLATE: &str = include_str!("prompts/proposer.md");
const VALIDATOR_TEMPLATE: &str = include_str!("prompts/validator.md");

/// A participant that can produce the next message given the history so far.
pub trait Role {
    fn id(&self) -> RoleId;

    /// Produce this role's next message. The history is never empty when a
    /// role is asked to speak.
    fn produce(&self, history: &[Message]) -> Result<Message>;
}

fn render_prompt(name: &str, template: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template(name, template)
        .with_context(|| format!("parse {name} template"))?;
    let rendered = env
        .get_template(name)?
        .render(context! {
            languages => runnable_languages(),
            safety_marker => SAFETY_MARKER,
            unsafe_marker => UNSAFE_MARKER,
            complete_marker => COMPLETE_MARKER,
        })
        .with_context(|| format!("render {name} template"))?;
    Ok(rendered)
}

/// Model-backed role that proposes code toward the task.
pub struct ProposerAgent<'a> {
    client: &'a dyn ModelClient,
    system_prompt: String,
}

impl<'a> ProposerAgent<'a> {
    pub fn new(client: &'a dyn ModelClient) -> Result<Self> {
        Ok(Self {
            client,
            system_prompt: render_prompt("proposer", PROPOSER_TEMPLATE)?,
        })
    }
}

impl Role for ProposerAgent<'_> {
    fn id(&self) -> RoleId {
        RoleId::Proposer
    }

    #[instrument(skip_all)]
    fn produce(&self, history: &[Message]) -> Result<Message> {
        let content = self.client.complete(&self.system_prompt, history)?;
        Ok(Message::text(Source::Proposer, content))
    }
}

/// Model-backed role that reviews the latest proposal for safety.
pub struct ValidatorAgent<'a> {
    client: &'a dyn ModelClient,
    system_prompt: String,
}

impl<'a> ValidatorAgent<'a> {
    pub fn new(client: &'a dyn ModelClient) -> Result<Self> {
        Ok(Self {
            client,
            system_prompt: render_prompt("validator", VALIDATOR_TEMPLATE)?,
        })
    }
}

impl Role for ValidatorAgent<'_> {
    fn id(&self) -> RoleId {
        RoleId::Validator
    }

    #[instrument(skip_all)]
    fn produce(&self, history: &[Message]) -> Result<Message> {
        let content = self.client.complete(&self.system_prompt, history)?;
        Ok(Message::text(Source::Validator, content))
    }
}

/// Deterministic role that executes the latest proposal's code fragments.
pub struct ExecutorAgent<'a, S: Sandbox> {
    sandbox: &'a S,
    store: FragmentStore,
    fragment_timeout: Duration,
}

impl<'a, S: Sandbox> ExecutorAgent<'a, S> {
    pub fn new(sandbox: &'a S, store: FragmentStore, fragment_timeout: Duration) -> Self {
        Self {
            sandbox,
            store,
            fragment_timeout,
        }
    }
}

impl<S: Sandbox> Role for ExecutorAgent<'_, S> {
    fn id(&self) -> RoleId {
        RoleId::Executor
    }

    #[instrument(skip_all)]
    fn produce(&self, history: &[Message]) -> Result<Message> {
        let proposal = history
            .iter()
            .rev()
            .find(|message| message.source == Source::Proposer);
        let fragments = proposal
            .map(|message| extract_fragments(&message.content))
            .unwrap_or_default();

        if fragments.is_empty() {
            return Ok(Message::result(
                Source::Executor,
                "no code fragments found in the latest proposal",
            ));
        }

        match run_fragments(self.sandbox, &self.store, &fragments, self.fragment_timeout) {
            Ok(result) => {
                info!(exit_code = result.exit_code, "fragments executed");
                Ok(Message::result(Source::Executor, format_result(&result)))
            }
            Err(err) => match err.downcast_ref::<RunnerError>() {
                Some(RunnerError::InvalidFilename(_)) => {
                    Ok(Message::result(Source::Executor, format!("{err:#}")))
                }
                _ => Err(err),
            },
        }
    }
}

fn format_result(result: &ExecutionResult) -> String {
    let status = if result.exit_code == 0 {
        "success"
    } else {
        "failure"
    };
    let output = if result.combined_output.is_empty() {
        "(no output)"
    } else {
        result.combined_output.trim_end()
    };
    format!("exitcode: {} ({status})\n{output}", result.exit_code)
}
