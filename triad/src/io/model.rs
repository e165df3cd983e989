//! Model-inference client for the conversational roles.
//!
//! The [`ModelClient`] trait decouples the roles from the provider. Tests use
//! scripted clients that return predetermined replies; the shipped
//! [`OpenAiModelClient`] talks to any OpenAI-compatible `chat/completions`
//! endpoint with a per-request timeout and bounded retries.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::types::Message;
use crate::io::config::ModelConfig;

/// Abstraction over model-inference backends.
pub trait ModelClient {
    /// Produce a completion for the history under the given system prompt.
    fn complete(&self, system_prompt: &str, history: &[Message]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat endpoint.
pub struct OpenAiModelClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    agent: ureq::Agent,
}

impl OpenAiModelClient {
    pub fn new(config: &ModelConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            agent,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_once(&self, body: &ChatRequest<'_>) -> Result<String, ureq::Error> {
        let mut request = self.agent.post(&self.endpoint());
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }
        let response = request.send_json(body)?;
        let parsed: ChatResponse = response.into_json()?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

impl ModelClient for OpenAiModelClient {
    #[instrument(skip_all, fields(model = %self.model, history_len = history.len()))]
    fn complete(&self, system_prompt: &str, history: &[Message]) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: wire_messages(system_prompt, history),
            temperature: 0.0,
        };

        let mut last_err: Option<ureq::Error> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_for(attempt);
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying completion");
                thread::sleep(backoff);
            }
            match self.request_once(&body) {
                Ok(content) => {
                    debug!(attempt, "completion succeeded");
                    return Ok(content);
                }
                Err(err) if is_retryable(&err) => last_err = Some(err),
                Err(err) => {
                    return Err(err).context("chat completion request");
                }
            }
        }
        Err(anyhow!(
            "inference unavailable after {} retries: {}",
            self.max_retries,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        ))
    }
}

/// Exponential backoff before the nth retry. The exponent is capped so a
/// large configured retry budget neither overflows nor sleeps for hours.
fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(500) * 2u32.pow(attempt.saturating_sub(1).min(6))
}

fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

/// Flatten the history into wire messages, prefixing each entry with its
/// source name so role-play stays stable across providers.
fn wire_messages(system_prompt: &str, history: &[Message]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(WireMessage {
        role: "system",
        content: system_prompt.to_string(),
    });
    for message in history {
        messages.push(WireMessage {
            role: "user",
            content: format!("{}: {}", message.source.as_str(), message.content),
        });
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Source;

    #[test]
    fn wire_messages_prefix_sources() {
        let history = [
            Message::text(Source::User, "task"),
            Message::text(Source::Proposer, "code"),
        ];
        let wire = wire_messages("be helpful", &history);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].content, "user: task");
        assert_eq!(wire[2].content, "proposer: code");
    }

    #[test]
    fn chat_request_serializes_for_the_wire() {
        let body = ChatRequest {
            model: "m",
            messages: wire_messages("be helpful", &[Message::text(Source::User, "hi")]),
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user: hi");
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_for(1), Duration::from_millis(500));
        assert_eq!(backoff_for(2), Duration::from_secs(1));
        assert_eq!(backoff_for(7), Duration::from_secs(32));
        assert_eq!(backoff_for(200), Duration::from_secs(32));
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(is_retryable(&ureq::Error::Status(
            500,
            ureq::Response::new(500, "Internal Server Error", "").expect("response")
        )));
        assert!(is_retryable(&ureq::Error::Status(
            429,
            ureq::Response::new(429, "Too Many Requests", "").expect("response")
        )));
        assert!(!is_retryable(&ureq::Error::Status(
            400,
            ureq::Response::new(400, "Bad Request", "").expect("response")
        )));
    }
}
