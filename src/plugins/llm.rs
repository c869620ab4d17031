//! LLM chat plugin - conversational access to an OpenAI-compatible API.
//!
//! Conversation history lives in the session's plugin state as a rolling
//! window of message objects, so context survives across radio frames but is
//! bounded: a mesh node cannot grow an unbounded prompt. `!clear` starts a
//! fresh conversation.

use async_trait::async_trait;
use log::warn;
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::transport::NodeContext;

use super::{HttpClient, Plugin, PluginMetadata, PluginResponse, PluginState};

const STATE_HISTORY: &str = "history";

const SYSTEM_PROMPT: &str = "You are an assistant reached over a low-bandwidth mesh radio. \
Keep replies short and plain-text: a few sentences, no markdown.";

/// Chat plugin backed by an OpenAI-compatible completions endpoint (menu 2).
pub struct LlmPlugin {
    config: LlmConfig,
    metadata: PluginMetadata,
    http: HttpClient,
}

impl LlmPlugin {
    pub fn new(config: LlmConfig) -> Self {
        let http = HttpClient::new("LLM service", config.timeout_seconds);
        Self {
            config,
            metadata: PluginMetadata {
                name: "Chat".to_string(),
                description: "LLM assistant".to_string(),
                menu_number: 2,
                commands: vec!["[message]".to_string(), "!clear".to_string()],
            },
            http,
        }
    }

    fn history_from(&self, plugin_state: &PluginState) -> Vec<Value> {
        plugin_state
            .get(STATE_HISTORY)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Keep the newest `history_turns` user/assistant pairs.
    fn bound_history(&self, mut history: Vec<Value>) -> Vec<Value> {
        let max_len = self.config.history_turns.saturating_mul(2);
        if history.len() > max_len {
            history.drain(..history.len() - max_len);
        }
        history
    }

    async fn complete(&self, history: &[Value]) -> Result<String, String> {
        let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];
        messages.extend_from_slice(history);

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
        });

        let auth = format!("Bearer {}", self.config.api_key);
        let value = self
            .http
            .post_json(&self.config.endpoint, &body, &[("Authorization", &auth)])
            .await?;

        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                warn!("LLM response missing choices[0].message.content");
                "LLM service returned an unexpected response.".to_string()
            })
    }
}

#[async_trait]
impl Plugin for LlmPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn welcome_message(&self) -> String {
        format!(
            "Chat with {}\nSend a message to start. !clear resets the conversation.",
            self.config.model
        )
    }

    fn help_text(&self) -> String {
        "Chat Commands:\n[message] - Talk to the assistant\n!clear - Forget the conversation"
            .to_string()
    }

    async fn handle(
        &self,
        message: &str,
        _context: &NodeContext,
        plugin_state: PluginState,
    ) -> PluginResponse {
        let message = message.trim();

        if message.eq_ignore_ascii_case("!clear") {
            return PluginResponse::text("Conversation cleared.");
        }

        if message.is_empty() {
            return PluginResponse::with_state("Send a message to chat.", plugin_state);
        }

        if self.config.api_key.is_empty() {
            return PluginResponse::with_state("Chat: API key not configured", plugin_state);
        }

        let mut history = self.history_from(&plugin_state);
        history.push(json!({"role": "user", "content": message}));
        history = self.bound_history(history);

        match self.complete(&history).await {
            Ok(reply) => {
                history.push(json!({"role": "assistant", "content": reply}));
                let history = self.bound_history(history);
                let mut state = PluginState::new();
                state.insert(STATE_HISTORY.to_string(), Value::Array(history));
                PluginResponse::with_state(reply, state)
            }
            // Failed call: keep prior history so the node can just retry
            Err(reply) => PluginResponse::with_state(reply, plugin_state),
        }
    }
}
