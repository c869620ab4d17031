//! # Plugins Module
//!
//! A plugin is one text service a node can enter from the menu: it exposes
//! static [`PluginMetadata`], a welcome message, help text, and a `handle`
//! operation invoked for every message while the node is inside it.
//!
//! Plugins own their failure modes. Network errors, timeouts, and malformed
//! upstream responses all become user-facing reply strings; `handle` never
//! errors outward, so the router treats plugin failures as ordinary replies.
//!
//! Built-ins:
//!
//! - [`gopher::GopherPlugin`] - browse gopherspace (menu 1)
//! - [`llm::LlmPlugin`] - chat with a language model (menu 2)
//! - [`weather::WeatherPlugin`] - current conditions (menu 3)
//! - [`wikipedia::WikipediaPlugin`] - article search (menu 4)

pub mod gopher;
pub mod llm;
pub mod weather;
pub mod wikipedia;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use tokio::time::timeout;

use crate::transport::NodeContext;

pub use gopher::GopherPlugin;
pub use llm::LlmPlugin;
pub use weather::WeatherPlugin;
pub use wikipedia::WikipediaPlugin;

/// Free-form state bag owned by whichever plugin a session is inside.
/// The router carries it but never interprets it.
pub type PluginState = HashMap<String, Value>;

/// Static descriptor for a registered plugin. Immutable after registration.
#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    /// Menu position; unique positive integer across the registry
    pub menu_number: u32,
    /// Commands the plugin recognizes, shown in help output
    pub commands: Vec<String>,
}

/// Reply from a plugin: text for the node plus the replacement state bag.
#[derive(Debug, Clone)]
pub struct PluginResponse {
    pub message: String,
    pub plugin_state: PluginState,
}

impl PluginResponse {
    /// Reply that carries no state forward.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            plugin_state: PluginState::new(),
        }
    }

    /// Reply preserving or replacing the state bag.
    pub fn with_state(message: impl Into<String>, plugin_state: PluginState) -> Self {
        Self {
            message: message.into(),
            plugin_state,
        }
    }
}

/// A pluggable text service reachable from the menu.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Shown when a node enters the plugin from the menu.
    fn welcome_message(&self) -> String;

    /// Shown for the universal help command while inside the plugin.
    fn help_text(&self) -> String;

    /// Handle one message from a node inside this plugin. Must not fail:
    /// every internal error becomes reply text.
    async fn handle(
        &self,
        message: &str,
        context: &NodeContext,
        plugin_state: PluginState,
    ) -> PluginResponse;
}

/// Shared HTTP helper for the API-backed plugins: one configured client,
/// a hard timeout, and mapping of every failure mode to a short reply
/// string suitable for a mesh frame.
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    service_name: String,
}

impl HttpClient {
    pub fn new(service_name: &str, timeout_seconds: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_seconds as u64),
            service_name: service_name.to_string(),
        }
    }

    /// GET a URL and parse the body as JSON. `Err` is the user-facing reply.
    pub async fn fetch_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Value, String> {
        let mut request = self.client.get(url);
        for (k, v) in headers {
            request = request.header(*k, *v);
        }
        self.execute_json(request).await
    }

    /// POST a JSON body and parse the JSON response. `Err` is the user-facing reply.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> Result<Value, String> {
        let mut request = self.client.post(url).json(body);
        for (k, v) in headers {
            request = request.header(*k, *v);
        }
        self.execute_json(request).await
    }

    async fn execute_json(&self, request: reqwest::RequestBuilder) -> Result<Value, String> {
        let response = match timeout(self.timeout, request.send()).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) if e.is_connect() => {
                warn!("{}: connect error: {}", self.service_name, e);
                return Err(format!("Cannot connect to {}.", self.service_name));
            }
            Ok(Err(e)) => {
                warn!("{}: request error: {}", self.service_name, e);
                return Err(format!("{} error: {}", self.service_name, e));
            }
            Err(_) => {
                warn!(
                    "{}: request timed out after {:?}",
                    self.service_name, self.timeout
                );
                return Err(format!("Request to {} timed out.", self.service_name));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("{}: HTTP {}", self.service_name, status.as_u16());
            return Err(format!(
                "{} error: HTTP {}",
                self.service_name,
                status.as_u16()
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| {
                warn!("{}: JSON parse error: {}", self.service_name, e);
                format!("Invalid response from {}", self.service_name)
            })
    }
}

/// Truncate text to `max_length` characters, appending `...` when cut.
/// UTF-8 safe: operates on characters, not bytes.
pub(crate) fn truncate(text: &str, max_length: usize) -> String {
    const SUFFIX: &str = "...";
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(SUFFIX.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(SUFFIX);
    out
}
