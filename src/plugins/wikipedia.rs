//! Wikipedia plugin - search and read article summaries.
//!
//! A plain message is treated as a search. Multiple hits come back as a
//! numbered list; the node replies with a number to fetch that article's
//! summary. `!random` pulls a random article. Summaries are truncated to fit
//! the configured length before the chunker ever sees them.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::WikipediaConfig;
use crate::transport::NodeContext;

use super::{truncate, HttpClient, Plugin, PluginMetadata, PluginResponse, PluginState};

/// Required by Wikipedia API policy
const USER_AGENT: &str = "meshgate/0.3 (https://github.com/meshgate/meshgate)";

const STATE_RESULTS: &str = "last_results";
const STATE_QUERY: &str = "last_query";
const STATE_TITLE: &str = "last_title";

/// Wikipedia search plugin (menu 4).
pub struct WikipediaPlugin {
    config: WikipediaConfig,
    metadata: PluginMetadata,
    http: HttpClient,
}

impl WikipediaPlugin {
    pub fn new(config: WikipediaConfig) -> Self {
        let http = HttpClient::new("Wikipedia", config.timeout_seconds);
        Self {
            config,
            metadata: PluginMetadata {
                name: "Wikipedia".to_string(),
                description: "Search Wikipedia".to_string(),
                menu_number: 4,
                commands: vec!["[topic]".to_string(), "!search".to_string(), "!random".to_string()],
            },
            http,
        }
    }

    fn rest_base(&self) -> String {
        format!("https://{}.wikipedia.org/api/rest_v1", self.config.language)
    }

    async fn search(&self, query: &str) -> PluginResponse {
        let url = format!(
            "https://{}.wikipedia.org/w/api.php?action=opensearch&search={}&limit=5&namespace=0&format=json",
            self.config.language,
            urlencoding::encode(query)
        );

        let value = match self.http.fetch_json(&url, &[("User-Agent", USER_AGENT)]).await {
            Ok(v) => v,
            Err(reply) => return PluginResponse::text(reply),
        };

        // opensearch returns [query, [titles], [descriptions], [urls]]
        let titles: Vec<String> = value
            .get(1)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if titles.is_empty() {
            let mut state = PluginState::new();
            state.insert(STATE_RESULTS.to_string(), json!([]));
            return PluginResponse::with_state(format!("No results for '{}'.", query), state);
        }

        if titles.len() == 1 {
            return self.summary(&titles[0]).await;
        }

        let mut lines = vec![format!("Results for '{}':", query)];
        for (i, title) in titles.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, title));
        }
        lines.push("\nSend number to select".to_string());

        let mut state = PluginState::new();
        state.insert(STATE_RESULTS.to_string(), json!(titles));
        state.insert(STATE_QUERY.to_string(), json!(query));
        PluginResponse::with_state(lines.join("\n"), state)
    }

    async fn random(&self) -> PluginResponse {
        let url = format!("{}/page/random/summary", self.rest_base());
        let value = match self.http.fetch_json(&url, &[("User-Agent", USER_AGENT)]).await {
            Ok(v) => v,
            Err(reply) => return PluginResponse::text(reply),
        };
        self.render_summary(&value, None)
    }

    async fn summary(&self, title: &str) -> PluginResponse {
        let encoded = title.replace(' ', "_");
        let url = format!(
            "{}/page/summary/{}",
            self.rest_base(),
            urlencoding::encode(&encoded)
        );
        let value = match self.http.fetch_json(&url, &[("User-Agent", USER_AGENT)]).await {
            Ok(v) => v,
            Err(reply) => {
                if reply.contains("HTTP 404") {
                    let mut state = PluginState::new();
                    state.insert(STATE_RESULTS.to_string(), json!([]));
                    return PluginResponse::with_state(
                        format!("Article '{}' not found.", title),
                        state,
                    );
                }
                return PluginResponse::text(reply);
            }
        };
        self.render_summary(&value, Some(title))
    }

    fn render_summary(&self, value: &Value, fallback_title: Option<&str>) -> PluginResponse {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .or(fallback_title)
            .unwrap_or("Unknown");
        let extract = value
            .get("extract")
            .and_then(Value::as_str)
            .unwrap_or("No content available.");
        let extract = truncate(extract, self.config.max_summary_length);

        let mut state = PluginState::new();
        state.insert(STATE_TITLE.to_string(), json!(title));
        state.insert(STATE_RESULTS.to_string(), json!([]));
        PluginResponse::with_state(format!("{}\n\n{}", title, extract), state)
    }
}

#[async_trait]
impl Plugin for WikipediaPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn welcome_message(&self) -> String {
        "Wikipedia Search\nSend a topic to search or !help for commands.".to_string()
    }

    fn help_text(&self) -> String {
        "Wikipedia Commands:\n[topic] - Search for topic\n!search <query> - Search\n!random - Random article"
            .to_string()
    }

    async fn handle(
        &self,
        message: &str,
        _context: &NodeContext,
        plugin_state: PluginState,
    ) -> PluginResponse {
        let message = message.trim();
        let lower = message.to_lowercase();

        if lower == "!random" {
            return self.random().await;
        }

        if lower == "!search" || lower.starts_with("!search ") {
            let query = message.get(7..).unwrap_or("").trim();
            if query.is_empty() {
                return PluginResponse::with_state("Usage: !search <query>", plugin_state);
            }
            return self.search(query).await;
        }

        // A bare number selects from the previous search's result list
        if let Ok(selection) = message.parse::<usize>() {
            let titles: Vec<String> = plugin_state
                .get(STATE_RESULTS)
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if selection >= 1 && selection <= titles.len() {
                return self.summary(&titles[selection - 1]).await;
            }
        }

        if message.is_empty() {
            return PluginResponse::with_state("Send a topic to search.", plugin_state);
        }

        self.search(message).await
    }
}
