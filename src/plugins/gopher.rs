//! Gopher plugin - browse gopherspace over raw TCP (RFC 1436).
//!
//! The plugin keeps the current menu's selectable items in plugin state; a
//! node replies with a number to follow that item. Text documents are fetched
//! whole (size-capped) and handed to the chunker like any other reply.
//! `!home` returns to the configured server's root menu.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::GopherConfig;
use crate::transport::NodeContext;

use super::{Plugin, PluginMetadata, PluginResponse, PluginState};

const STATE_ITEMS: &str = "menu_items";

/// Cap on bytes read per fetch; gopherspace has some enormous files.
const MAX_FETCH_BYTES: usize = 16 * 1024;

/// One selectable entry in a gopher menu.
#[derive(Debug, Clone)]
struct MenuItem {
    item_type: char,
    display: String,
    selector: String,
    host: String,
    port: u16,
}

impl MenuItem {
    fn to_json(&self) -> Value {
        json!({
            "type": self.item_type.to_string(),
            "display": self.display,
            "selector": self.selector,
            "host": self.host,
            "port": self.port,
        })
    }

    fn from_json(value: &Value) -> Option<Self> {
        Some(Self {
            item_type: value.get("type")?.as_str()?.chars().next()?,
            display: value.get("display")?.as_str()?.to_string(),
            selector: value.get("selector")?.as_str()?.to_string(),
            host: value.get("host")?.as_str()?.to_string(),
            port: value.get("port")?.as_u64()? as u16,
        })
    }
}

/// Gopherspace browser plugin (menu 1).
pub struct GopherPlugin {
    config: GopherConfig,
    metadata: PluginMetadata,
}

impl GopherPlugin {
    pub fn new(config: GopherConfig) -> Self {
        Self {
            config,
            metadata: PluginMetadata {
                name: "Gopher".to_string(),
                description: "Browse gopherspace".to_string(),
                menu_number: 1,
                commands: vec!["[number]".to_string(), "!home".to_string()],
            },
        }
    }

    /// Send one selector and read the reply, with timeout and size cap.
    async fn fetch(&self, host: &str, port: u16, selector: &str) -> Result<String, String> {
        let deadline = Duration::from_secs(self.config.timeout_seconds as u64);
        let addr = format!("{}:{}", host, port);

        let result = timeout(deadline, async {
            let mut stream = TcpStream::connect(&addr).await?;
            stream
                .write_all(format!("{}\r\n", selector).as_bytes())
                .await?;
            let mut buf = Vec::with_capacity(4096);
            let mut chunk = [0u8; 2048];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() >= MAX_FETCH_BYTES {
                    buf.truncate(MAX_FETCH_BYTES);
                    break;
                }
            }
            Ok::<_, std::io::Error>(buf)
        })
        .await;

        match result {
            Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(Err(e)) => {
                warn!("Gopher fetch from {} failed: {}", addr, e);
                Err(format!("Cannot reach gopher server {}.", host))
            }
            Err(_) => {
                warn!("Gopher fetch from {} timed out", addr);
                Err("Gopher request timed out.".to_string())
            }
        }
    }

    /// Parse a raw menu response into selectable items and info lines.
    fn parse_menu(&self, raw: &str) -> (Vec<MenuItem>, Vec<String>) {
        let mut items = Vec::new();
        let mut info_lines = Vec::new();
        for line in raw.lines() {
            if line == "." || line.is_empty() {
                continue;
            }
            let mut chars = line.chars();
            let Some(item_type) = chars.next() else {
                continue;
            };
            let rest: String = chars.collect();
            let fields: Vec<&str> = rest.split('\t').collect();
            let display = fields.first().copied().unwrap_or("").to_string();
            match item_type {
                'i' => {
                    if !display.trim().is_empty() {
                        info_lines.push(display);
                    }
                }
                // Text files and submenus are the only types a radio can use
                '0' | '1' if fields.len() >= 4 => {
                    if items.len() >= self.config.max_menu_items {
                        continue;
                    }
                    items.push(MenuItem {
                        item_type,
                        display,
                        selector: fields[1].to_string(),
                        host: fields[2].to_string(),
                        port: fields[3].trim().parse().unwrap_or(70),
                    });
                }
                _ => {}
            }
        }
        (items, info_lines)
    }

    async fn browse(&self, host: &str, port: u16, selector: &str) -> PluginResponse {
        let raw = match self.fetch(host, port, selector).await {
            Ok(r) => r,
            Err(reply) => return PluginResponse::text(reply),
        };

        let (items, info_lines) = self.parse_menu(&raw);
        debug!(
            "Gopher menu {}:{} '{}': {} items",
            host,
            port,
            selector,
            items.len()
        );

        let mut lines = Vec::new();
        for info in info_lines.iter().take(3) {
            lines.push(info.clone());
        }
        for (i, item) in items.iter().enumerate() {
            let tag = if item.item_type == '1' { "/" } else { "" };
            lines.push(format!("{}. {}{}", i + 1, item.display, tag));
        }
        if items.is_empty() {
            lines.push("(empty menu)".to_string());
        } else {
            lines.push("Send number to open".to_string());
        }

        let mut state = PluginState::new();
        state.insert(
            STATE_ITEMS.to_string(),
            Value::Array(items.iter().map(MenuItem::to_json).collect()),
        );
        PluginResponse::with_state(lines.join("\n"), state)
    }

    async fn open_item(&self, item: &MenuItem) -> PluginResponse {
        match item.item_type {
            '1' => self.browse(&item.host, item.port, &item.selector).await,
            _ => {
                let text = match self.fetch(&item.host, item.port, &item.selector).await {
                    Ok(t) => t,
                    Err(reply) => return PluginResponse::text(reply),
                };
                // Keep the menu in state so the node can pick another item after reading
                PluginResponse::text(text.trim_end_matches(['\n', '.', '\r']).to_string())
            }
        }
    }
}

#[async_trait]
impl Plugin for GopherPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn welcome_message(&self) -> String {
        format!(
            "Gopher browser @ {}\nSend nothing for the root menu, a number to open an item.",
            self.config.default_host
        )
    }

    fn help_text(&self) -> String {
        "Gopher Commands:\n(empty) - Show current server root\n[number] - Open menu item\n!home - Root menu"
            .to_string()
    }

    async fn handle(
        &self,
        message: &str,
        _context: &NodeContext,
        plugin_state: PluginState,
    ) -> PluginResponse {
        let message = message.trim();

        if message.is_empty() || message.eq_ignore_ascii_case("!home") {
            return self
                .browse(&self.config.default_host, self.config.default_port, "")
                .await;
        }

        if let Ok(selection) = message.parse::<usize>() {
            let items: Vec<MenuItem> = plugin_state
                .get(STATE_ITEMS)
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(MenuItem::from_json).collect())
                .unwrap_or_default();
            if selection >= 1 && selection <= items.len() {
                let item = items[selection - 1].clone();
                let mut response = self.open_item(&item).await;
                // Reading a document should not lose the menu position
                if response.plugin_state.is_empty() {
                    response.plugin_state = plugin_state;
                }
                return response;
            }
            return PluginResponse::with_state(
                "No such item. Send a number from the menu or !home.",
                plugin_state,
            );
        }

        PluginResponse::with_state(
            "Send a menu number, !home for the root menu, or !exit to leave.",
            plugin_state,
        )
    }
}
