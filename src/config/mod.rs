//! # Configuration Management Module
//!
//! Centralized configuration for the gateway: TOML file loading, typed
//! sections with sensible defaults, and fail-fast validation.
//!
//! ## Configuration Structure
//!
//! - [`GatewayConfig`] - Core gateway settings (sessions, chunking, commands)
//! - [`TransportConfig`] - Radio host connection settings
//! - [`SecurityConfig`] - Node filtering and rate limiting
//! - [`LoggingConfig`] - Logging level and optional log file
//! - [`WeatherConfig`], [`LlmConfig`], [`WikipediaConfig`], [`GopherConfig`] -
//!   per-plugin settings, each with an `enabled` flag
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshgate::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Gateway: {}", config.gateway.name);
//!     Ok(())
//! }
//! ```
//!
//! Configuration errors (a chunk limit too small for marker overhead, a
//! zero-length rate window) are rejected by [`Config::validate`] at startup,
//! never at message-handling time.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::gateway::chunker::MIN_CHUNK_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub gopher: GopherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub name: String,
    /// Minutes of inactivity before a session is swept
    pub session_timeout_minutes: u32,
    /// Maximum concurrent sessions; 0 = unlimited. Oldest is evicted at the cap.
    #[serde(default)]
    pub max_sessions: usize,
    /// Interval between background cleanup passes (sessions + rate limiter)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Maximum outbound payload per radio frame; longer replies are chunked
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Universal command returning a session to the menu (matched case-insensitively)
    #[serde(default = "default_exit_command")]
    pub exit_command: String,
    /// Universal help command (matched case-insensitively)
    #[serde(default = "default_help_command")]
    pub help_command: String,
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_max_message_size() -> usize {
    // Meshtastic text frames top out around 230 bytes
    200
}

fn default_exit_command() -> String {
    "!exit".to_string()
}

fn default_help_command() -> String {
    "!help".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Radio host daemon address (newline-delimited JSON frames)
    pub host: String,
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4403,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_rate_limit_messages")]
    pub rate_limit_messages: usize,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    /// Rate-limit bookkeeping for a node is dropped after this much silence
    #[serde(default = "default_rate_limit_inactive")]
    pub rate_limit_inactive_seconds: u64,
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
    /// When true, only allowlisted nodes may interact
    #[serde(default)]
    pub require_allowlist: bool,
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_messages() -> usize {
    10
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_inactive() -> u64 {
    300
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            rate_limit_messages: default_rate_limit_messages(),
            rate_limit_window_seconds: default_rate_limit_window(),
            rate_limit_inactive_seconds: default_rate_limit_inactive(),
            allowlist: Vec::new(),
            denylist: Vec::new(),
            require_allowlist: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key
    pub api_key: String,
    /// Default location for weather queries (city name or zipcode)
    pub default_location: String,
    /// Location type: "city" or "zipcode"
    pub location_type: String,
    /// Country code for zipcode lookups (e.g., "US", "GB")
    pub country_code: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    pub enabled: bool,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_location: "Los Angeles".to_string(),
            location_type: "city".to_string(),
            country_code: Some("US".to_string()),
            timeout_seconds: 10,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Cap on reply length requested from the model
    pub max_tokens: u32,
    /// Conversation turns kept in plugin state
    pub history_turns: usize,
    pub timeout_seconds: u32,
    pub enabled: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 150,
            history_turns: 6,
            timeout_seconds: 30,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    /// Wikipedia language code (e.g., "en", "de")
    pub language: String,
    /// Maximum summary length in characters before truncation
    pub max_summary_length: usize,
    pub timeout_seconds: u32,
    pub enabled: bool,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            max_summary_length: 400,
            timeout_seconds: 10,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GopherConfig {
    /// Default gopher server to browse
    pub default_host: String,
    pub default_port: u16,
    pub timeout_seconds: u32,
    /// Maximum menu entries shown per listing
    pub max_menu_items: usize,
    pub enabled: bool,
}

impl Default for GopherConfig {
    fn default() -> Self {
        Self {
            default_host: "gopher.floodgap.com".to_string(),
            default_port: 70,
            timeout_seconds: 10,
            max_menu_items: 9,
            enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;
        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;
        Ok(())
    }

    /// Validate configuration values. Called on load so bad settings fail at
    /// startup rather than mid-conversation.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.name.trim().is_empty() {
            return Err(anyhow!("gateway.name must not be empty"));
        }
        if self.gateway.session_timeout_minutes == 0 {
            return Err(anyhow!("gateway.session_timeout_minutes must be positive"));
        }
        if self.gateway.cleanup_interval_seconds == 0 {
            return Err(anyhow!("gateway.cleanup_interval_seconds must be positive"));
        }
        if self.gateway.max_message_size < MIN_CHUNK_SIZE {
            return Err(anyhow!(
                "gateway.max_message_size must be at least {} bytes to fit chunk markers",
                MIN_CHUNK_SIZE
            ));
        }
        if self.gateway.exit_command.trim().is_empty()
            || self.gateway.help_command.trim().is_empty()
        {
            return Err(anyhow!("gateway exit/help commands must not be empty"));
        }
        if self.security.rate_limit_enabled {
            if self.security.rate_limit_messages == 0 {
                return Err(anyhow!("security.rate_limit_messages must be positive"));
            }
            if self.security.rate_limit_window_seconds == 0 {
                return Err(anyhow!(
                    "security.rate_limit_window_seconds must be positive"
                ));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                name: "Meshgate".to_string(),
                session_timeout_minutes: 60,
                max_sessions: 0,
                cleanup_interval_seconds: default_cleanup_interval(),
                max_message_size: default_max_message_size(),
                exit_command: default_exit_command(),
                help_command: default_help_command(),
            },
            transport: TransportConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            weather: WeatherConfig::default(),
            llm: LlmConfig::default(),
            wikipedia: WikipediaConfig::default(),
            gopher: GopherConfig::default(),
        }
    }
}
