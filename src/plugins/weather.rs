//! Weather plugin for fetching current conditions
//!
//! Looks up current weather via the OpenWeatherMap API. Supports city name
//! and zipcode lookups; an empty message fetches the configured default
//! location. Results are cached briefly so repeat queries from chatty nodes
//! do not hammer the API.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::transport::NodeContext;

use super::{HttpClient, Plugin, PluginMetadata, PluginResponse, PluginState};

const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: String,
    sys: WeatherSys,
    main: WeatherMain,
    weather: Vec<WeatherCondition>,
    wind: Option<WeatherWind>,
}

#[derive(Debug, Deserialize)]
struct WeatherSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    feels_like: f64,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WeatherWind {
    speed: f64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: Instant,
    location: String,
    data: String,
}

/// Current-conditions lookup plugin (menu 3).
pub struct WeatherPlugin {
    config: WeatherConfig,
    metadata: PluginMetadata,
    http: HttpClient,
    cache: Mutex<Option<CacheEntry>>,
}

impl WeatherPlugin {
    pub fn new(config: WeatherConfig) -> Self {
        let http = HttpClient::new("Weather service", config.timeout_seconds);
        Self {
            config,
            metadata: PluginMetadata {
                name: "Weather".to_string(),
                description: "Current conditions".to_string(),
                menu_number: 3,
                commands: vec!["[location]".to_string()],
            },
            http,
            cache: Mutex::new(None),
        }
    }

    async fn conditions_for(&self, location: &str) -> String {
        if self.config.api_key.is_empty() {
            warn!("OpenWeatherMap API key not configured");
            return "Weather: API key not configured".to_string();
        }

        if let Some(entry) = self.cache.lock().unwrap().clone() {
            if entry.location == location && entry.fetched_at.elapsed() < CACHE_TTL {
                debug!("Returning cached weather for {}", location);
                return entry.data;
            }
        }

        let url = match self.build_api_url(location) {
            Ok(u) => u,
            Err(msg) => return msg,
        };

        match self.http.fetch_json(&url, &[]).await {
            Ok(value) => match serde_json::from_value::<WeatherResponse>(value) {
                Ok(response) => {
                    let formatted = format_conditions(&response);
                    *self.cache.lock().unwrap() = Some(CacheEntry {
                        fetched_at: Instant::now(),
                        location: location.to_string(),
                        data: formatted.clone(),
                    });
                    formatted
                }
                Err(e) => {
                    warn!("Unexpected weather response shape: {}", e);
                    "Weather: unexpected response from service".to_string()
                }
            },
            Err(reply) => reply,
        }
    }

    /// Build the API URL based on the configured location type.
    fn build_api_url(&self, location: &str) -> Result<String, String> {
        let base_url = "https://api.openweathermap.org/data/2.5/weather";
        let api_key = &self.config.api_key;

        let query = if let Some(country) = &self.config.country_code {
            format!("{},{}", location, country)
        } else {
            location.to_string()
        };

        match self.config.location_type.as_str() {
            "city" => Ok(format!(
                "{}?q={}&appid={}&units=imperial",
                base_url,
                urlencoding::encode(&query),
                api_key
            )),
            "zipcode" => Ok(format!(
                "{}?zip={}&appid={}&units=imperial",
                base_url,
                urlencoding::encode(&query),
                api_key
            )),
            other => {
                warn!("Invalid weather location_type: {}", other);
                Err("Weather: invalid location_type in configuration".to_string())
            }
        }
    }
}

/// Format a response into one compact mesh-friendly line.
fn format_conditions(response: &WeatherResponse) -> String {
    let location = format!("{}, {}", response.name, response.sys.country);
    let condition = response
        .weather
        .first()
        .map(|c| capitalize_words(&c.description))
        .unwrap_or_else(|| "Unknown".to_string());
    let mut line = format!(
        "{}: {} {:.0}F (feels {:.0}F) hum {}%",
        location,
        condition,
        response.main.temp,
        response.main.feels_like,
        response.main.humidity
    );
    if let Some(wind) = &response.wind {
        line.push_str(&format!(" wind {:.0}mph", wind.speed));
    }
    line
}

fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn welcome_message(&self) -> String {
        format!(
            "Weather lookup\nSend a city or zipcode, or nothing for {}.",
            self.config.default_location
        )
    }

    fn help_text(&self) -> String {
        "Weather Commands:\n[location] - Conditions for location\n(empty) - Default location"
            .to_string()
    }

    async fn handle(
        &self,
        message: &str,
        _context: &NodeContext,
        plugin_state: PluginState,
    ) -> PluginResponse {
        let location = message.trim();
        let location = if location.is_empty() {
            self.config.default_location.as_str()
        } else {
            location
        };
        let reply = self.conditions_for(location).await;
        PluginResponse::with_state(reply, plugin_state)
    }
}
