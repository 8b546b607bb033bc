// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Persistent settings are stored as TOML in the platform configuration
//! directory. Every field has a serde default so older files keep loading
//! as new settings are added.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stormtrack_engine::{ClockRange, VisualizerConfig};

const APP_NAME: &str = "stormtrack";
const CONFIG_NAME: &str = "config";

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "STORMTRACK_API_KEY";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Base URL of the storm cell service
    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    /// Base URL of the airport risk service
    #[serde(default = "default_risk_url")]
    pub risk_url: String,

    /// API key for both services (optional, env var takes precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Simulated seconds per wall-clock second
    #[serde(default = "default_multiplier")]
    pub playback_multiplier: f64,

    /// Restart from departure when the route ends
    #[serde(default)]
    pub loop_playback: bool,

    /// Interval between playback ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Width of the weather time buckets in minutes
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: u32,

    /// Storm cell request timeout in seconds
    #[serde(default = "default_weather_timeout_secs")]
    pub weather_timeout_secs: u64,

    /// Airport risk request timeout in seconds
    #[serde(default = "default_risk_timeout_secs")]
    pub risk_timeout_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_weather_url() -> String {
    "http://localhost:8080/api/weather".to_string()
}

fn default_risk_url() -> String {
    "http://localhost:8080/api/airports".to_string()
}

fn default_multiplier() -> f64 {
    30.0
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_bucket_minutes() -> u32 {
    5
}

fn default_weather_timeout_secs() -> u64 {
    180
}

fn default_risk_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            weather_url: default_weather_url(),
            risk_url: default_risk_url(),
            api_key: None,
            playback_multiplier: default_multiplier(),
            loop_playback: false,
            tick_interval_ms: default_tick_interval_ms(),
            bucket_minutes: default_bucket_minutes(),
            weather_timeout_secs: default_weather_timeout_secs(),
            risk_timeout_secs: default_risk_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Resolve API key from environment variable or config
    pub fn resolve_api_key(&self) -> Option<String> {
        // Check environment variable first
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Some(key);
            }
        }

        // Fall back to config
        self.api_key.clone().filter(|s| !s.is_empty())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Engine configuration derived from these settings
    pub fn visualizer_config(&self) -> VisualizerConfig {
        let mut config = VisualizerConfig::default();
        config.weather.fetch_timeout = Duration::from_secs(self.weather_timeout_secs);
        config.weather.bucket_minutes = self.bucket_minutes;
        config.playback.multiplier = self.playback_multiplier;
        config.playback.bucket_minutes = self.bucket_minutes;
        config.playback.range = if self.loop_playback {
            ClockRange::Loop
        } else {
            ClockRange::Clamped
        };
        config.risk.fetch_timeout = Duration::from_secs(self.risk_timeout_secs);
        config
    }
}
