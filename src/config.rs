//! Configuration management for citizen-report
//!
//! Config file location:
//! - Linux: ~/.config/citizen-report/config.toml
//! - macOS: ~/Library/Application Support/citizen-report/config.toml
//! - Windows: %APPDATA%/citizen-report/config.toml
//!
//! You can override the config location by setting `CITIZEN_REPORT_CONFIG_PATH`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::calendar::CalendarLocale;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Reporting backend configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Geocoding provider configuration
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Submission pacing
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Signed-in citizen
    #[serde(default)]
    pub user: UserConfig,

    /// Calendar names used when rendering event dates
    #[serde(default)]
    pub locale: CalendarLocale,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

            let config: Config = toml::from_str(&content).with_context(|| {
                format!("Failed to parse config from {}", config_path.display())
            })?;

            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration and apply `CITIZEN_REPORT_*` environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, toml)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("CITIZEN_REPORT_CONFIG_PATH") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        let proj_dirs = ProjectDirs::from("org", "citizen-report", "citizen-report")
            .context("Could not determine project directories")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Create default config file if it doesn't exist
    pub fn init() -> Result<Self> {
        let config = Self::load()?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            config.save()?;
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_non_empty("CITIZEN_REPORT_API_URL") {
            self.api.base_url = url;
        }
        if let Some(timeout) = env_non_empty("CITIZEN_REPORT_API_TIMEOUT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            self.api.timeout_seconds = timeout;
        }
        if let Some(url) = env_non_empty("CITIZEN_REPORT_GEOCODING_URL") {
            self.geocoding.base_url = url;
        }
        if let Some(key) = env_non_empty("CITIZEN_REPORT_GEOCODING_KEY") {
            self.geocoding.api_key = key;
        }
        if let Some(user_id) = env_non_empty("CITIZEN_REPORT_USER_ID") {
            self.user.user_id = Some(user_id);
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reporting backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL hosting `/reports` and `/events`
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// API timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Whether to verify SSL certificates
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_timeout(),
            verify_ssl: default_true(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.citizen-report.org".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Geocoding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Full geocode endpoint URL; forward and reverse lookups both hit it
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,

    /// Provider API key, sent as `key`
    #[serde(default)]
    pub api_key: String,

    /// Preferred result language, sent as `language` when set
    #[serde(default = "default_language")]
    pub language: Option<String>,

    /// Geocoding timeout in seconds
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_seconds: u64,

    /// Quiet period before a typed query hits the network
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Number of recent queries whose results are reused
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Replacement for the provider's unnamed-road placeholder
    #[serde(default = "default_unknown_road_label")]
    pub unknown_road_label: String,

    /// Sentinel shown when the citizen picks their GPS position
    #[serde(default = "default_current_location_label")]
    pub current_location_label: String,
}

impl GeocodingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_url(),
            api_key: String::new(),
            language: default_language(),
            timeout_seconds: default_geocoding_timeout(),
            debounce_ms: default_debounce_ms(),
            cache_capacity: default_cache_capacity(),
            unknown_road_label: default_unknown_road_label(),
            current_location_label: default_current_location_label(),
        }
    }
}

fn default_geocoding_url() -> String {
    "https://api.opencagedata.com/geocode/v1/json".to_string()
}

fn default_language() -> Option<String> {
    Some("fr".to_string())
}

fn default_geocoding_timeout() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    350
}

fn default_cache_capacity() -> usize {
    32
}

fn default_unknown_road_label() -> String {
    "Route inconnue".to_string()
}

fn default_current_location_label() -> String {
    "Ma position".to_string()
}

/// Submission pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Pause after payload assembly so the "preparing" state is visible
    #[serde(default = "default_phase_delay_ms")]
    pub preparing_delay_ms: u64,

    /// Pause after the server answered, before reporting success
    #[serde(default = "default_phase_delay_ms")]
    pub finalizing_delay_ms: u64,

    /// How long to wait for the GPS address before using raw coordinates
    #[serde(default = "default_current_location_wait_ms")]
    pub current_location_wait_ms: u64,
}

impl SubmissionConfig {
    pub fn preparing_delay(&self) -> Duration {
        Duration::from_millis(self.preparing_delay_ms)
    }

    pub fn finalizing_delay(&self) -> Duration {
        Duration::from_millis(self.finalizing_delay_ms)
    }

    pub fn current_location_wait(&self) -> Duration {
        Duration::from_millis(self.current_location_wait_ms)
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            preparing_delay_ms: default_phase_delay_ms(),
            finalizing_delay_ms: default_phase_delay_ms(),
            current_location_wait_ms: default_current_location_wait_ms(),
        }
    }
}

fn default_phase_delay_ms() -> u64 {
    400
}

fn default_current_location_wait_ms() -> u64 {
    5_000
}

/// Signed-in citizen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Backend user id attached to reports (`userId`) and events (`organizerId`)
    pub user_id: Option<String>,
}

/// Get configuration file path for display purposes
pub fn get_config_path() -> Result<String> {
    let path = Config::config_path()?;
    Ok(path.display().to_string())
}
