//! TOML configuration shared by all binaries.
//!
//! Every section has defaults, so an empty or missing file is a valid
//! configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Environment variable that overrides `geocoding.api_key`.
pub const API_KEY_ENV: &str = "GEOCODE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub telecom: TelecomConfig,
    pub beeline: BeelineConfig,
    pub geocoding: GeocodingConfig,
    pub batch: BatchConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelecomConfig {
    pub base_url: String,
    pub referer: String,
    pub origin: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause after each region subtree
    pub region_delay_ms: u64,
    /// Pause after each district subtree
    pub district_delay_ms: u64,
    /// Pause after each town subtree
    pub town_delay_ms: u64,
}

impl Default for TelecomConfig {
    fn default() -> Self {
        Self {
            base_url: "https://telecom.kz/ru/api/v1.0".to_string(),
            referer: "https://telecom.kz/ru/technical-check".to_string(),
            origin: "https://telecom.kz".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
            region_delay_ms: 500,
            district_delay_ms: 200,
            town_delay_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BeelineConfig {
    pub base_url: String,
    pub city_id: u32,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub street_delay_ms: u64,
    /// Prepended to every address sent to the geocoder
    pub city_prefix: String,
    /// Spellings of the city prefix already present in upstream street names
    pub strip_prefixes: Vec<String>,
}

impl Default for BeelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://beeline.kz/restservices/telco".to_string(),
            city_id: 1,
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 30,
            street_delay_ms: 500,
            city_prefix: "Алматы г., ".to_string(),
            strip_prefixes: vec![
                "Алматы г., ".to_string(),
                "Алматы г, ".to_string(),
                "г.Алматы, ".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub fields: String,
    pub timeout_secs: u64,
    /// Retries allowed after the first rate-limited attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub requests_per_second: f64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://catalog.api.2gis.com/3.0/items/geocode".to_string(),
            api_key: String::new(),
            fields: "items.point,items.subtype,items.full_name".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            initial_delay_ms: 1000,
            jitter_min_ms: 1000,
            jitter_max_ms: 3000,
            requests_per_second: 1.0,
        }
    }
}

impl BeelineConfig {
    pub fn street_delay(&self) -> Duration {
        Duration::from_millis(self.street_delay_ms)
    }
}

impl GeocodingConfig {
    /// Minimum spacing between two geocoding requests.
    pub fn min_interval(&self) -> Duration {
        if !(self.requests_per_second > 0.0) {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(1.0 / self.requests_per_second).unwrap_or(Duration::MAX)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Records between two checkpoints
    pub batch_size: usize,
    pub checkpoint_dir: PathBuf,
    pub checkpoint_prefix: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            checkpoint_dir: PathBuf::from("."),
            checkpoint_prefix: "coordinates_partial_".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MergeConfig {
    /// Providers in order of preference when two rows share a location
    pub provider_priority: Vec<String>,
    /// Decimal places used for the deduplication key
    pub precision: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            provider_priority: vec!["beeline".to_string(), "telecom".to_string()],
            precision: 5,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults; then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.geocoding.api_key = key;
            }
        }

        Ok(config)
    }
}
