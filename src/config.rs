//! TOML configuration for the daemon and the command-line tools.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::models::TravelMode;

/// Environment variable that overrides `google.api_key`
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub google: GoogleConfig,
    pub sync: SyncConfig,
    pub geocode: GeocodeConfig,
    pub routing: RoutingConfig,
    pub proximity: ProximityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the location store, e.g. "http://localhost:3001"
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: String,
    pub geocode_url: String,
    pub directions_url: String,
    /// HTTP-level timeout for provider requests
    pub timeout_ms: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            geocode_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            directions_url: "https://maps.googleapis.com/maps/api/directions/json".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl GoogleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Maximum number of cached addresses (at least 1)
    pub cache_capacity: usize,
    /// Decimal places kept when rounding coordinates into cache keys
    pub precision: u32,
    pub lookup_timeout_ms: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            precision: 6,
            lookup_timeout_ms: 5000,
        }
    }
}

/// Finest rounding allowed for geocode cache keys
pub const MAX_KEY_PRECISION: u32 = 9;

impl GeocodeConfig {
    /// Configured precision, capped at [`MAX_KEY_PRECISION`]
    pub fn key_precision(&self) -> u32 {
        self.precision.min(MAX_KEY_PRECISION)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutingConfig {
    pub timeout_ms: u64,
    pub default_mode: TravelMode,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            default_mode: TravelMode::Driving,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProximityConfig {
    pub threshold_m: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self { threshold_m: 500.0 }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults; then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.google.api_key = key;
            }
        }
        self
    }
}
