use anyhow::{Context, Result, anyhow};
use chrono::TimeDelta;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    Units, WeatherError,
    cache::{DEFAULT_CAPACITY, DEFAULT_TTL_SECS},
    provider::openweather::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
    scheduler::{DEFAULT_POLLING_INTERVAL, DEFAULT_SHUTDOWN_GRACE},
    session::SessionSettings,
};

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "imperial"
///
/// [cache]
/// capacity = 10
/// ttl_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub units: Units,
    pub cache: CacheConfig,
    pub polling: PollingConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            units: Units::default(),
            cache: CacheConfig::default(),
            polling: PollingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_secs: DEFAULT_TTL_SECS as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLLING_INTERVAL.as_secs(),
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Result<Duration, WeatherError> {
        if self.timeout_secs == 0 {
            return Err(WeatherError::validation("http.timeout_secs must be greater than zero"));
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-sdk", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    /// API key from `OPENWEATHER_API_KEY`, falling back to the stored one.
    pub fn resolve_api_key(&self) -> Result<String> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        pick_api_key(from_env.as_deref(), self.api_key.as_deref())
    }

    pub fn session_settings(&self) -> Result<SessionSettings, WeatherError> {
        SessionSettings::try_from(self)
    }
}

fn pick_api_key(from_env: Option<&str>, stored: Option<&str>) -> Result<String> {
    [from_env, stored]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `weather configure` or set {API_KEY_ENV}."
            )
        })
}

impl TryFrom<&Config> for SessionSettings {
    type Error = WeatherError;

    fn try_from(cfg: &Config) -> Result<Self, Self::Error> {
        if cfg.cache.capacity == 0 {
            return Err(WeatherError::validation("cache.capacity must be greater than zero"));
        }
        let ttl_secs = i64::try_from(cfg.cache.ttl_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| WeatherError::validation("cache.ttl_secs must be a positive number"))?;
        if cfg.polling.interval_secs == 0 {
            return Err(WeatherError::validation("polling.interval_secs must be greater than zero"));
        }

        Ok(SessionSettings {
            cache_capacity: cfg.cache.capacity,
            cache_ttl: TimeDelta::try_seconds(ttl_secs)
                .ok_or_else(|| WeatherError::validation("cache.ttl_secs is out of range"))?,
            polling_interval: Duration::from_secs(cfg.polling.interval_secs),
            shutdown_grace: Duration::from_secs(cfg.polling.shutdown_grace_secs),
        })
    }
}
