use std::{env, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use serde_with::serde_as;
use tokio::fs;

const CONFIG_PATH: &str = "Config.toml";

pub async fn load_config() -> anyhow::Result<Config> {
    let path = env::var("DORA_CONFIG").unwrap_or_else(|_| CONFIG_PATH.to_string());
    let contents = fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {path}"))?;

    let mut config = parse_config(&contents)?;
    if let Ok(url) = env::var("DATABASE_URL") {
        config.override_database_url(url);
    }
    Ok(config)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config = toml::from_str(contents)?;
    Ok(config)
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_url(url: String) -> Self {
        Self {
            url,
            max_connections: default_max_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Extra days fetched before a window's start for trend comparison.
    #[serde(default = "default_trend_lookback_days")]
    pub trend_lookback_days: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            trend_lookback_days: default_trend_lookback_days(),
        }
    }
}

fn default_trend_lookback_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    // no database section means the in-memory store
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    fn override_database_url(&mut self, url: String) {
        match &mut self.database {
            Some(database) => database.url = url,
            None => self.database = Some(DatabaseConfig::from_url(url)),
        }
    }
}
