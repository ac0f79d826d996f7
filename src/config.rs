//! TOML configuration parsing and validation.
//!
//! Only `[db]` is required; every other section falls back to defaults that
//! point at the public chart feed and the Spotify Web API.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/cache.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    #[serde(default = "default_chart_url")]
    pub base_url: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            base_url: default_chart_url(),
            top_n: default_top_n(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_chart_url() -> String {
    "https://raw.githubusercontent.com/mhollingshead/billboard-hot-100/main".to_string()
}
/// Chart entries kept per snapshot when `[chart].top_n` is not set.
pub const DEFAULT_TOP_N: usize = 10;

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            token_url: default_token_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl MetadataConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "spotify".to_string()
}
fn default_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}
fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chart.top_n == 0 {
        anyhow::bail!("chart.top_n must be >= 1");
    }
    if config.chart.timeout_secs == 0 || config.metadata.timeout_secs == 0 {
        anyhow::bail!("timeout_secs must be >= 1");
    }

    match config.metadata.provider.as_str() {
        "spotify" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown metadata provider: '{}'. Must be spotify or disabled.",
            other
        ),
    }

    Ok(())
}
