use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub credentials: Credentials,
    pub status: Status,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub backend: String, // "memory", "file" or "redis"
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub redis_dsn: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Status {
    pub backend: String, // "remote" or "offline"
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_per_sec")]
    pub max_per_sec: u32,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

impl Api {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Status {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_prefix() -> String {
    "versegate:session".to_owned()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_per_sec() -> u32 {
    10
}

fn default_min_interval_ms() -> u64 {
    100
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load the TOML settings file, then `VERSEGATE__SECTION__KEY` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("VERSEGATE").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
