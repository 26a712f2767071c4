use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::HttpMethod;

/// Polling defaults (`[poll]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Base interval in milliseconds; also the delay before the first request.
    pub interval_ms: u64,
    /// Interval multiplier after each continuing success (1.0 = constant).
    pub backoff_factor: f64,
    /// Optional upper bound on the grown interval, in milliseconds.
    pub max_interval_ms: Option<u64>,
    /// Retries after a failed request (0 = stop on first failure).
    pub retry_count: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            backoff_factor: 1.0,
            max_interval_ms: None,
            retry_count: 0,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Option<Duration> {
        self.max_interval_ms.map(Duration::from_millis)
    }
}

/// HTTP request defaults (`[http]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub method: HttpMethod,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            connect_timeout_secs: 15,
            timeout_secs: 30,
            headers: BTreeMap::new(),
        }
    }
}

/// Global configuration loaded from `~/.config/repoll/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepollConfig {
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("repoll")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RepollConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RepollConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<RepollConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RepollConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
