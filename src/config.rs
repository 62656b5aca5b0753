//! TOML configuration.
//!
//! Loaded once at startup and shared read-only (`Arc<Config>`) with every
//! request handler.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! config_page = "README.md"
//!
//! [index]
//! root = "/var/lib/ci-search/index"
//! job_url_base = "https://prow.example.com/view/gs/logs"
//!
//! [search]
//! time_budget_secs = 30
//! max_age = "168h"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::query::parse_go_duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Document served at `/config`. Relative paths resolve against the
    /// working directory.
    #[serde(default)]
    pub config_page: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            config_page: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub root: PathBuf,
    /// Prefix for job links; rows in the summary view need one.
    #[serde(default)]
    pub job_url_base: Option<String>,
    #[serde(default = "default_stats_refresh_secs")]
    pub stats_refresh_secs: u64,
}

fn default_stats_refresh_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
    /// Go-style duration; `"0"` means seven days.
    #[serde(default = "default_max_age")]
    pub max_age: String,
    #[serde(default = "default_max_hit_lines")]
    pub max_hit_lines: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: default_time_budget_secs(),
            max_age: default_max_age(),
            max_hit_lines: default_max_hit_lines(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_time_budget_secs() -> u64 {
    30
}
fn default_max_age() -> String {
    "0".to_string()
}
fn default_max_hit_lines() -> usize {
    30
}
fn default_max_file_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Config {
    /// Configuration for an index at `root` with every other setting defaulted.
    pub fn for_index(root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            index: IndexConfig {
                root: root.into(),
                job_url_base: None,
                stats_refresh_secs: default_stats_refresh_secs(),
            },
            search: SearchConfig::default(),
        }
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.search.time_budget_secs)
    }

    /// Server-side age ceiling; zero means the query default applies.
    pub fn max_age(&self) -> Duration {
        parse_go_duration(&self.search.max_age)
            .map(|(_, d)| d)
            .unwrap_or(Duration::ZERO)
    }

    pub fn job_url_base(&self) -> Option<Url> {
        self.index
            .job_url_base
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.time_budget_secs == 0 {
        anyhow::bail!("search.time_budget_secs must be > 0");
    }

    if config.search.max_hit_lines == 0 {
        anyhow::bail!("search.max_hit_lines must be > 0");
    }

    match parse_go_duration(&config.search.max_age) {
        Ok((false, _)) => {}
        Ok((true, d)) if d.is_zero() => {}
        Ok((true, _)) => anyhow::bail!("search.max_age must be non-negative"),
        Err(e) => anyhow::bail!("search.max_age is invalid: {}", e),
    }

    if let Some(base) = &config.index.job_url_base {
        Url::parse(base).with_context(|| format!("index.job_url_base is not a URL: {}", base))?;
    }

    Ok(())
}
