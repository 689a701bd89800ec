//! # Stats Configuration
//!
//! Where the content tree lives and how wide the buckets of each log kind are.
//! Values come from defaults, an optional JSON file, and `STATS_*` environment
//! overrides, in that order.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StatsError};
use crate::types::{SECONDS_PER_DAY, SECONDS_PER_HOUR};

/// Stats store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Directory holding the root container of the content tree
    pub root_dir: PathBuf,

    /// Slug of the root container
    pub root_slug: String,

    /// Title written into the root container's metadata
    pub root_title: String,

    /// Bucket width of the counts (views/visits) log, in seconds
    pub counts_interval_secs: i64,

    /// Bucket width of the categories (browsers/referrers) log, in seconds
    pub categories_interval_secs: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            root_dir: PathBuf::from("./var/stats"),
            root_slug: "stats".to_string(),
            root_title: "Stats".to_string(),
            counts_interval_secs: SECONDS_PER_HOUR,
            categories_interval_secs: SECONDS_PER_DAY,
        }
    }
}

impl StatsConfig {
    /// Defaults rooted at `root_dir`.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        StatsConfig {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| StatsError::io(path, e))?;
        let config: StatsConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `STATS_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = StatsConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `STATS_ROOT_DIR`, `STATS_COUNTS_INTERVAL_SECS`
    /// and `STATS_CATEGORIES_INTERVAL_SECS` when they are set.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("STATS_ROOT_DIR") {
            self.root_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("STATS_COUNTS_INTERVAL_SECS") {
            self.counts_interval_secs = parse_secs("STATS_COUNTS_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("STATS_CATEGORIES_INTERVAL_SECS") {
            self.categories_interval_secs =
                parse_secs("STATS_CATEGORIES_INTERVAL_SECS", &secs)?;
        }
        self.validate()
    }

    /// Both bucket widths must tile a day exactly, so a bucket never spans
    /// two days or two monthly shards.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("counts_interval_secs", self.counts_interval_secs),
            ("categories_interval_secs", self.categories_interval_secs),
        ] {
            if secs <= 0 || SECONDS_PER_DAY % secs != 0 {
                return Err(StatsError::Config(format!(
                    "{} must be a positive divisor of {}, got {}",
                    name, SECONDS_PER_DAY, secs
                )));
            }
        }
        if self.root_slug.is_empty() {
            return Err(StatsError::Config("root_slug must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_secs(name: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| StatsError::Config(format!("{}={:?}: {}", name, value, e)))
}
