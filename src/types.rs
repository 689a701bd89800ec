//! Core types shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StatsError;

pub const SECONDS_PER_HOUR: i64 = 60 * 60;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Current time in seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Floor `time` to the start of the `interval`-wide bucket containing it.
#[inline]
pub fn bucket_start(time: i64, interval: i64) -> i64 {
    time.saturating_sub(time.rem_euclid(interval))
}

/// Classification of a single inbound request, produced by the request
/// classifier upstream of this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub view: bool,
    pub visit: bool,
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub referrer_host: Option<String>,
}

impl Analysis {
    pub fn view() -> Self {
        Analysis {
            view: true,
            ..Default::default()
        }
    }

    pub fn visit() -> Self {
        Analysis {
            view: true,
            visit: true,
            ..Default::default()
        }
    }

    pub fn with_browser(mut self, browser_id: impl Into<String>) -> Self {
        self.browser_id = Some(browser_id.into());
        self
    }

    pub fn with_referrer(mut self, referrer_host: impl Into<String>) -> Self {
        self.referrer_host = Some(referrer_host.into());
        self
    }

    /// Whether this request produces any record at all.
    pub fn is_loggable(&self) -> bool {
        self.view || self.visit
    }
}

/// Granularity of the counts series in a query result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Hourly,
    Daily,
}

impl FromStr for Resolution {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Resolution::Hourly),
            "daily" => Ok(Resolution::Daily),
            other => Err(StatsError::InvalidResolution(other.to_string())),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Hourly => f.write_str("hourly"),
            Resolution::Daily => f.write_str("daily"),
        }
    }
}
