//! Storage data structures.
//!
//! Defines the log kinds, shard identities and write outcomes shared by the
//! bucket log and the shard set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::StatsError;

/// The two logs kept for every entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Views and visits per fine bucket (hourly by default)
    Counts,
    /// Browser and referrer counters per coarse bucket (daily by default)
    Categories,
}

impl LogKind {
    pub fn all() -> [LogKind; 2] {
        [LogKind::Counts, LogKind::Categories]
    }

    /// Suffix used in shard file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Counts => "counts",
            LogKind::Categories => "categories",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counts" => Ok(LogKind::Counts),
            "categories" => Ok(LogKind::Categories),
            other => Err(StatsError::decode("log kind", other)),
        }
    }
}

/// A calendar month in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Self {
        Month { year, month }
    }

    /// The following calendar month.
    pub fn next(self) -> Self {
        if self.month >= 12 {
            Month::new(self.year + 1, 1)
        } else {
            Month::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = StatsError;

    /// Parse `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StatsError::decode("month", s);
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        if (1..=12).contains(&month) {
            Ok(Month::new(year, month))
        } else {
            Err(invalid())
        }
    }
}

/// One existing shard file on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub month: Month,
    pub kind: LogKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// What a single upsert did to its log file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutcome {
    /// The last record already covered the event and was rewritten in place.
    Updated { bucket: i64 },
    /// A fresh record was appended for a new bucket.
    Appended { bucket: i64 },
}

impl LogOutcome {
    pub fn bucket(&self) -> i64 {
        match *self {
            LogOutcome::Updated { bucket } | LogOutcome::Appended { bucket } => bucket,
        }
    }
}
