//! # Monthly Shards
//!
//! Every log kind of an entity is split into one file per calendar month:
//!
//! ```text
//! {dir}/2024-01-counts.csv
//! {dir}/2024-01-categories.csv
//! {dir}/2024-02-counts.csv
//! ```
//!
//! This bounds the cost of reading a shard and of scanning back for its last
//! line to one month of buckets, however long the entity's history grows.

use chrono::{DateTime, Datelike, Utc};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::types::{LogKind, Month, ShardInfo};
use crate::error::{Result, StatsError};

const SHARD_EXTENSION: &str = "csv";

/// The month shards of one entity's storage directory.
#[derive(Debug, Clone)]
pub struct MonthlyShardSet {
    dir: PathBuf,
}

impl MonthlyShardSet {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        MonthlyShardSet {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a shard, whether or not it exists.
    pub fn path(&self, month: Month, kind: LogKind) -> PathBuf {
        self.dir.join(format!(
            "{}-{:02}-{}.{}",
            month.year, month.month, kind, SHARD_EXTENSION
        ))
    }

    /// Path of an existing shard. A missing shard is created empty when
    /// `create` is set, otherwise `None` is returned.
    pub fn shard(&self, month: Month, kind: LogKind, create: bool) -> Result<Option<PathBuf>> {
        let path = self.path(month, kind);
        if path.is_file() {
            return Ok(Some(path));
        }
        if !create {
            return Ok(None);
        }

        OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| StatsError::io(&path, e))?;
        Ok(Some(path))
    }

    /// All existing shards, optionally of one kind, ordered by month then kind.
    pub fn list(&self, kind: Option<LogKind>) -> Result<Vec<ShardInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StatsError::io(&self.dir, e)),
        };

        let mut shards: Vec<ShardInfo> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let (month, shard_kind) = parse_shard_name(path.file_name()?.to_str()?)?;
                if kind.is_some_and(|k| k != shard_kind) {
                    return None;
                }
                let size_bytes = entry.metadata().ok()?.len();
                Some(ShardInfo {
                    month,
                    kind: shard_kind,
                    path,
                    size_bytes,
                })
            })
            .collect();

        shards.sort_by_key(|shard| (shard.month, shard.kind));
        Ok(shards)
    }
}

/// Month of a UTC timestamp in epoch seconds.
pub fn month_of(time: i64) -> Month {
    let date = DateTime::<Utc>::from_timestamp(time, 0).unwrap_or_default();
    Month::new(date.year(), date.month())
}

/// Every month touched by the half-open range `[from, to)`, in order.
pub fn months_between(from: i64, to: i64) -> Vec<Month> {
    if to <= from {
        return Vec::new();
    }

    let last = month_of(to - 1);
    let mut month = month_of(from);
    let mut months = vec![month];
    while month < last {
        month = month.next();
        months.push(month);
    }
    months
}

fn parse_shard_name(name: &str) -> Option<(Month, LogKind)> {
    let stem = name.strip_suffix(SHARD_EXTENSION)?.strip_suffix('.')?;
    let mut parts = stem.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let kind = parts.next()?.parse::<LogKind>().ok()?;
    (1..=12)
        .contains(&month)
        .then_some((Month::new(year, month), kind))
}
