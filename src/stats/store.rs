//! # Metrics Store
//!
//! Per-entity orchestration of the two logs:
//! - **counts**: views and visits per hourly bucket, written for every view
//!   or visit
//! - **categories**: browser and referrer counters per daily bucket, written
//!   only for visits
//!
//! Both are sharded by calendar month of the event time.

use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::query::{collect_categories, collect_counts, DateRange, StatsLogs, Totals};
use crate::codec::{BucketRecord, CategoriesRecord, CounterMap, CountsRecord};
use crate::config::StatsConfig;
use crate::error::Result;
use crate::storage::{month_of, LogKind, LogOutcome, Month, MonthlyShardSet, TimeBucketLog, Upsert};
use crate::types::{now_secs, Analysis, Resolution};

/// What a single `log` call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogReport {
    pub counts: Option<LogOutcome>,
    pub categories: Option<LogOutcome>,
}

impl LogReport {
    pub fn is_empty(&self) -> bool {
        self.counts.is_none() && self.categories.is_none()
    }
}

/// Stats of one entity, stored in the entity's container directory.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    id: String,
    shards: MonthlyShardSet,
    counts_interval: i64,
    categories_interval: i64,
}

impl MetricsStore {
    /// A store for entity `id` whose container lives at `dir`. The directory
    /// must already exist; the store never creates containers.
    pub fn new<P: AsRef<Path>>(id: impl Into<String>, dir: P, config: &StatsConfig) -> Self {
        MetricsStore {
            id: id.into(),
            shards: MonthlyShardSet::new(dir),
            counts_interval: config.counts_interval_secs,
            categories_interval: config.categories_interval_secs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        self.shards.dir()
    }

    pub fn shards(&self) -> &MonthlyShardSet {
        &self.shards
    }

    /// Counts log of `month`. Returns `None` for a missing shard unless
    /// `create` is set.
    pub fn counts_log(&self, month: Month, create: bool) -> Result<Option<TimeBucketLog<CountsRecord>>> {
        self.bucket_log(month, LogKind::Counts, self.counts_interval, create)
    }

    /// Categories log of `month`. Returns `None` for a missing shard unless
    /// `create` is set.
    pub fn categories_log(
        &self,
        month: Month,
        create: bool,
    ) -> Result<Option<TimeBucketLog<CategoriesRecord>>> {
        self.bucket_log(month, LogKind::Categories, self.categories_interval, create)
    }

    fn bucket_log<R: BucketRecord>(
        &self,
        month: Month,
        kind: LogKind,
        interval: i64,
        create: bool,
    ) -> Result<Option<TimeBucketLog<R>>> {
        Ok(self
            .shards
            .shard(month, kind, create)?
            .map(|path| TimeBucketLog::new(path, interval)))
    }

    // ============================================================================================
    // WRITE
    // ============================================================================================

    /// Record one request at the current time.
    pub fn log(&self, analysis: &Analysis) -> Result<LogReport> {
        self.log_at(now_secs(), analysis)
    }

    /// Record one request at `time`. Events must arrive in non-decreasing
    /// time order per entity; an event older than the last stored bucket is
    /// folded into that bucket.
    pub fn log_at(&self, time: i64, analysis: &Analysis) -> Result<LogReport> {
        let mut report = LogReport::default();
        if !analysis.is_loggable() {
            return Ok(report);
        }

        let month = month_of(time);

        if let Some(log) = self.counts_log(month, true)? {
            let views = analysis.view as u64;
            let visits = analysis.visit as u64;

            report.counts = Some(log.log(
                Upsert::new(
                    move |mut record: CountsRecord| {
                        record.views = record.views.saturating_add(views);
                        record.visits = record.visits.saturating_add(visits);
                        record
                    },
                    move || CountsRecord::new(views, visits),
                )
                .at(time),
            )?);
        }

        if analysis.visit {
            if let Some(log) = self.categories_log(month, true)? {
                let browser = counter_name("browser id", analysis.browser_id.as_deref());
                let referrer = counter_name("referrer host", analysis.referrer_host.as_deref());

                let apply = move |mut record: CategoriesRecord| {
                    if let Some(browser) = browser {
                        record.browsers.increment(browser, 1);
                    }
                    if let Some(referrer) = referrer {
                        record.referrers.increment(referrer, 1);
                    }
                    record
                };

                report.categories = Some(log.log(
                    Upsert::new(apply, move || apply(CategoriesRecord::default())).at(time),
                )?);
            }
        }

        debug!("Logged {} at {}: {:?}", self.id, time, report);
        Ok(report)
    }

    // ============================================================================================
    // READ
    // ============================================================================================

    /// Both series between two `YYYY-MM-DD` dates (`to` exclusive, defaulting
    /// to the day after `from`).
    pub fn logs(&self, from: &str, to: Option<&str>, resolution: Resolution) -> Result<StatsLogs> {
        let range = DateRange::parse(from, to)?;
        self.logs_in(&range, resolution)
    }

    /// Both series within `range`, merged across month shards.
    pub fn logs_in(&self, range: &DateRange, resolution: Resolution) -> Result<StatsLogs> {
        let mut counts = Vec::new();
        let mut categories = Vec::new();

        for month in range.months() {
            if let Some(log) = self.counts_log(month, false)? {
                counts.extend(log.read()?);
            }
            if let Some(log) = self.categories_log(month, false)? {
                categories.extend(log.read()?);
            }
        }

        Ok(StatsLogs {
            counts: collect_counts(counts, range, resolution),
            categories: collect_categories(categories, range),
        })
    }

    /// Both series within `[from_ts, to_ts)` epoch seconds.
    pub fn logs_between(&self, from_ts: i64, to_ts: i64, resolution: Resolution) -> Result<StatsLogs> {
        self.logs_in(&DateRange::new(from_ts, to_ts), resolution)
    }

    /// Range-wide sums between two `YYYY-MM-DD` dates.
    pub fn totals(&self, from: &str, to: Option<&str>) -> Result<Totals> {
        Ok(self.logs(from, to, Resolution::Daily)?.totals())
    }

    /// Paths of every existing shard, oldest first.
    pub fn shard_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .shards
            .list(None)?
            .into_iter()
            .map(|shard| shard.path)
            .collect())
    }
}

fn counter_name<'a>(what: &str, name: Option<&'a str>) -> Option<&'a str> {
    let name = name?;
    if CounterMap::is_valid_name(name) {
        Some(name)
    } else {
        warn!("Ignoring {} {:?}: not a valid counter name", what, name);
        None
    }
}
