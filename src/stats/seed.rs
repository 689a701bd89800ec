//! # Demo Data Seeder
//!
//! Backfills a store with random traffic, one batch of events per hour.
//! Events go through the regular `log_at` path, so seeded shards are
//! indistinguishable from real ones. Seed only ranges with no existing data:
//! an hour older than a shard's last bucket is folded into that bucket.

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::query::DateRange;
use super::store::MetricsStore;
use crate::error::Result;
use crate::types::{bucket_start, Analysis, SECONDS_PER_HOUR};

pub const DEFAULT_BROWSERS: [&str; 3] = ["ff@78", "gc@84", "ie@8"];

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub hours: u64,
    pub events: u64,
    pub visits: u64,
}

#[derive(Debug, Clone)]
pub struct Seeder {
    /// Upper bound (inclusive) of events generated per hour
    pub max_events_per_hour: u32,
    /// Browser ids drawn uniformly for each event
    pub browsers: Vec<String>,
}

impl Default for Seeder {
    fn default() -> Self {
        Seeder {
            max_events_per_hour: 100,
            browsers: DEFAULT_BROWSERS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl Seeder {
    /// Log random events into `store` for every hour of `range`.
    pub fn seed<R: Rng>(
        &self,
        store: &MetricsStore,
        range: &DateRange,
        rng: &mut R,
    ) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        let mut hour = bucket_start(range.from, SECONDS_PER_HOUR);
        if hour < range.from {
            hour += SECONDS_PER_HOUR;
        }

        while hour < range.to {
            let events = rng.gen_range(0..=self.max_events_per_hour);
            for _ in 0..events {
                let mut analysis = Analysis::view();
                analysis.visit = rng.gen_bool(0.5);
                analysis.browser_id = self.browsers.choose(rng).cloned();

                store.log_at(hour, &analysis)?;
                report.events += 1;
                report.visits += analysis.visit as u64;
            }
            report.hours += 1;
            hour += SECONDS_PER_HOUR;
        }

        info!(
            "Seeded {} with {} events ({} visits) over {} hours",
            store.id(),
            report.events,
            report.visits,
            report.hours
        );
        Ok(report)
    }
}
