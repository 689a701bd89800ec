//! # Range Queries
//!
//! Date ranges, the query result shape, and the merge/filter/downsample steps
//! applied to records collected from month shards.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::codec::{CategoriesRecord, CounterMap, CountsRecord};
use crate::error::{Result, StatsError};
use crate::storage::{months_between, Month};
use crate::types::{bucket_start, Resolution, SECONDS_PER_DAY};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date. Exactly ten characters with
/// zero-padded month and day; surrounding whitespace is rejected.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    let well_formed = date.len() == 10
        && date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(StatsError::InvalidDate(date.to_string()));
    }

    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| StatsError::InvalidDate(date.to_string()))
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Half-open range `[from, to)` of epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: i64,
    pub to: i64,
}

impl DateRange {
    pub fn new(from: i64, to: i64) -> Self {
        DateRange { from, to }
    }

    /// From midnight UTC of `from` to midnight UTC of `to`. Without `to`, the
    /// range covers the single day `from`.
    pub fn parse(from: &str, to: Option<&str>) -> Result<Self> {
        let from_date = parse_date(from)?;
        let to_date = match to {
            Some(to) => parse_date(to)?,
            None => from_date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| StatsError::InvalidDate(from.to_string()))?,
        };

        Ok(DateRange {
            from: midnight_utc(from_date),
            to: midnight_utc(to_date),
        })
    }

    pub fn contains(&self, time: i64) -> bool {
        self.from <= time && time < self.to
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    /// Calendar months whose shards may hold records in this range.
    pub fn months(&self) -> Vec<Month> {
        months_between(self.from, self.to)
    }
}

// ================================================================================================
// RESULT SHAPE
// ================================================================================================

/// Views and visits of one counts bucket (or one day, when downsampled).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub views: u64,
    pub visits: u64,
}

impl Counts {
    fn add(&mut self, record: &CountsRecord) {
        self.views = self.views.saturating_add(record.views);
        self.visits = self.visits.saturating_add(record.visits);
    }
}

/// Browser and referrer counters of one categories bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    pub browsers: BTreeMap<String, u64>,
    pub referrers: BTreeMap<String, u64>,
}

impl Categories {
    fn add(&mut self, record: &CategoriesRecord) {
        add_counters(&mut self.browsers, &record.browsers);
        add_counters(&mut self.referrers, &record.referrers);
    }
}

fn add_counters(into: &mut BTreeMap<String, u64>, counters: &CounterMap) {
    for (name, count) in counters.iter() {
        saturating_increment(into, name, count);
    }
}

fn saturating_increment(into: &mut BTreeMap<String, u64>, name: &str, amount: u64) {
    let count = into.entry(name.to_string()).or_insert(0);
    *count = count.saturating_add(amount);
}

/// Both series of one entity over a range, keyed by bucket start, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsLogs {
    /// Counts at the requested resolution
    pub counts: BTreeMap<i64, Counts>,
    /// Categories at their stored (daily) granularity
    pub categories: BTreeMap<i64, Categories>,
}

impl StatsLogs {
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty() && self.categories.is_empty()
    }

    /// Everything in this result summed into one aggregate.
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for counts in self.counts.values() {
            totals.views = totals.views.saturating_add(counts.views);
            totals.visits = totals.visits.saturating_add(counts.visits);
        }
        for categories in self.categories.values() {
            for (name, count) in &categories.browsers {
                saturating_increment(&mut totals.browsers, name, *count);
            }
            for (name, count) in &categories.referrers {
                saturating_increment(&mut totals.referrers, name, *count);
            }
        }
        totals
    }
}

/// Range-wide sums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub views: u64,
    pub visits: u64,
    pub browsers: BTreeMap<String, u64>,
    pub referrers: BTreeMap<String, u64>,
}

// ================================================================================================
// MERGE / FILTER / DOWNSAMPLE
// ================================================================================================

/// Key counts records by bucket (or by day for [`Resolution::Daily`]),
/// keeping only those inside `range`. Records sharing a key are summed.
pub fn collect_counts<I>(records: I, range: &DateRange, resolution: Resolution) -> BTreeMap<i64, Counts>
where
    I: IntoIterator<Item = CountsRecord>,
{
    let mut series = BTreeMap::new();
    for record in records.into_iter().filter(|r| range.contains(r.time)) {
        let key = match resolution {
            Resolution::Hourly => record.time,
            Resolution::Daily => bucket_start(record.time, SECONDS_PER_DAY),
        };
        series
            .entry(key)
            .or_insert_with(Counts::default)
            .add(&record);
    }
    series
}

/// Key categories records by their stored bucket, keeping only those inside
/// `range`.
pub fn collect_categories<I>(records: I, range: &DateRange) -> BTreeMap<i64, Categories>
where
    I: IntoIterator<Item = CategoriesRecord>,
{
    let mut series = BTreeMap::new();
    for record in records.into_iter().filter(|r| range.contains(r.time)) {
        series
            .entry(record.time)
            .or_insert_with(Categories::default)
            .add(&record);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-01T00:00:00Z
    const T0: i64 = 1_704_067_200;
    const HOUR: i64 = 3600;

    fn counts(time: i64, views: u64, visits: u64) -> CountsRecord {
        CountsRecord { time, views, visits }
    }

    #[test]
    fn test_parse_range() {
        let range = DateRange::parse("2024-01-01", Some("2024-01-03")).unwrap();
        assert_eq!(range.from, T0);
        assert_eq!(range.to, T0 + 2 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_parse_range_defaults_to_one_day() {
        let range = DateRange::parse("2024-01-31", None).unwrap();
        assert_eq!(range.to - range.from, SECONDS_PER_DAY);
        assert_eq!(range.months(), vec![Month::new(2024, 1)]);
    }

    #[test]
    fn test_parse_range_rejects_bad_dates() {
        for bad in [
            "",
            "2024-13-01",
            "2024-02-30",
            "01/02/2024",
            "yesterday",
            " 2024-01-01",
            "2024-01-01\n",
            "2024-1-1",
            "2024-01-1",
            "+2024-01-01",
        ] {
            assert!(
                matches!(DateRange::parse(bad, None), Err(StatsError::InvalidDate(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(matches!(
            DateRange::parse("2024-01-01", Some("2024-1-x")),
            Err(StatsError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = DateRange::parse("2024-01-05", Some("2024-01-01")).unwrap();
        assert!(range.is_empty());
        assert!(range.months().is_empty());
    }

    #[test]
    fn test_collect_counts_filters_half_open() {
        let range = DateRange::new(T0, T0 + 2 * HOUR);
        let series = collect_counts(
            vec![
                counts(T0 - HOUR, 9, 9),
                counts(T0, 1, 1),
                counts(T0 + HOUR, 2, 0),
                counts(T0 + 2 * HOUR, 9, 9),
            ],
            &range,
            Resolution::Hourly,
        );

        assert_eq!(series.keys().copied().collect::<Vec<_>>(), vec![T0, T0 + HOUR]);
        assert_eq!(series[&(T0 + HOUR)], Counts { views: 2, visits: 0 });
    }

    #[test]
    fn test_collect_counts_daily_sums_per_day() {
        let range = DateRange::new(T0, T0 + 2 * SECONDS_PER_DAY);
        let series = collect_counts(
            vec![
                counts(T0, 1, 1),
                counts(T0 + 5 * HOUR, 2, 1),
                counts(T0 + 23 * HOUR, 3, 0),
                counts(T0 + 24 * HOUR, 4, 4),
            ],
            &range,
            Resolution::Daily,
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series[&T0], Counts { views: 6, visits: 2 });
        assert_eq!(series[&(T0 + SECONDS_PER_DAY)], Counts { views: 4, visits: 4 });
    }

    #[test]
    fn test_collect_categories_merges_duplicates() {
        let mut first = CategoriesRecord {
            time: T0,
            ..Default::default()
        };
        first.browsers.increment("ff@78", 1);
        let mut second = first.clone();
        second.referrers.increment("example.com", 2);

        let series = collect_categories(vec![first, second], &DateRange::new(T0, T0 + 1));
        assert_eq!(series[&T0].browsers["ff@78"], 2);
        assert_eq!(series[&T0].referrers["example.com"], 2);
    }

    #[test]
    fn test_totals() {
        let range = DateRange::new(T0, T0 + SECONDS_PER_DAY);
        let mut category = CategoriesRecord {
            time: T0,
            ..Default::default()
        };
        category.browsers.increment("gc@84", 3);

        let logs = StatsLogs {
            counts: collect_counts(
                vec![counts(T0, 1, 1), counts(T0 + HOUR, 2, 1)],
                &range,
                Resolution::Hourly,
            ),
            categories: collect_categories(vec![category], &range),
        };

        let totals = logs.totals();
        assert_eq!(totals.views, 3);
        assert_eq!(totals.visits, 2);
        assert_eq!(totals.browsers["gc@84"], 3);
        assert!(totals.referrers.is_empty());
    }

    #[test]
    fn test_totals_saturate_on_huge_counters() {
        let range = DateRange::new(T0, T0 + SECONDS_PER_DAY);
        let mut first = CategoriesRecord {
            time: T0,
            ..Default::default()
        };
        first.referrers.increment("example.com", u64::MAX);
        let mut second = first.clone();
        second.time = T0 + HOUR;

        let logs = StatsLogs {
            counts: collect_counts(
                vec![counts(T0, u64::MAX, 1), counts(T0 + HOUR, 5, u64::MAX)],
                &range,
                Resolution::Daily,
            ),
            categories: collect_categories(vec![first, second], &range),
        };
        assert_eq!(logs.counts[&T0], Counts { views: u64::MAX, visits: u64::MAX });

        let totals = logs.totals();
        assert_eq!(totals.views, u64::MAX);
        assert_eq!(totals.visits, u64::MAX);
        assert_eq!(totals.referrers["example.com"], u64::MAX);
    }

    #[test]
    fn test_result_serializes_with_kind_names() {
        let mut logs = StatsLogs::default();
        logs.counts.insert(T0, Counts { views: 1, visits: 0 });
        let json = serde_json::to_value(&logs).unwrap();
        assert_eq!(json["counts"]["1704067200"]["views"], 1);
        assert!(json["categories"].as_object().unwrap().is_empty());
    }
}
