//! End-to-end tests for logging and querying entity stats.
//!
//! Tests verify:
//! - Additivity of events within one bucket
//! - Range filtering and the default one-day range
//! - Merging of shards when a range spans two months
//! - Daily downsampling of hourly counts
//! - Concurrent logging through the facade

use page_stats::{Analysis, Resolution, Stats, StatsConfig, StatsError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

// 2024-01-01T00:00:00Z
const JAN_1: i64 = 1_704_067_200;
// 2024-02-01T00:00:00Z
const FEB_1: i64 = 1_706_745_600;
const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

fn open_stats(dir: &std::path::Path) -> Stats {
    Stats::open(StatsConfig::with_root(dir.join("stats"))).unwrap()
}

// ============================================================================
// LOGGING
// ============================================================================

#[test]
fn test_three_visits_in_one_hour_aggregate() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    for offset in [60, 600, 3000] {
        stats
            .log_at("a/b", JAN_1 + 10 * HOUR + offset, &Analysis::visit())
            .unwrap();
    }

    let logs = stats
        .logs("a/b", "2024-01-01", Some("2024-01-02"), Resolution::Hourly)
        .unwrap();
    assert_eq!(logs.counts.len(), 1);

    let counts = logs.counts[&(JAN_1 + 10 * HOUR)];
    assert_eq!(counts.views, 3);
    assert_eq!(counts.visits, 3);
}

#[test]
fn test_unloggable_request_writes_nothing() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    let report = stats.log_at("a/b", JAN_1, &Analysis::default()).unwrap();
    assert!(report.is_empty());
    assert!(!tmp_dir.path().join("stats").join("a").exists());
}

#[test]
fn test_categories_aggregate_per_day() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    let ff = Analysis::visit()
        .with_browser("ff@78")
        .with_referrer("news.example");
    let gc = Analysis::visit().with_browser("gc@84");

    stats.log_at("blog", JAN_1 + HOUR, &ff).unwrap();
    stats.log_at("blog", JAN_1 + 5 * HOUR, &gc).unwrap();
    stats.log_at("blog", JAN_1 + 20 * HOUR, &ff).unwrap();
    // A view alone never touches categories.
    stats
        .log_at("blog", JAN_1 + 21 * HOUR, &Analysis::view().with_browser("ie@8"))
        .unwrap();

    let logs = stats
        .logs("blog", "2024-01-01", None, Resolution::Hourly)
        .unwrap();
    assert_eq!(logs.categories.len(), 1);

    let day = &logs.categories[&JAN_1];
    let expected: BTreeMap<String, u64> =
        [("ff@78".to_string(), 2), ("gc@84".to_string(), 1)].into();
    assert_eq!(day.browsers, expected);
    assert_eq!(day.referrers["news.example"], 2);
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_range_excludes_records_outside() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    for day in 0..5 {
        stats
            .log_at("a", JAN_1 + day * DAY + HOUR, &Analysis::visit())
            .unwrap();
    }

    let logs = stats
        .logs("a", "2024-01-02", Some("2024-01-04"), Resolution::Hourly)
        .unwrap();
    let times: Vec<i64> = logs.counts.keys().copied().collect();
    assert_eq!(times, vec![JAN_1 + DAY + HOUR, JAN_1 + 2 * DAY + HOUR]);
    assert!(logs
        .categories
        .keys()
        .all(|t| *t >= JAN_1 + DAY && *t < JAN_1 + 3 * DAY));
}

#[test]
fn test_query_spanning_two_months_merges_shards() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    let times = [FEB_1 - 2 * HOUR, FEB_1 - HOUR, FEB_1, FEB_1 + HOUR];
    for time in times {
        stats.log_at("a", time, &Analysis::visit()).unwrap();
    }

    let logs = stats
        .logs("a", "2024-01-31", Some("2024-02-02"), Resolution::Hourly)
        .unwrap();
    assert_eq!(logs.counts.keys().copied().collect::<Vec<_>>(), times.to_vec());
    assert!(logs.counts.values().all(|c| c.views == 1 && c.visits == 1));

    let categories: Vec<i64> = logs.categories.keys().copied().collect();
    assert_eq!(categories, vec![FEB_1 - DAY, FEB_1]);
}

#[test]
fn test_daily_is_sum_of_hourly() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    for hour in 0..72 {
        let analysis = if hour % 3 == 0 {
            Analysis::visit()
        } else {
            Analysis::view()
        };
        for _ in 0..(hour % 4 + 1) {
            stats.log_at("a", JAN_1 + hour * HOUR, &analysis).unwrap();
        }
    }

    let hourly = stats
        .logs("a", "2024-01-01", Some("2024-01-04"), Resolution::Hourly)
        .unwrap();
    let daily = stats
        .logs("a", "2024-01-01", Some("2024-01-04"), Resolution::Daily)
        .unwrap();

    assert_eq!(daily.counts.len(), 3);
    for (day, counts) in &daily.counts {
        let (views, visits) = hourly
            .counts
            .range(*day..*day + DAY)
            .fold((0, 0), |(v, s), (_, c)| (v + c.views, s + c.visits));
        assert_eq!(counts.views, views);
        assert_eq!(counts.visits, visits);
    }
    assert_eq!(daily.categories, hourly.categories);
}

#[test]
fn test_logs_between_timestamps() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    for hour in 0..4 {
        stats.log_at("a", JAN_1 + hour * HOUR, &Analysis::view()).unwrap();
    }

    let logs = stats
        .logs_between("a", JAN_1 + HOUR, JAN_1 + 3 * HOUR, Resolution::Hourly)
        .unwrap();
    assert_eq!(
        logs.counts.keys().copied().collect::<Vec<_>>(),
        vec![JAN_1 + HOUR, JAN_1 + 2 * HOUR]
    );
}

#[test]
fn test_invalid_dates_are_rejected() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    assert!(matches!(
        stats.logs("a", "2024/01/01", None, Resolution::Hourly),
        Err(StatsError::InvalidDate(_))
    ));
    assert!(matches!(
        stats.logs("a", "2024-01-01", Some("tomorrow"), Resolution::Hourly),
        Err(StatsError::InvalidDate(_))
    ));
    assert!(matches!(
        "weekly".parse::<Resolution>(),
        Err(StatsError::InvalidResolution(_))
    ));
}

#[test]
fn test_inverted_range_is_empty() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());
    stats.log_at("a", JAN_1, &Analysis::visit()).unwrap();

    let logs = stats
        .logs("a", "2024-01-02", Some("2024-01-01"), Resolution::Hourly)
        .unwrap();
    assert!(logs.is_empty());
}

#[test]
fn test_totals_over_range() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = open_stats(tmp_dir.path());

    stats
        .log_at("a", JAN_1, &Analysis::visit().with_browser("ff@78"))
        .unwrap();
    stats.log_at("a", JAN_1 + DAY, &Analysis::view()).unwrap();
    stats
        .log_at("a", FEB_1, &Analysis::visit().with_browser("ff@78"))
        .unwrap();

    let totals = stats.totals("a", "2024-01-01", Some("2024-03-01")).unwrap();
    assert_eq!(totals.views, 3);
    assert_eq!(totals.visits, 2);
    assert_eq!(totals.browsers["ff@78"], 2);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_logging_loses_nothing() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let stats = Arc::new(open_stats(tmp_dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..20 {
                    let analysis = Analysis::visit().with_browser(format!("b{}", i % 2));
                    stats.log_at("shared/page", JAN_1 + HOUR, &analysis).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let totals = stats.totals("shared/page", "2024-01-01", None).unwrap();
    assert_eq!(totals.views, 160);
    assert_eq!(totals.visits, 160);
    assert_eq!(totals.browsers["b0"] + totals.browsers["b1"], 160);
}
