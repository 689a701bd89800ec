//! # Page Stats
//!
//! Time-bucketed view and visit statistics stored as flat text files.
//!
//! # Architecture
//! - One storage container per entity, in a hierarchical content tree
//! - Two logs per entity: hourly **counts** (views, visits) and daily
//!   **categories** (browsers, referrers)
//! - Each log is sharded by calendar month; only the last line of a shard is
//!   ever rewritten
//! - Reads merge shards, filter to a date range, and optionally downsample
//!   counts to daily
//!
//! ```no_run
//! use page_stats::{Analysis, Resolution, Stats, StatsConfig};
//!
//! let stats = Stats::open(StatsConfig::with_root("./var/stats"))?;
//! stats.log("blog/hello", &Analysis::visit().with_browser("ff@78"))?;
//! let logs = stats.logs("blog/hello", "2024-01-01", Some("2024-02-01"), Resolution::Daily)?;
//! # Ok::<(), page_stats::StatsError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod stats;
pub mod storage;
pub mod types;

pub use codec::{BucketRecord, CategoriesRecord, CounterMap, CountsRecord};
pub use config::StatsConfig;
pub use error::{Result, StatsError};
pub use hierarchy::{ContentTree, FsContentTree, Resolver};
pub use stats::{
    Categories, Counts, DateRange, LogReport, MetricsStore, SeedReport, Seeder, Stats, StatsLogs,
    Totals,
};
pub use storage::{LogKind, LogOutcome, Month, MonthlyShardSet, TimeBucketLog};
pub use types::{Analysis, Resolution};
