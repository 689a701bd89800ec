//! Flat-file storage for bucketed stats.
//!
//! Two layers:
//! - **Bucket log**: one file, at most one record per time bucket, last
//!   record rewritten in place until its bucket is superseded
//! - **Shard set**: one bucket log per calendar month and log kind
//!
//! Files are created lazily on first write and never deleted here.

pub mod bucket_log;
pub mod shard;
pub mod types;

pub use bucket_log::{last_line, LastLine, TimeBucketLog, Upsert};
pub use shard::{month_of, months_between, MonthlyShardSet};
pub use types::{LogKind, LogOutcome, Month, ShardInfo};
