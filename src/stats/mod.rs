//! Per-entity stats: logging, range queries, the facade over the content
//! tree, and the demo data seeder.

pub mod query;
pub mod seed;
pub mod service;
pub mod store;

pub use query::{Categories, Counts, DateRange, StatsLogs, Totals};
pub use seed::{SeedReport, Seeder};
pub use service::Stats;
pub use store::{LogReport, MetricsStore};
