//! # Stats Facade
//!
//! Entry point used by request handlers and the CLI. Maps entity ids to
//! [`MetricsStore`]s through the hierarchy resolver:
//! - `log` creates the entity's container (and its ancestors) on first use
//! - `logs` and `totals` never create anything; an unknown entity has no
//!   stats
//!
//! The root container is passed in at construction; there is no global
//! instance.

use log::debug;

use super::query::{DateRange, StatsLogs, Totals};
use super::store::{LogReport, MetricsStore};
use crate::config::StatsConfig;
use crate::error::Result;
use crate::hierarchy::{ContentTree, FsContentTree, Resolver};
use crate::types::{now_secs, Analysis, Resolution};

pub struct Stats<T: ContentTree = FsContentTree> {
    resolver: Resolver<T>,
    config: StatsConfig,
}

impl Stats<FsContentTree> {
    /// Open (creating if needed) the directory-backed tree at
    /// `config.root_dir`.
    pub fn open(config: StatsConfig) -> Result<Self> {
        config.validate()?;
        let tree = FsContentTree::new(&config.root_dir);
        let root = tree.open_root(&config.root_slug, &config.root_title)?;
        Stats::new(tree, root, config)
    }
}

impl<T: ContentTree> Stats<T> {
    /// Fails with [`StatsError::Config`](crate::error::StatsError::Config)
    /// when `config` does not validate.
    pub fn new(tree: T, root: T::Container, config: StatsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Stats {
            resolver: Resolver::new(tree, root),
            config,
        })
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver<T> {
        &self.resolver
    }

    /// Store of `id`, creating its container and missing ancestors.
    pub fn store(&self, id: &str) -> Result<MetricsStore> {
        let dir = self.resolver.resolve_dir(id)?;
        Ok(MetricsStore::new(id, dir, &self.config))
    }

    /// Store of `id` if its container already exists.
    pub fn find_store(&self, id: &str) -> Result<Option<MetricsStore>> {
        Ok(self
            .resolver
            .find_dir(id)?
            .map(|dir| MetricsStore::new(id, dir, &self.config)))
    }

    /// Record one request against `id` at the current time.
    pub fn log(&self, id: &str, analysis: &Analysis) -> Result<LogReport> {
        self.log_at(id, now_secs(), analysis)
    }

    /// Record one request against `id` at `time`. A request that is neither
    /// a view nor a visit touches nothing, not even the container.
    pub fn log_at(&self, id: &str, time: i64, analysis: &Analysis) -> Result<LogReport> {
        if !analysis.is_loggable() {
            debug!("Skipping {}: neither view nor visit", id);
            return Ok(LogReport::default());
        }
        self.store(id)?.log_at(time, analysis)
    }

    /// Both series of `id` between two `YYYY-MM-DD` dates.
    pub fn logs(
        &self,
        id: &str,
        from: &str,
        to: Option<&str>,
        resolution: Resolution,
    ) -> Result<StatsLogs> {
        let range = DateRange::parse(from, to)?;
        self.logs_in(id, &range, resolution)
    }

    pub fn logs_in(&self, id: &str, range: &DateRange, resolution: Resolution) -> Result<StatsLogs> {
        match self.find_store(id)? {
            Some(store) => store.logs_in(range, resolution),
            None => {
                debug!("No stats container for {}", id);
                Ok(StatsLogs::default())
            }
        }
    }

    pub fn logs_between(
        &self,
        id: &str,
        from_ts: i64,
        to_ts: i64,
        resolution: Resolution,
    ) -> Result<StatsLogs> {
        self.logs_in(id, &DateRange::new(from_ts, to_ts), resolution)
    }

    /// Range-wide sums of `id` between two `YYYY-MM-DD` dates.
    pub fn totals(&self, id: &str, from: &str, to: Option<&str>) -> Result<Totals> {
        Ok(self.logs(id, from, to, Resolution::Daily)?.totals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;

    // 2024-01-01T00:00:00Z
    const T0: i64 = 1_704_067_200;

    fn service(dir: &std::path::Path) -> Stats {
        Stats::open(StatsConfig::with_root(dir.join("stats"))).unwrap()
    }

    #[test]
    fn test_new_rejects_zero_interval() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let tree = FsContentTree::new(tmp_dir.path());
        let root = tree.open_root("stats", "Stats").unwrap();
        let config = StatsConfig {
            counts_interval_secs: 0,
            ..StatsConfig::with_root(tmp_dir.path())
        };

        assert!(matches!(
            Stats::new(tree, root, config),
            Err(StatsError::Config(_))
        ));
    }

    #[test]
    fn test_log_creates_container_chain() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let service = service(tmp_dir.path());

        service.log_at("blog/hello", T0, &Analysis::view()).unwrap();

        let root = tmp_dir.path().join("stats");
        assert!(root.join("blog").join("container.json").is_file());
        assert!(root.join("blog/hello/2024-01-counts.csv").is_file());
        assert!(!root.join("blog/2024-01-counts.csv").exists());
    }

    #[test]
    fn test_unloggable_request_creates_nothing() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let service = service(tmp_dir.path());

        let report = service.log_at("blog", T0, &Analysis::default()).unwrap();
        assert!(report.is_empty());
        assert!(service.find_store("blog").unwrap().is_none());
    }

    #[test]
    fn test_logs_of_unknown_entity_is_empty() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let service = service(tmp_dir.path());

        let logs = service
            .logs("nobody/here", "2024-01-01", None, Resolution::Hourly)
            .unwrap();
        assert!(logs.is_empty());
        assert!(service.find_store("nobody").unwrap().is_none());
    }

    #[test]
    fn test_logs_validates_dates_before_lookup() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let service = service(tmp_dir.path());

        assert!(matches!(
            service.logs("nobody", "not-a-date", None, Resolution::Daily),
            Err(StatsError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_entity_id() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let service = service(tmp_dir.path());

        assert!(matches!(
            service.log_at("../escape", T0, &Analysis::view()),
            Err(StatsError::InvalidEntityId(_))
        ));
    }
}
