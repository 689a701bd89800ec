//! # CounterMap
//!
//! A sparse table of named counters stored in a single text field as
//! space-separated `name=count` pairs, e.g. `ff@78=2 gc@84=1`.
//!
//! Names are kept sorted, so encoding is deterministic and a sorted encoded
//! string survives a decode/encode cycle byte for byte.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StatsError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterMap {
    counts: BTreeMap<String, u64>,
}

impl CounterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` can be stored without corrupting the encoding or the
    /// surrounding comma-separated record.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && !name
                .chars()
                .any(|c| matches!(c, '=' | ' ' | ',' | '\n' | '\r'))
    }

    /// Add `amount` to the counter `name`, starting from zero. Counters
    /// saturate at `u64::MAX`.
    pub fn increment(&mut self, name: &str, amount: u64) -> &mut Self {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count = count.saturating_add(amount);
        self
    }

    /// Pointwise sum of `other` into `self`.
    pub fn merge(&mut self, other: &CounterMap) -> &mut Self {
        for (name, count) in &other.counts {
            self.increment(name, *count);
        }
        self
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Sum of all counters, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |sum, count| sum.saturating_add(*count))
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.counts
    }

    pub fn encode(&self) -> String {
        self.counts
            .iter()
            .map(|(name, count)| format!("{}={}", name, count))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn decode(s: &str) -> Result<Self> {
        let mut map = CounterMap::new();

        for token in s.split(' ').filter(|t| !t.is_empty()) {
            let (name, count) = token
                .split_once('=')
                .ok_or_else(|| StatsError::decode("counter", format!("missing '=' in {:?}", token)))?;

            if name.is_empty() {
                return Err(StatsError::decode(
                    "counter",
                    format!("empty name in {:?}", token),
                ));
            }

            let count = count.parse::<u64>().map_err(|e| {
                StatsError::decode("counter", format!("bad count in {:?}: {}", token, e))
            })?;

            map.increment(name, count);
        }

        Ok(map)
    }
}

impl fmt::Display for CounterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CounterMap {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        CounterMap::decode(s)
    }
}

impl From<BTreeMap<String, u64>> for CounterMap {
    fn from(counts: BTreeMap<String, u64>) -> Self {
        CounterMap { counts }
    }
}

impl From<CounterMap> for BTreeMap<String, u64> {
    fn from(map: CounterMap) -> Self {
        map.counts
    }
}

impl FromIterator<(String, u64)> for CounterMap {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut map = CounterMap::new();
        for (name, count) in iter {
            map.increment(&name, count);
        }
        map
    }
}
