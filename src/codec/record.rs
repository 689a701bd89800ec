//! # Bucket Records
//!
//! One aggregate per time bucket, stored as one comma-separated line:
//!
//! ```text
//! time,views,visits                 (counts log)
//! time,browsers,referrers           (categories log)
//! ```
//!
//! `time` is always the first field. Values are written without escaping, so
//! they must never contain commas or line breaks. Lines with fewer values than
//! the schema decode with the missing trailing fields absent; extra trailing
//! values are ignored, which lets a schema grow at the end.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::counter_map::CounterMap;
use crate::error::{Result, StatsError};

pub const TIME_FIELD: &str = "time";

/// A record type that can live in a time-bucketed log file.
pub trait BucketRecord: Sized {
    /// Field names following `time`, in file order.
    const FIELDS: &'static [&'static str];

    /// Start of the bucket this record aggregates.
    fn time(&self) -> i64;

    fn set_time(&mut self, time: i64);

    /// Values for [`Self::FIELDS`] in order. `None` is written as an empty value.
    fn field_values(&self) -> Vec<Option<String>>;

    /// Rebuild a record from positional values aligned with [`Self::FIELDS`].
    fn from_field_values(time: i64, values: &[Option<&str>]) -> Result<Self>;
}

/// Full schema of `R`, `time` first.
pub fn schema<R: BucketRecord>() -> Vec<&'static str> {
    std::iter::once(TIME_FIELD)
        .chain(R::FIELDS.iter().copied())
        .collect()
}

pub fn encode<R: BucketRecord>(record: &R) -> String {
    let mut values = Vec::with_capacity(R::FIELDS.len() + 1);
    values.push(record.time().to_string());
    values.extend(
        record
            .field_values()
            .into_iter()
            .map(|value| value.unwrap_or_default()),
    );
    values.join(",")
}

pub fn decode<R: BucketRecord>(line: &str) -> Result<R> {
    let values = split_line(line, R::FIELDS.len() + 1);
    let time = match values[0] {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| StatsError::decode("record time", format!("{:?}: {}", raw, e)))?,
        None => return Err(StatsError::decode("record", "missing time")),
    };
    R::from_field_values(time, &values[1..])
}

/// Split `line` positionally into exactly `field_count` slots. Empty and
/// missing values are `None`.
pub fn split_line(line: &str, field_count: usize) -> Vec<Option<&str>> {
    let mut tokens = line.split(',');
    (0..field_count)
        .map(|_| tokens.next().filter(|token| !token.is_empty()))
        .collect()
}

/// Decode a line against an arbitrary schema into a JSON object. With
/// `convert_numerics`, values that parse as numbers become JSON numbers.
pub fn decode_raw(line: &str, fields: &[&str], convert_numerics: bool) -> Map<String, Value> {
    split_line(line, fields.len())
        .into_iter()
        .zip(fields)
        .map(|(value, field)| {
            let value = match value {
                None => Value::Null,
                Some(raw) if convert_numerics => numeric_value(raw)
                    .unwrap_or_else(|| Value::String(raw.to_string())),
                Some(raw) => Value::String(raw.to_string()),
            };
            (field.to_string(), value)
        })
        .collect()
}

fn numeric_value(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_count(field: &str, value: Option<&str>) -> Result<u64> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| StatsError::decode(field, format!("{:?}: {}", raw, e))),
    }
}

fn parse_counters(value: Option<&str>) -> Result<CounterMap> {
    value.map_or_else(|| Ok(CounterMap::new()), CounterMap::decode)
}

// ================================================================================================
// COUNTS LOG
// ================================================================================================

/// Views and visits within one bucket of the counts log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsRecord {
    pub time: i64,
    pub views: u64,
    pub visits: u64,
}

impl CountsRecord {
    pub fn new(views: u64, visits: u64) -> Self {
        CountsRecord {
            time: 0,
            views,
            visits,
        }
    }
}

impl BucketRecord for CountsRecord {
    const FIELDS: &'static [&'static str] = &["views", "visits"];

    fn time(&self) -> i64 {
        self.time
    }

    fn set_time(&mut self, time: i64) {
        self.time = time;
    }

    fn field_values(&self) -> Vec<Option<String>> {
        vec![Some(self.views.to_string()), Some(self.visits.to_string())]
    }

    fn from_field_values(time: i64, values: &[Option<&str>]) -> Result<Self> {
        Ok(CountsRecord {
            time,
            views: parse_count("views", values.first().copied().flatten())?,
            visits: parse_count("visits", values.get(1).copied().flatten())?,
        })
    }
}

// ================================================================================================
// CATEGORIES LOG
// ================================================================================================

/// Browser and referrer counters within one bucket of the categories log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesRecord {
    pub time: i64,
    pub browsers: CounterMap,
    pub referrers: CounterMap,
}

impl BucketRecord for CategoriesRecord {
    const FIELDS: &'static [&'static str] = &["browsers", "referrers"];

    fn time(&self) -> i64 {
        self.time
    }

    fn set_time(&mut self, time: i64) {
        self.time = time;
    }

    fn field_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.browsers.encode()).filter(|s| !s.is_empty()),
            Some(self.referrers.encode()).filter(|s| !s.is_empty()),
        ]
    }

    fn from_field_values(time: i64, values: &[Option<&str>]) -> Result<Self> {
        Ok(CategoriesRecord {
            time,
            browsers: parse_counters(values.first().copied().flatten())?,
            referrers: parse_counters(values.get(1).copied().flatten())?,
        })
    }
}
