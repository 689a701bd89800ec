//! Text encodings used by the log files.
//!
//! - [`counter_map`]: `name=count name=count` counters packed into one field
//! - [`record`]: one comma-separated line per time bucket

pub mod counter_map;
pub mod record;

pub use counter_map::CounterMap;
pub use record::{BucketRecord, CategoriesRecord, CountsRecord};
