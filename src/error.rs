//! Error types shared by every layer of the stats store.

use std::io;
use std::path::{Path, PathBuf};

/// Errors produced while logging or querying stats.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// A query date was missing or not a `YYYY-MM-DD` calendar date.
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A query resolution other than `hourly` or `daily`.
    #[error("invalid resolution {0:?}, expected \"hourly\" or \"daily\"")]
    InvalidResolution(String),

    /// An entity id that cannot be mapped onto the content tree.
    #[error("invalid entity id {0:?}")]
    InvalidEntityId(String),

    /// A stored line or field does not match its grammar.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// The content tree refused to create a container or one of its ancestors.
    #[error("failed to create storage for {id:?}: {reason}")]
    StorageCreate { id: String, reason: String },

    /// Configuration values that cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StatsError {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        StatsError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        StatsError::Decode {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn storage_create(id: impl Into<String>, reason: impl ToString) -> Self {
        StatsError::StorageCreate {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
