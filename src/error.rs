use thiserror::Error;

/// Failures raised while resolving a single listing or loading history.
///
/// Everything here is recovered locally by the caller: the listing degrades
/// to placeholder values, or history resets to empty.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unknown reference scheme: {0}")]
    UnknownReference(String),
    #[error("image conversion failed for {path}: {reason}")]
    ConversionFailure { path: String, reason: String },
    #[error("malformed record {source_name}: {reason}")]
    MalformedRecord { source_name: String, reason: String },
    #[error("history file corrupt: {0}")]
    PersistenceCorrupt(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ListingError {
    pub fn malformed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        ListingError::MalformedRecord {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn conversion(path: impl Into<String>, reason: impl ToString) -> Self {
        ListingError::ConversionFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
