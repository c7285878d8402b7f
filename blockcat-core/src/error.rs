use thiserror::Error;

use crate::domain::PrefixCollision;

#[derive(Error, Debug)]
pub enum CategoryError {
    /// The backing store failed (connection loss, busy timeout, bad SQL). Never retried here.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage unavailable: connection lock poisoned")]
    StorageLock,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("data integrity anomaly: {0}")]
    DataIntegrity(PrefixCollision),

    /// Subtree totals under the named prefix do not fit in a count.
    #[error("count overflow: totals under \"{0}\" exceed the supported range")]
    CountOverflow(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CategoryError {
    /// True for failures of the underlying store, as opposed to answers about the data.
    pub fn is_storage(&self) -> bool {
        matches!(self, CategoryError::Storage(_) | CategoryError::StorageLock)
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, CategoryError>;
