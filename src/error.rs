//! Error kinds for each collaborator boundary.
//!
//! None of these stop the tracker loop; callers log them and move on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all (closed channel, poisoned handle).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A record exists but does not decode as a sample sequence.
    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("data source io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display io: {0}")]
    Io(#[from] std::io::Error),
}
