use std::io;
use thiserror::Error;

/// Errors from building a query matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Ambiguous precedence: {0}")]
    AmbiguousPrecedence(String),
}

/// Errors from one index-build pass over a file. Each is reported and the
/// file is skipped for the pass.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Carry buffer exceeded {0} bytes")]
    CarryTooLarge(usize),

    #[error("Start position is beyond the end of the stream")]
    StartBeyondEof,
}

/// Errors persisting or restoring the index cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-file search failures, captured into the per-file `{status,
/// error_msg}` response fields.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("File not found in index list")]
    NotIndexed,

    #[error("Time range not covered by index")]
    NotCovered,

    #[error("Index start position is out of file range")]
    StartOutOfRange,

    #[error("Index end position is out of file range")]
    EndOutOfRange,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Carry buffer exceeded {0} bytes")]
    CarryTooLarge(usize),
}

impl From<IndexError> for SearchError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Io(e) => SearchError::Io(e),
            IndexError::Decompress(msg) => SearchError::Decompress(msg),
            IndexError::CarryTooLarge(limit) => SearchError::CarryTooLarge(limit),
            IndexError::StartBeyondEof => SearchError::StartOutOfRange,
        }
    }
}
