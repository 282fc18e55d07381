use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncWatchError {
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("syncthing is not ready: {0}")]
    NotReady(String),

    #[error("not authorized by syncthing")]
    Unauthorized,

    #[error("no changes to aggregate")]
    NothingToAggregate,

    #[error("shutdown requested")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl SyncWatchError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncWatchError::Http(_) | SyncWatchError::NotReady(_) | SyncWatchError::Io(_)
        )
    }
}

pub type SyncWatchResult<T> = Result<T, SyncWatchError>;
