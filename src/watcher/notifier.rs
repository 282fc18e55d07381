use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Credentials were rejected; retrying cannot help.
    #[error("not authorized")]
    Unauthorized,

    #[error("{0}")]
    Retryable(String),
}

/// The write path to the synchronization service.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Asks for a scan of `targets` inside `folder`. An empty target means the whole folder.
    async fn notify(&self, folder: &str, targets: &[String]) -> Result<(), NotifyError>;

    /// Pushes the folder's next periodic full rescan `delay` into the future.
    async fn extend_rescan(&self, folder: &str, delay: Duration) -> Result<(), NotifyError>;
}
