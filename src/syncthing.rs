//! Everything that talks to Syncthing.
//!
//! The folder service only needs a handful of calls, collected in [`SyncthingApi`]
//! so that it can run against the real [`client::SyncthingClient`] or against an
//! in-memory double.

pub mod client;
pub mod events;

use crate::config::FolderConfig;
use crate::error::SyncWatchResult;
use crate::watcher::notifier::Notifier;
use async_trait::async_trait;
use events::RawEvent;

/// A source of Syncthing's event stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events with an id greater than `since`. May block until one arrives.
    async fn events(&self, since: u64) -> SyncWatchResult<Vec<RawEvent>>;
}

/// The control-plane calls used to set up and reconcile folder watches.
#[async_trait]
pub trait SyncthingApi: Notifier + EventSource {
    async fn folders(&self) -> SyncWatchResult<Vec<FolderConfig>>;

    /// Raw ignore patterns of a folder. [`crate::SyncWatchError::NotReady`] while
    /// Syncthing is still loading the folder.
    async fn ignore_patterns(&self, folder: &str) -> SyncWatchResult<Vec<String>>;

    async fn config_in_sync(&self) -> SyncWatchResult<bool>;

    /// Shows an error in Syncthing's GUI.
    async fn report_error(&self, message: &str) -> SyncWatchResult<()>;
}
