//! # syncwatch
//!
//! Watches Syncthing folders for filesystem changes and asks Syncthing to rescan
//! exactly the parts that changed, instead of waiting for its periodic full scans.
//!
//! ## Features
//!
//! - **Burst collapsing**: many file events become a few directory scans, governed by a
//!   per-directory density threshold
//! - **Self-change suppression**: writes performed by Syncthing itself are recognised
//!   from its `ItemStarted` events and never echoed back
//! - **Ignore rules**: Syncthing's ignore patterns, including exceptions, are applied
//!   before anything is tracked
//! - **Delayed full rescans**: Syncthing is periodically told to push its own rescan
//!   back, since changes are observed as they happen
//! - **Live reconfiguration**: folders added, removed or moved in Syncthing are picked up
//!   without restarting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use syncwatch::{
//!     config::{ClientConfig, FolderFilter, WatchConfig},
//!     syncthing::client::SyncthingClient,
//!     watcher::service::WatcherService,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatchConfig::default();
//! let client = SyncthingClient::new(ClientConfig::default().with_target("localhost:8384"))?
//!     .with_delay_scan(config.delay_scan);
//! client.wait_until_ready().await?;
//!
//! let mut service = WatcherService::create(
//!     Arc::new(client),
//!     config,
//!     FolderFilter::All,
//!     Duration::from_secs(5),
//! );
//! service.refresh().await?;
//! service.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **[`ignore`]**: path exclusion rules
//! - **[`watcher`]**: per-folder change accumulation, aggregation and supervision
//! - **[`syncthing`]**: REST client and event stream
//! - **[`config`]**: tuning and connection settings
//! - **[`error`]**: unified error type
//!
//! ## Aggregation
//!
//! A batch of changed paths is reduced to scan targets by
//! [`watcher::aggregate::aggregate`]:
//!
//! ```rust
//! use std::path::Path;
//! use syncwatch::watcher::aggregate::aggregate;
//! use syncwatch::watcher::classify::PathKind;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = |_: &Path| PathKind::File;
//! let changed = vec!["a/1".to_string(), "a/2".to_string(), "b/3".to_string()];
//!
//! let targets = aggregate(Path::new("/data"), &changed, 2, &files)?;
//! assert_eq!(targets, vec!["a".to_string(), "b/3".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`SyncWatchResult<T>`], wrapping [`SyncWatchError`].
//! Failed scan requests are not errors for the caller: the accumulator keeps the
//! batch and retries it on a later tick.

pub mod config;
pub mod error;
pub mod ignore;
pub mod syncthing;
pub mod watcher;

/// Re-exports the most commonly used types for convenience.
pub use error::{SyncWatchError, SyncWatchResult};
