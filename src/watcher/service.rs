use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{FolderConfig, FolderFilter, WatchConfig},
    error::{SyncWatchError, SyncWatchResult},
    ignore::IgnoreMatcher,
    syncthing::{
        SyncthingApi,
        events::{EventPoller, RemoteEventKind, SyncthingEvent},
    },
    watcher::{
        accumulator::{Accumulator, RemoteEvent},
        classify::{FsClassifier, PathClassifier},
        notifier::Notifier,
        watcher::setup_file_watcher,
    },
};

/// Queue depth between the event router and one folder's accumulator.
const REMOTE_QUEUE: usize = 1024;

/// Folders with a shorter rescan interval get a hint in the log.
const SUGGESTED_RESCAN_S: i64 = 1800;

struct RunningFolder {
    config: FolderConfig,
    remote_tx: Sender<RemoteEvent>,
    cancel: CancellationToken,
    task: JoinHandle<SyncWatchResult<()>>,
}

/// Which folders a [`WatcherService::reconcile`] call touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    /// Folders whose watch could not be installed; they stay unwatched.
    pub failed: Vec<String>,
}

/// Runs one accumulator per watched folder and keeps the set in line with
/// Syncthing's configuration.
pub struct WatcherService<A: SyncthingApi + 'static> {
    api: Arc<A>,
    config: WatchConfig,
    filter: FolderFilter,
    ignore_prefixes: Vec<String>,
    retry_interval: Duration,
    classifier: Arc<dyn PathClassifier>,
    folders: HashMap<String, RunningFolder>,
    shutdown_token: CancellationToken,
}

impl<A: SyncthingApi + 'static> WatcherService<A> {
    pub fn create(
        api: Arc<A>,
        config: WatchConfig,
        filter: FolderFilter,
        retry_interval: Duration,
    ) -> Self {
        WatcherService {
            api,
            config,
            filter,
            ignore_prefixes: IgnoreMatcher::default_prefixes(),
            retry_interval,
            classifier: Arc::new(FsClassifier),
            folders: HashMap::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PathClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Cancelling this token stops [`WatcherService::run`] and every folder.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn running_folders(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.folders.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, folder: &str) -> bool {
        self.folders
            .get(folder)
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Installs the watch for one folder and spawns its accumulator.
    ///
    /// A malformed ignore pattern or an unusable root is returned as an error;
    /// a failed watch installation is additionally reported to Syncthing.
    pub async fn start_folder(&mut self, folder: FolderConfig) -> SyncWatchResult<()> {
        let root = folder.expanded_path()?;
        // Platform watchers may report resolved paths; strip against the same form.
        let root = match tokio::fs::canonicalize(&root).await {
            Ok(resolved) => resolved,
            Err(_) => root,
        };
        let patterns = self.fetch_ignore_patterns(&folder.id).await?;
        let ignores = Arc::new(IgnoreMatcher::new(self.ignore_prefixes.clone(), &patterns)?);
        debug!(folder = %folder.id, patterns = ignores.pattern_count(), "ignore patterns loaded");

        let (local_tx, local_rx) = mpsc::channel(self.config.max_tracked.max(1));
        let watcher = match setup_file_watcher(&root, ignores, local_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                error!(folder = %folder.id, error = %e, "failed to install watch");
                let message = format!("failed to install watch for {}", folder.id);
                if let Err(report) = self.api.report_error(&message).await {
                    warn!(folder = %folder.id, error = %report, "could not report error to syncthing");
                }
                return Err(e);
            }
        };

        let (remote_tx, remote_rx) = mpsc::channel(REMOTE_QUEUE);
        let cancel = self.shutdown_token.child_token();
        let notifier: Arc<dyn Notifier> = self.api.clone();
        let accumulator = Accumulator::new(
            folder.id.clone(),
            root.clone(),
            self.config.clone(),
            notifier,
            Arc::clone(&self.classifier),
        );

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let id = folder.id.clone();
            async move {
                // Dropping the watcher removes the OS watch.
                let _watcher = watcher;
                let result = accumulator.run(local_rx, remote_rx, cancel).await;
                if let Err(e) = &result {
                    error!(folder = %id, error = %e, "folder watch ended");
                }
                result
            }
        });

        info!(folder = %folder.id, root = %root.display(), read_only = folder.read_only, "watching");
        if folder.rescan_interval_s < SUGGESTED_RESCAN_S {
            info!(
                folder = %folder.id,
                rescan_interval_s = folder.rescan_interval_s,
                "rescan interval can be raised to 3600 or even 86400 while changes are watched"
            );
        }

        self.folders.insert(
            folder.id.clone(),
            RunningFolder {
                config: folder,
                remote_tx,
                cancel,
                task,
            },
        );
        Ok(())
    }

    /// Stops a folder's accumulator and waits for it to finish.
    pub async fn stop_folder(&mut self, folder: &str) -> bool {
        let Some(running) = self.folders.remove(folder) else {
            return false;
        };

        running.cancel.cancel();
        match running.task.await {
            Ok(_) => info!(folder, "stopped watching"),
            Err(e) => warn!(folder, error = %e, "folder task did not shut down cleanly"),
        }
        true
    }

    /// Brings the running set in line with `folders`: removed or moved folders are
    /// stopped, new ones started, unchanged ones left alone.
    pub async fn reconcile(&mut self, folders: Vec<FolderConfig>) -> SyncWatchResult<Reconciled> {
        let desired = self.filter.apply(folders);
        let mut report = Reconciled::default();

        let stale: Vec<String> = self
            .folders
            .iter()
            .filter(|(id, running)| {
                running.task.is_finished()
                    || !desired
                        .iter()
                        .any(|f| &f.id == *id && f.same_watch(&running.config))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in stale {
            self.stop_folder(&id).await;
            report.stopped.push(id);
        }

        for folder in desired {
            if self.folders.contains_key(&folder.id) {
                continue;
            }
            let id = folder.id.clone();
            match self.start_folder(folder).await {
                Ok(()) => report.started.push(id),
                Err(e @ SyncWatchError::Watch { .. }) | Err(e @ SyncWatchError::Config(_)) => {
                    warn!(folder = %id, error = %e, "folder abandoned");
                    report.failed.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        report.stopped.sort();
        Ok(report)
    }

    /// Delivers a remote event to its folder. Events for unknown folders are dropped,
    /// and a folder whose accumulator has ended is removed on the first failed delivery.
    pub async fn route(&mut self, event: &SyncthingEvent) {
        let Some(remote) = event.to_remote() else {
            return;
        };
        let Some(running) = self.folders.get(&event.folder) else {
            return;
        };

        if running.remote_tx.send(remote).await.is_err() {
            warn!(folder = %event.folder, "folder is no longer accumulating, unwatching it");
            self.folders.remove(&event.folder);
        }
    }

    /// Fetches the folder list, retrying while Syncthing is unreachable, and
    /// reconciles against it. Gives up with [`SyncWatchError::Cancelled`] once
    /// shutdown is requested.
    pub async fn refresh(&mut self) -> SyncWatchResult<Reconciled> {
        let folders = loop {
            match self.until_shutdown(self.api.folders()).await? {
                Ok(folders) => break folders,
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "failed to fetch folders, retrying");
                    self.until_shutdown(tokio::time::sleep(self.retry_interval)).await?;
                }
                Err(e) => return Err(e),
            }
        };
        self.reconcile(folders).await
    }

    /// Routes Syncthing events until shutdown. A configuration change is applied
    /// once Syncthing reports its config as in sync; shutdown also interrupts that wait.
    /// A fatal error while applying a change stops every folder before it is returned.
    pub async fn run(&mut self) -> SyncWatchResult<()> {
        let mut poller = EventPoller::new(Arc::clone(&self.api), self.retry_interval);

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => break,
                batch = poller.next_batch() => batch,
            };

            for event in batch {
                if event.kind == RemoteEventKind::ConfigurationChanged {
                    match self.apply_config_change().await {
                        Ok(()) => {}
                        Err(SyncWatchError::Cancelled) => break,
                        Err(e) => {
                            self.shutdown().await?;
                            return Err(e);
                        }
                    }
                } else {
                    self.route(&event).await;
                }
            }
        }

        self.shutdown().await
    }

    /// Cancels every folder and waits for their tasks.
    pub async fn shutdown(&mut self) -> SyncWatchResult<()> {
        self.shutdown_token.cancel();

        let ids: Vec<String> = self.folders.keys().cloned().collect();
        for id in ids {
            self.stop_folder(&id).await;
        }

        Ok(())
    }

    async fn apply_config_change(&mut self) -> SyncWatchResult<()> {
        self.wait_for_config_sync().await?;
        let report = self.refresh().await?;
        if report != Reconciled::default() {
            info!(
                started = ?report.started,
                stopped = ?report.stopped,
                failed = ?report.failed,
                "folder configuration updated"
            );
        }
        Ok(())
    }

    async fn fetch_ignore_patterns(&self, folder: &str) -> SyncWatchResult<Vec<String>> {
        loop {
            match self.until_shutdown(self.api.ignore_patterns(folder)).await? {
                Ok(patterns) => return Ok(patterns),
                Err(e) if e.is_retryable() => {
                    warn!(folder, error = %e, "ignore patterns unavailable, retrying");
                    self.until_shutdown(tokio::time::sleep(self.retry_interval)).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for_config_sync(&self) -> SyncWatchResult<()> {
        loop {
            match self.until_shutdown(self.api.config_in_sync()).await? {
                Ok(true) => return Ok(()),
                Ok(false) => debug!("waiting for syncthing config to be in sync"),
                Err(e) => warn!(error = %e, "failed to query config sync state"),
            }
            self.until_shutdown(tokio::time::sleep(self.retry_interval)).await?;
        }
    }

    /// Awaits `work` unless shutdown is requested first.
    async fn until_shutdown<T>(&self, work: impl Future<Output = T>) -> SyncWatchResult<T> {
        tokio::select! {
            biased;
            _ = self.shutdown_token.cancelled() => Err(SyncWatchError::Cancelled),
            output = work => Ok(output),
        }
    }
}
