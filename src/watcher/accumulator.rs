//! Per-folder change accumulator.
//!
//! Owns the table of paths currently in flux and is the only code touching it.
//! Two inputs feed the table:
//!
//! - local filesystem events, tagged [`Origin::LocalFs`];
//! - Syncthing progress events ([`RemoteEvent`]), tagged [`Origin::Remote`].
//!
//! A local event on a path Syncthing is currently writing cancels the remote entry
//! instead of being tracked, so Syncthing is never asked to rescan its own writes.
//!
//! The table is flushed on a periodic tick whose interval adapts to activity: fast
//! while events arrive, slow when nothing is tracked. Ticks run the aggregation and
//! hand the result to a [`Notifier`]; failed requests leave the table as is and are
//! retried on a later tick.

use crate::config::WatchConfig;
use crate::error::{SyncWatchError, SyncWatchResult};
use crate::watcher::aggregate::aggregate;
use crate::watcher::classify::PathClassifier;
use crate::watcher::normalize_relative;
use crate::watcher::notifier::{NotifyError, Notifier};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Progress reported by Syncthing for one path of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Relative path; empty means "remote changes are about to arrive".
    pub path: String,
    pub finished: bool,
}

impl RemoteEvent {
    pub fn sync_starting() -> Self {
        RemoteEvent {
            path: String::new(),
            finished: false,
        }
    }

    pub fn started(path: impl Into<String>) -> Self {
        RemoteEvent {
            path: path.into(),
            finished: false,
        }
    }

    pub fn finished(path: impl Into<String>) -> Self {
        RemoteEvent {
            path: path.into(),
            finished: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    LocalFs,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedPath {
    pub origin: Origin,
    pub observed_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing tracked, ticking at the idle interval.
    Idle,
    /// Changes seen recently, ticking at a short interval.
    Accumulating,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    /// Only remote or no reportable paths left; nothing was sent.
    Waiting,
    Reported(Vec<String>),
    /// The scan request failed and will be retried.
    Failed,
}

pub struct Accumulator {
    folder: String,
    root: PathBuf,
    config: WatchConfig,
    notifier: Arc<dyn Notifier>,
    classifier: Arc<dyn PathClassifier>,
    tracked: HashMap<String, TrackedPath>,
    state: State,
    interval: Duration,
    next_tick: Instant,
    next_reminder: Option<Instant>,
}

impl std::fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("folder", &self.folder)
            .field("root", &self.root)
            .field("tracked", &self.tracked.len())
            .field("state", &self.state)
            .field("interval", &self.interval)
            .finish()
    }
}

impl Accumulator {
    /// Creates an idle accumulator. The first delayed-rescan reminder, if enabled,
    /// goes out on the first tick.
    pub fn new(
        folder: impl Into<String>,
        root: impl Into<PathBuf>,
        config: WatchConfig,
        notifier: Arc<dyn Notifier>,
        classifier: Arc<dyn PathClassifier>,
    ) -> Self {
        let now = Instant::now();
        let interval = config.idle_interval;
        let next_reminder = config.reminder_every().map(|_| now);

        Accumulator {
            folder: folder.into(),
            root: root.into(),
            config,
            notifier,
            classifier,
            tracked: HashMap::new(),
            state: State::Idle,
            interval,
            next_tick: now + interval,
            next_reminder,
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn origin_of(&self, path: &str) -> Option<Origin> {
        self.tracked.get(path).map(|t| t.origin)
    }

    pub fn handle_remote(&mut self, event: RemoteEvent) {
        let path = normalize_relative(&event.path);

        if path.is_empty() {
            debug!(folder = %self.folder, "remote changes incoming");
            self.wake(self.config.remote_settle);
            return;
        }

        if event.finished {
            if self.tracked.remove(&path).is_some() {
                debug!(folder = %self.folder, path = %path, "remote finished, untracked");
            }
            return;
        }

        if !self.tracked.contains_key(&path) && self.tracked.len() >= self.config.max_tracked {
            trace!(folder = %self.folder, path = %path, "tracking limit reached, dropping remote event");
            return;
        }

        debug!(folder = %self.folder, path = %path, "remote in progress");
        self.track(path, Origin::Remote);
    }

    pub fn handle_local(&mut self, path: impl AsRef<str>) {
        let path = normalize_relative(path.as_ref());
        self.wake(self.config.debounce);

        if self.origin_of(&path) == Some(Origin::Remote) {
            self.tracked.remove(&path);
            debug!(folder = %self.folder, path = %path, "change caused by syncthing, suppressed");
            return;
        }

        if !self.tracked.contains_key(&path) && self.tracked.len() >= self.config.max_tracked {
            trace!(folder = %self.folder, path = %path, "tracking limit reached, dropping local event");
            return;
        }

        trace!(folder = %self.folder, path = %path, "tracking local change");
        self.track(path, Origin::LocalFs);
    }

    /// Runs one timer expiry: reminder, expiry of stale entries, aggregation and report.
    ///
    /// Only a rejected authorization is returned as an error.
    pub async fn tick(&mut self) -> SyncWatchResult<TickOutcome> {
        let now = Instant::now();
        self.next_tick = now + self.interval;

        self.remind(now).await?;

        if self.tracked.is_empty() {
            self.relax(now);
            return Ok(TickOutcome::Idle);
        }

        let stale_after = self.config.stale_after;
        let folder = &self.folder;
        self.tracked.retain(|path, tracked| {
            let fresh = now.duration_since(tracked.observed_at) < stale_after;
            if !fresh {
                debug!(folder = %folder, path = %path, "dropping stale entry");
            }
            fresh
        });

        let candidates: Vec<String> = self
            .tracked
            .iter()
            .filter(|(_, tracked)| tracked.origin == Origin::LocalFs)
            .map(|(path, _)| path.clone())
            .collect();

        if candidates.is_empty() {
            if self.tracked.is_empty() {
                self.relax(now);
            }
            trace!(folder = %self.folder, waiting = self.tracked.len(), "nothing to report");
            return Ok(TickOutcome::Waiting);
        }

        let targets = if self.tracked.len() < self.config.max_tracked {
            match aggregate(
                &self.root,
                &candidates,
                self.config.dir_vs_files,
                self.classifier.as_ref(),
            ) {
                Ok(targets) => targets,
                Err(e) => {
                    warn!(folder = %self.folder, error = %e, "aggregation failed");
                    return Ok(TickOutcome::Waiting);
                }
            }
        } else {
            debug!(folder = %self.folder, tracked = self.tracked.len(), "too many changes, scanning whole folder");
            vec![String::new()]
        };

        match self.notifier.notify(&self.folder, &targets).await {
            Ok(()) => {
                info!(folder = %self.folder, targets = ?targets, "syncthing is indexing changes");
                for path in &candidates {
                    self.tracked.remove(path);
                }
                self.next_reminder = self.config.reminder_every().map(|every| now + every);
                if self.tracked.is_empty() {
                    self.relax(now);
                }
                Ok(TickOutcome::Reported(targets))
            }
            Err(NotifyError::Unauthorized) => Err(SyncWatchError::Unauthorized),
            Err(NotifyError::Retryable(reason)) => {
                warn!(folder = %self.folder, %reason, "scan request failed, will retry");
                self.next_tick = Instant::now() + self.config.retry_backoff;
                Ok(TickOutcome::Failed)
            }
        }
    }

    /// Drives the accumulator until `cancel` fires or authorization is rejected.
    pub async fn run(
        mut self,
        mut local_rx: Receiver<String>,
        mut remote_rx: Receiver<RemoteEvent>,
        cancel: CancellationToken,
    ) -> SyncWatchResult<()> {
        info!(folder = %self.folder, root = %self.root.display(), "accumulating changes");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(folder = %self.folder, "accumulator stopped");
                    return Ok(());
                }
                Some(event) = remote_rx.recv() => self.handle_remote(event),
                Some(path) = local_rx.recv() => self.handle_local(path),
                _ = sleep_until(self.next_tick) => {
                    // A scan request may hang; stopping must not wait for it.
                    let stopped = tokio::select! {
                        _ = cancel.cancelled() => true,
                        result = self.tick() => {
                            result?;
                            false
                        }
                    };
                    if stopped {
                        info!(folder = %self.folder, "accumulator stopped during tick");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn track(&mut self, path: String, origin: Origin) {
        self.tracked.insert(
            path,
            TrackedPath {
                origin,
                observed_at: Instant::now(),
            },
        );
    }

    fn wake(&mut self, interval: Duration) {
        self.state = State::Accumulating;
        self.interval = interval;
    }

    fn relax(&mut self, now: Instant) {
        self.state = State::Idle;
        self.interval = self.config.idle_interval;
        self.next_tick = now + self.interval;
    }

    async fn remind(&mut self, now: Instant) -> SyncWatchResult<()> {
        let (Some(due), Some(delay)) = (self.next_reminder, self.config.delay_scan) else {
            return Ok(());
        };
        if now < due {
            return Ok(());
        }

        match self.notifier.extend_rescan(&self.folder, delay).await {
            Ok(()) => debug!(folder = %self.folder, ?delay, "delayed next full rescan"),
            Err(NotifyError::Unauthorized) => return Err(SyncWatchError::Unauthorized),
            Err(NotifyError::Retryable(reason)) => {
                warn!(folder = %self.folder, %reason, "failed to delay next full rescan");
            }
        }

        self.next_reminder = self.config.reminder_every().map(|every| now + every);
        Ok(())
    }
}
