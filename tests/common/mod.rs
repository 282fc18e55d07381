#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use syncwatch::config::{FolderConfig, WatchConfig};
use syncwatch::syncthing::events::RawEvent;
use syncwatch::syncthing::{EventSource, SyncthingApi};
use syncwatch::watcher::notifier::{NotifyError, Notifier};
use syncwatch::{SyncWatchError, SyncWatchResult};

/// Records every request; pops a queued failure before each request if one is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub scans: Mutex<Vec<(String, Vec<String>)>>,
    pub extends: Mutex<Vec<(String, Duration)>>,
    pub failures: Mutex<VecDeque<NotifyError>>,
}

impl RecordingNotifier {
    pub fn fail_next(&self, error: NotifyError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn scans(&self) -> Vec<(String, Vec<String>)> {
        self.scans.lock().unwrap().clone()
    }

    pub fn extends(&self) -> Vec<(String, Duration)> {
        self.extends.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, folder: &str, targets: &[String]) -> Result<(), NotifyError> {
        if let Some(e) = self.failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.scans
            .lock()
            .unwrap()
            .push((folder.to_string(), targets.to_vec()));
        Ok(())
    }

    async fn extend_rescan(&self, folder: &str, delay: Duration) -> Result<(), NotifyError> {
        if let Some(e) = self.failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.extends
            .lock()
            .unwrap()
            .push((folder.to_string(), delay));
        Ok(())
    }
}

/// In-memory Syncthing: folders, ignore patterns and a queue of event batches.
#[derive(Default)]
pub struct FakeSyncthing {
    pub notifier: RecordingNotifier,
    pub folders: Mutex<Vec<FolderConfig>>,
    pub patterns: Mutex<HashMap<String, Vec<String>>>,
    pub not_ready: Mutex<HashMap<String, usize>>,
    pub events: Mutex<VecDeque<Vec<RawEvent>>>,
    pub errors: Mutex<Vec<String>>,
    pub out_of_sync: Mutex<bool>,
    pub folder_calls: Mutex<usize>,
    pub ignore_calls: Mutex<Vec<String>>,
}

impl FakeSyncthing {
    pub fn with_folders(folders: Vec<FolderConfig>) -> Self {
        let fake = FakeSyncthing::default();
        *fake.folders.lock().unwrap() = folders;
        fake
    }

    pub fn ignore_calls_for(&self, folder: &str) -> usize {
        self.ignore_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == folder)
            .count()
    }
}

#[async_trait]
impl Notifier for FakeSyncthing {
    async fn notify(&self, folder: &str, targets: &[String]) -> Result<(), NotifyError> {
        self.notifier.notify(folder, targets).await
    }

    async fn extend_rescan(&self, folder: &str, delay: Duration) -> Result<(), NotifyError> {
        self.notifier.extend_rescan(folder, delay).await
    }
}

#[async_trait]
impl EventSource for FakeSyncthing {
    async fn events(&self, _since: u64) -> SyncWatchResult<Vec<RawEvent>> {
        let next = self.events.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl SyncthingApi for FakeSyncthing {
    async fn folders(&self) -> SyncWatchResult<Vec<FolderConfig>> {
        *self.folder_calls.lock().unwrap() += 1;
        Ok(self.folders.lock().unwrap().clone())
    }

    async fn ignore_patterns(&self, folder: &str) -> SyncWatchResult<Vec<String>> {
        self.ignore_calls.lock().unwrap().push(folder.to_string());
        {
            let mut not_ready = self.not_ready.lock().unwrap();
            if let Some(left) = not_ready.get_mut(folder) {
                if *left > 0 {
                    *left -= 1;
                    return Err(SyncWatchError::NotReady(folder.to_string()));
                }
            }
        }
        Ok(self
            .patterns
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_default())
    }

    async fn config_in_sync(&self) -> SyncWatchResult<bool> {
        Ok(!*self.out_of_sync.lock().unwrap())
    }

    async fn report_error(&self, message: &str) -> SyncWatchResult<()> {
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Accumulator settings with short timers and no rescan reminders.
pub fn quick_config(dir_vs_files: usize) -> WatchConfig {
    WatchConfig {
        debounce: Duration::from_millis(20),
        remote_settle: Duration::from_millis(30),
        idle_interval: Duration::from_millis(50),
        dir_vs_files,
        max_tracked: 5000,
        stale_after: Duration::from_secs(60),
        retry_backoff: Duration::from_millis(100),
        delay_scan: None,
    }
}

pub fn folder(id: &str, path: &Path) -> FolderConfig {
    FolderConfig {
        id: id.to_string(),
        path: path.display().to_string(),
        read_only: false,
        rescan_interval_s: 3600,
    }
}

/// Creates files and directories under `root`; entries ending in `/` are directories.
pub fn create_paths(root: &Path, paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            let full = root.join(p.trim_end_matches('/'));
            if p.ends_with('/') {
                fs::create_dir_all(&full).unwrap();
            } else {
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(&full, b"").unwrap();
            }
            p.trim_end_matches('/').to_string()
        })
        .collect()
}
