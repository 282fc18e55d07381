use crate::error::{SyncWatchError, SyncWatchResult};
use serde::Deserialize;
use std::path::{MAIN_SEPARATOR, PathBuf};
use std::time::Duration;

/// Tuning knobs for one folder's change accumulator.
///
/// Built once and handed to every accumulator; nothing here is mutated at runtime.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Tick interval while local changes are arriving.
    pub debounce: Duration,
    /// Tick interval after Syncthing announced incoming remote changes.
    pub remote_settle: Duration,
    /// Tick interval when nothing is tracked.
    pub idle_interval: Duration,
    /// Score a directory needs before it is scanned as a whole.
    pub dir_vs_files: usize,
    /// Upper bound on tracked paths; reaching it degrades to a full folder scan.
    pub max_tracked: usize,
    /// Tracked paths older than this are dropped without being reported.
    pub stale_after: Duration,
    /// Pause before the next tick after a failed scan request.
    pub retry_backoff: Duration,
    /// How far Syncthing's own periodic rescan is pushed back, if at all.
    pub delay_scan: Option<Duration>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            debounce: Duration::from_millis(500),
            remote_settle: Duration::from_millis(600),
            idle_interval: Duration::from_secs(2),
            dir_vs_files: 256,
            max_tracked: 5000,
            stale_after: Duration::from_secs(600),
            retry_backoff: Duration::from_secs(5),
            delay_scan: Some(Duration::from_secs(3600)),
        }
    }
}

impl WatchConfig {
    /// How often the delayed-rescan reminder is re-sent. Slightly shorter than
    /// `delay_scan` so Syncthing never reaches its own deadline.
    pub fn reminder_every(&self) -> Option<Duration> {
        self.delay_scan
            .filter(|d| !d.is_zero())
            .map(|d| d * 9 / 10)
    }
}

/// A folder as described by Syncthing's `/rest/system/config`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderConfig {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, rename = "rescanIntervalS")]
    pub rescan_interval_s: i64,
}

impl FolderConfig {
    /// The folder root with a leading `~` expanded to the user's home directory.
    pub fn expanded_path(&self) -> SyncWatchResult<PathBuf> {
        expand_tilde(&self.path)
    }

    /// Two configs describe the same running watch when id and path agree.
    pub fn same_watch(&self, other: &FolderConfig) -> bool {
        self.id == other.id && self.path == other.path
    }
}

/// Expands `~` and `~/...` against the home directory; other paths are returned as is.
pub fn expand_tilde(path: &str) -> SyncWatchResult<PathBuf> {
    let home = || {
        dirs::home_dir().ok_or_else(|| {
            SyncWatchError::Config("no home directory found, set $HOME".to_string())
        })
    };

    if path == "~" {
        return home();
    }

    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix(&format!("~{MAIN_SEPARATOR}")));

    match rest {
        Some(rest) => Ok(home()?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Which of Syncthing's folders get a watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FolderFilter {
    #[default]
    All,
    Only(Vec<String>),
    Skip(Vec<String>),
}

impl FolderFilter {
    /// Builds a filter from `--folders` / `--skip-folders`; giving both is an error.
    pub fn from_lists(only: Vec<String>, skip: Vec<String>) -> SyncWatchResult<Self> {
        match (only.is_empty(), skip.is_empty()) {
            (true, true) => Ok(FolderFilter::All),
            (false, true) => Ok(FolderFilter::Only(only)),
            (true, false) => Ok(FolderFilter::Skip(skip)),
            (false, false) => Err(SyncWatchError::Config(
                "provide either folders to watch or folders to skip, not both".to_string(),
            )),
        }
    }

    pub fn apply(&self, folders: Vec<FolderConfig>) -> Vec<FolderConfig> {
        match self {
            FolderFilter::All => folders,
            FolderFilter::Only(ids) => folders.into_iter().filter(|f| ids.contains(&f.id)).collect(),
            FolderFilter::Skip(ids) => folders.into_iter().filter(|f| !ids.contains(&f.id)).collect(),
        }
    }
}

/// Connection settings for Syncthing's REST API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub target: String,
    pub api_key: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub csrf_token: Option<String>,
    pub request_timeout: Duration,
    /// Sleep between attempts while Syncthing is not ready.
    pub config_sync_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            target: "http://127.0.0.1:8384".to_string(),
            api_key: None,
            user: None,
            password: None,
            csrf_token: None,
            request_timeout: Duration::from_secs(30),
            config_sync_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Normalizes the target to carry a scheme and no trailing slash.
    pub fn with_target(mut self, target: &str) -> Self {
        let target = target.trim().trim_end_matches('/');
        self.target = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{target}")
        };
        self
    }

    /// Reads the last non-empty line of a CSRF token file.
    pub fn with_csrf_file(mut self, path: &std::path::Path) -> SyncWatchResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        self.csrf_token = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(str::to_string);
        Ok(self)
    }
}
