use crate::error::{SyncWatchError, SyncWatchResult};
use crate::ignore::IgnoreMatcher;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{trace, warn};

/// Installs a recursive watch on `root` and forwards every changed path, relative to
/// `root` and not ignored by `ignores`, into `local_tx`.
///
/// The returned watcher must be kept alive for as long as events are wanted.
pub fn setup_file_watcher(
    root: &Path,
    ignores: Arc<IgnoreMatcher>,
    local_tx: Sender<String>,
) -> SyncWatchResult<RecommendedWatcher> {
    let watch_root = root.to_path_buf();

    let event_handler = move |res: Result<Event, notify::Error>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!(root = %watch_root.display(), error = %e, "watch error");
                return;
            }
        };

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {}
            _ => return,
        }

        for path in event.paths {
            trace!(path = %path.display(), "change detected (could still be ignored)");
            let Some(relative) = relative_path(&path, &watch_root) else {
                continue;
            };
            if ignores.should_ignore(&relative) {
                continue;
            }
            // Runs on notify's own thread, outside the runtime.
            if local_tx.blocking_send(relative).is_err() {
                return;
            }
        }
    };

    let mut watcher =
        RecommendedWatcher::new(event_handler, Config::default()).map_err(|source| {
            SyncWatchError::Watch {
                path: root.to_path_buf(),
                source,
            }
        })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| SyncWatchError::Watch {
            path: root.to_path_buf(),
            source,
        })?;

    Ok(watcher)
}

/// Converts an absolute event path into a `/`-separated path relative to `root`.
///
/// Returns `None` for paths outside `root`; `root` itself maps to `""`.
pub fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}
