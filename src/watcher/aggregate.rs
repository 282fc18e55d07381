//! Collapses a batch of changed paths into the fewest scan targets.
//!
//! Every directory collects a score: one point per changed file directly inside it
//! and one point per change anywhere below it among the directories already known
//! to the batch. A directory reaching `threshold` is scanned as a whole and all of
//! its descendants are dropped from the result. Files whose directories stay below
//! the threshold are reported one by one.
//!
//! A path that is itself a directory, or that no longer exists, starts at
//! `threshold` and is therefore always reported (unless an ancestor already is).

use crate::error::{SyncWatchError, SyncWatchResult};
use crate::watcher::classify::{PathClassifier, PathKind};
use crate::watcher::{cmp_components, is_strict_ancestor, normalize_relative, parent_of};
use std::collections::HashMap;
use std::path::Path;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEntry {
    /// A single changed file.
    Leaf,
    /// A directory and the weight of the changes at or below it.
    Directory { score: usize },
}

/// Computes the scan targets for `paths`, all relative to `root`.
///
/// Returns [`SyncWatchError::NothingToAggregate`] for an empty batch. The result is
/// ordered component-wise; a lone `""` means the whole folder.
pub fn aggregate<C>(
    root: &Path,
    paths: &[String],
    threshold: usize,
    classifier: &C,
) -> SyncWatchResult<Vec<String>>
where
    C: PathClassifier + ?Sized,
{
    if paths.is_empty() {
        return Err(SyncWatchError::NothingToAggregate);
    }

    let mut batch: Vec<String> = paths.iter().map(|p| normalize_relative(p)).collect();
    batch.sort_by(|a, b| cmp_components(a, b));
    batch.dedup();

    let entries = score(root, &batch, threshold, classifier);
    Ok(select(&entries, threshold))
}

fn score<C>(
    root: &Path,
    batch: &[String],
    threshold: usize,
    classifier: &C,
) -> HashMap<String, ScoreEntry>
where
    C: PathClassifier + ?Sized,
{
    let mut entries: HashMap<String, ScoreEntry> = HashMap::new();

    for path in batch {
        let kind = classifier.classify(&root.join(path));
        trace!(path = %path, ?kind, "classified");

        let dir = match kind {
            PathKind::Directory | PathKind::Deleted => {
                let entry = entries
                    .entry(path.clone())
                    .or_insert(ScoreEntry::Directory { score: 0 });
                *entry = match *entry {
                    ScoreEntry::Directory { score } => ScoreEntry::Directory {
                        score: score.max(threshold),
                    },
                    ScoreEntry::Leaf => ScoreEntry::Directory { score: threshold },
                };
                path.as_str()
            }
            PathKind::File => {
                entries.insert(path.clone(), ScoreEntry::Leaf);
                let parent = parent_of(path);
                bump(&mut entries, parent);
                parent
            }
        };

        for (key, entry) in entries.iter_mut() {
            if let ScoreEntry::Directory { score } = entry {
                if is_strict_ancestor(key, dir) {
                    *score += 1;
                }
            }
        }
    }

    entries
}

fn bump(entries: &mut HashMap<String, ScoreEntry>, dir: &str) {
    let entry = entries
        .entry(dir.to_string())
        .or_insert(ScoreEntry::Directory { score: 0 });
    *entry = match *entry {
        ScoreEntry::Directory { score } => ScoreEntry::Directory { score: score + 1 },
        // Seen as a file earlier but now has children: treat it as a directory.
        ScoreEntry::Leaf => ScoreEntry::Directory { score: 1 },
    };
}

fn select(entries: &HashMap<String, ScoreEntry>, threshold: usize) -> Vec<String> {
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort_by(|a, b| cmp_components(a, b));

    let mut targets = Vec::new();
    let mut covered: Option<&str> = None;

    for key in keys {
        if covered.is_some_and(|dir| is_strict_ancestor(dir, key)) {
            continue;
        }

        match entries[key] {
            ScoreEntry::Leaf => targets.push(key.clone()),
            ScoreEntry::Directory { score } if score >= threshold => {
                targets.push(key.clone());
                if key.is_empty() {
                    break;
                }
                covered = Some(key.as_str());
            }
            ScoreEntry::Directory { .. } => {}
        }
    }

    targets
}
