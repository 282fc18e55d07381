//! Change tracking for watched folders.
//!
//! Local filesystem events and Syncthing's own progress events meet in an
//! [`accumulator::Accumulator`], which batches them and hands the batch to
//! [`aggregate::aggregate`] before asking a [`notifier::Notifier`] to scan.
//!
//! Paths handled here are always relative to the folder root and use `/` as
//! separator; the empty string stands for the folder root itself.

pub mod accumulator;
pub mod aggregate;
pub mod classify;
pub mod notifier;
pub mod service;
pub mod watcher;

use std::cmp::Ordering;
use std::path::MAIN_SEPARATOR;

/// Normalizes a relative path: `/`-separated, no empty, `.` or trailing components.
pub fn normalize_relative(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', MAIN_SEPARATOR]) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// Parent of a normalized relative path; top-level entries have the root (`""`) as parent.
pub fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// True when `ancestor` contains `path` and the two differ.
pub fn is_strict_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Orders paths component by component so every directory is immediately
/// followed by all of its descendants.
pub fn cmp_components(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}
