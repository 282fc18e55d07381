use std::fs;
use std::path::Path;

/// What a path looks like on disk at the moment it is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    File,
    Directory,
    /// Missing or unreadable. Scored like a directory since the removed subtree
    /// may have been arbitrarily large.
    Deleted,
}

pub trait PathClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> PathKind;
}

/// Classifies paths with a `symlink_metadata` call; never follows symlinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsClassifier;

impl PathClassifier for FsClassifier {
    fn classify(&self, path: &Path) -> PathKind {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(_) => PathKind::Deleted,
        }
    }
}

impl<F> PathClassifier for F
where
    F: Fn(&Path) -> PathKind + Send + Sync,
{
    fn classify(&self, path: &Path) -> PathKind {
        self(path)
    }
}
