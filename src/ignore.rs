//! Path exclusion rules for a watched folder.
//!
//! Two kinds of rules are combined:
//!
//! - **Literal prefixes** such as `.stfolder`; a path containing one anywhere is ignored.
//! - **Patterns**, regular expressions as served by Syncthing's `/rest/db/ignores`.
//!   A pattern carrying the [`EXCLUDE_MARKER`] prefix is an exception: it keeps a
//!   path that some other pattern would ignore. Exceptions always win.
//!
//! ```rust
//! use syncwatch::ignore::IgnoreMatcher;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let matcher = IgnoreMatcher::new(
//!     IgnoreMatcher::default_prefixes(),
//!     &["\\.tmp$", "(?exclude)keep\\.tmp$"],
//! )?;
//!
//! assert!(matcher.should_ignore("build/out.tmp"));
//! assert!(!matcher.should_ignore("build/keep.tmp"));
//! assert!(!matcher.should_ignore(""));
//! # Ok(())
//! # }
//! ```

use crate::error::{SyncWatchError, SyncWatchResult};
use regex::Regex;
use tracing::{debug, trace};

/// Marks a pattern string as an exception rather than an ignore rule.
pub const EXCLUDE_MARKER: &str = "(?exclude)";

/// Paths Syncthing keeps for its own bookkeeping; never worth a scan.
pub const DEFAULT_IGNORE_PREFIXES: [&str; 4] =
    [".stversions", ".stfolder", ".stignore", ".syncthing"];

/// One compiled ignore rule.
#[derive(Debug, Clone)]
pub struct Pattern {
    matcher: Regex,
    /// `true` marks matching paths as ignorable, `false` is an exception.
    include: bool,
}

impl Pattern {
    /// Compiles a raw pattern string, honouring the [`EXCLUDE_MARKER`] prefix.
    pub fn parse(raw: &str) -> SyncWatchResult<Self> {
        let (source, include) = match raw.strip_prefix(EXCLUDE_MARKER) {
            Some(rest) => (rest, false),
            None => (raw, true),
        };

        let matcher = Regex::new(source).map_err(|source| SyncWatchError::Pattern {
            pattern: raw.to_string(),
            source,
        })?;

        Ok(Pattern { matcher, include })
    }

    pub fn is_include(&self) -> bool {
        self.include
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    prefixes: Vec<String>,
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    /// Builds a matcher from literal prefixes and raw pattern strings.
    ///
    /// Every pattern must compile; the first one that does not is returned as
    /// [`SyncWatchError::Pattern`] and no matcher is produced.
    pub fn new<P, S>(prefixes: P, patterns: &[S]) -> SyncWatchResult<Self>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .iter()
            .map(|raw| Pattern::parse(raw.as_ref()))
            .collect::<SyncWatchResult<Vec<_>>>()?;

        Ok(IgnoreMatcher {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            patterns,
        })
    }

    pub fn default_prefixes() -> Vec<String> {
        DEFAULT_IGNORE_PREFIXES.iter().map(|p| p.to_string()).collect()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` when `path` (relative to the folder root) should not be reported.
    ///
    /// The empty path stands for the whole folder and is never ignored.
    pub fn should_ignore(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }

        if let Some(prefix) = self.prefixes.iter().find(|p| path.contains(p.as_str())) {
            trace!(path, prefix = %prefix, "ignoring path with reserved prefix");
            return true;
        }

        for include in self.patterns.iter().filter(|p| p.include) {
            if !include.is_match(path) {
                continue;
            }

            match self
                .patterns
                .iter()
                .find(|p| !p.include && p.is_match(path))
            {
                Some(exception) => {
                    debug!(path, exception = %exception.matcher, "keeping path");
                }
                None => {
                    debug!(path, pattern = %include.matcher, "ignoring path");
                    return true;
                }
            }
        }

        false
    }
}
