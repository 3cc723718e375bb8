//! Placeholder-aware path templates.
//!
//! Templates such as `src/**/[locale]/strings/*.json` are parsed into
//! segments, expanded for the source locale, matched against the filesystem
//! and then restored so the discovered files can be addressed for any other
//! locale.

use std::path::PathBuf;

use thiserror::Error;

mod glob;
mod matcher;
mod resolve;
mod restore;
mod template;

pub use glob::{any_match, case_insensitive_fs, CompiledSegment, CompiledTemplate, WildcardGlob};
pub use matcher::{ensure_within_root, lexical_normalize, FsGlobMatcher, GlobMatcher};
pub use resolve::{resolve_entry, resolve_path_entries, BucketPathEntry, PathSpec};
pub use restore::{restore, restore_parsed};
pub use template::{expand, Part, PatternTemplate, Segment};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern `{pattern}` resolves outside of project root {root}")]
    OutsideRoot { pattern: String, root: PathBuf },
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl PatternError {
    /// Errors that must abort configuration instead of skipping one entry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PatternError::OutsideRoot { .. })
    }
}
