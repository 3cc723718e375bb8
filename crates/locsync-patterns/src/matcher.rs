use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::glob::{case_insensitive_fs, CompiledTemplate};
use crate::template::PatternTemplate;
use crate::PatternError;

/// Glob capability the resolver depends on.
pub trait GlobMatcher {
    /// Concrete files (root-relative, `/`-separated) matching `pattern`.
    /// Symlinks are followed; directories are never returned.
    fn find(&self, pattern: &str) -> Result<Vec<String>, PatternError>;

    fn test(&self, path: &str, pattern: &str) -> bool;
}

/// Filesystem-backed matcher rooted at the project directory.
#[derive(Debug, Clone)]
pub struct FsGlobMatcher {
    root: PathBuf,
}

impl FsGlobMatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: lexical_normalize(&root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative, `/`-separated form of `path`, or `None` when it lies outside the root.
    pub fn relativize(&self, path: &Path) -> Option<String> {
        let abs = if path.is_absolute() {
            lexical_normalize(path)
        } else {
            lexical_normalize(&self.root.join(path))
        };
        let rel = abs.strip_prefix(&self.root).ok()?;
        Some(to_slash(rel))
    }
}

impl GlobMatcher for FsGlobMatcher {
    fn find(&self, pattern: &str) -> Result<Vec<String>, PatternError> {
        ensure_within_root(&self.root, pattern)?;
        let template = PatternTemplate::parse(pattern);
        let compiled = CompiledTemplate::compile(&template, None)?;

        let prefix = template.literal_prefix();
        let mut base = self.root.clone();
        for comp in &prefix {
            base.push(comp);
        }
        if !base.exists() {
            tracing::debug!(event = "glob_base_missing", pattern = %pattern, base = %base.display());
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(&base).follow_links(true).sort_by_file_name();
        if !template.has_globstar() {
            walker = walker.max_depth(template.segments().len() - prefix.len());
        }

        let mut out = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) if err.depth() == 0 => {
                    return Err(PatternError::Walk {
                        path: base.clone(),
                        source: err,
                    });
                }
                Err(err) => {
                    tracing::debug!(event = "glob_walk_skip", error = %err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = to_slash(rel);
            if compiled.matches_path(&rel) {
                out.push(rel);
            }
        }
        Ok(out)
    }

    fn test(&self, path: &str, pattern: &str) -> bool {
        let template = PatternTemplate::parse(pattern);
        match CompiledTemplate::compile(&template, None) {
            Ok(compiled) => compiled.matches_path(path),
            Err(_) => false,
        }
    }
}

/// Fail when `pattern`, joined onto `root`, escapes it.
pub fn ensure_within_root(root: &Path, pattern: &str) -> Result<(), PatternError> {
    let root = lexical_normalize(root);
    let joined = lexical_normalize(&root.join(pattern));
    let inside = if case_insensitive_fs() {
        let root_s = to_slash(&root).to_lowercase();
        let joined_s = to_slash(&joined).to_lowercase();
        joined_s == root_s || joined_s.starts_with(&format!("{}/", root_s.trim_end_matches('/')))
    } else {
        joined.starts_with(&root)
    };
    if inside {
        Ok(())
    } else {
        Err(PatternError::OutsideRoot {
            pattern: pattern.to_string(),
            root: root.to_path_buf(),
        })
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
