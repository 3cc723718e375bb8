use std::path::Path;

use locsync_core::resolve_overridden_locale;
use locsync_domain::{WatchPatternReport, SCHEMA_VERSION};
use locsync_patterns::{expand, CompiledTemplate, FsGlobMatcher, GlobMatcher, PatternTemplate};

use super::WatchError;
use crate::context::SyncContext;

/// Build and dependency directories never worth reacting to.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.next/**",
    "**/coverage/**",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPatternSet {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Files currently matched by `include` and not by `exclude`.
    pub resolved: Vec<String>,
    pub warnings: Vec<String>,
}

impl WatchPatternSet {
    pub fn to_report(&self) -> WatchPatternReport {
        WatchPatternReport {
            schema_version: SCHEMA_VERSION,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            resolved: self.resolved.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Reject empty patterns; describe every suspicious one.
pub fn validate_patterns(patterns: &[String]) -> Result<Vec<String>, WatchError> {
    let mut warnings = Vec::new();
    for (idx, pattern) in patterns.iter().enumerate() {
        if pattern.trim().is_empty() {
            return Err(WatchError::EmptyPattern(idx));
        }
        if pattern.starts_with("**/") {
            warnings.push(format!("`{pattern}` starts with `**/` and may match far more files than intended"));
        }
        if pattern.matches("**").count() > 2 {
            warnings.push(format!("`{pattern}` has many recursive wildcards and may be slow to match"));
        }
        if pattern.split(['/', '\\']).any(|c| c == "..") {
            warnings.push(format!("`{pattern}` traverses to a parent directory"));
        }
        if pattern.ends_with('/') {
            warnings.push(format!("`{pattern}` ends with `/` and matches no files"));
        }
        if !cfg!(windows) && pattern.contains('\\') {
            warnings.push(format!("`{pattern}` uses `\\` as a separator; use `/`"));
        }
    }
    Ok(warnings)
}

/// Source-locale bucket patterns plus CLI includes, CLI excludes plus the
/// default excludes, and the files they currently select.
pub fn resolve_watch_patterns(
    ctx: &SyncContext,
    cli_include: &[String],
    cli_exclude: &[String],
) -> Result<WatchPatternSet, WatchError> {
    let mut include: Vec<String> = Vec::new();
    for bucket in &ctx.config.buckets {
        for spec in &bucket.include {
            let locale = resolve_overridden_locale(ctx.source_locale(), spec.delimiter);
            push_unique(&mut include, expand(&spec.path, &locale));
        }
    }
    for p in cli_include {
        push_unique(&mut include, p.clone());
    }
    let mut exclude: Vec<String> = Vec::new();
    for p in cli_exclude {
        push_unique(&mut exclude, p.clone());
    }

    let user_supplied: Vec<String> = include.iter().chain(&exclude).cloned().collect();
    let warnings = validate_patterns(&user_supplied)?;
    for w in &warnings {
        tracing::warn!(event = "watch_pattern_warning", "{w}");
    }
    for p in DEFAULT_EXCLUDES {
        push_unique(&mut exclude, p.to_string());
    }

    let matcher = FsGlobMatcher::new(&ctx.root);
    let excludes = compile_all(&exclude)?;
    let mut resolved = Vec::new();
    for pattern in &include {
        match matcher.find(pattern) {
            Ok(files) => {
                for f in files {
                    if !excludes.iter().any(|e| e.matches_path(&f)) {
                        push_unique(&mut resolved, f);
                    }
                }
            }
            Err(err) => tracing::warn!(event = "watch_pattern_unresolved", pattern = %pattern, error = %err),
        }
    }
    resolved.sort();
    tracing::debug!(event = "watch_patterns_resolved", include = ?include, exclude = ?exclude, files = resolved.len());

    Ok(WatchPatternSet {
        include,
        exclude,
        resolved,
        warnings,
    })
}

/// Include/exclude test for change events; exclude wins.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    matcher: FsGlobMatcher,
    include: Vec<CompiledTemplate>,
    exclude: Vec<CompiledTemplate>,
}

impl WatchFilter {
    pub fn new(root: &Path, patterns: &WatchPatternSet) -> Result<Self, WatchError> {
        Self::from_patterns(root, &patterns.include, &patterns.exclude)
    }

    pub fn from_patterns(root: &Path, include: &[String], exclude: &[String]) -> Result<Self, WatchError> {
        Ok(Self {
            matcher: FsGlobMatcher::new(root),
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let Some(rel) = self.matcher.relativize(path) else {
            return false;
        };
        if self.exclude.iter().any(|t| t.matches_path(&rel)) {
            return false;
        }
        self.include.iter().any(|t| t.matches_path(&rel))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<CompiledTemplate>, WatchError> {
    patterns
        .iter()
        .map(|p| CompiledTemplate::compile(&PatternTemplate::parse(p), None).map_err(WatchError::from))
        .collect()
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}
