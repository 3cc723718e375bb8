use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use locsync_core::{resolve_overridden_locale, LocaleDelimiter};

use crate::matcher::GlobMatcher;
use crate::restore::restore_parsed;
use crate::template::{expand, PatternTemplate};
use crate::PatternError;

/// One configured include/exclude entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<LocaleDelimiter>,
}

impl PathSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            delimiter: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: LocaleDelimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// A resolved template for one physical file; identity is both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketPathEntry {
    pub path_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<LocaleDelimiter>,
}

impl BucketPathEntry {
    /// Concrete root-relative path of this file for `locale`.
    pub fn path_for(&self, locale: &str) -> String {
        expand(
            &self.path_pattern,
            &resolve_overridden_locale(locale, self.delimiter),
        )
    }

    /// Text form of the identity: the pattern, plus `#<delimiter>` when one is set.
    pub fn identity(&self) -> String {
        match self.delimiter {
            Some(d) => format!("{}#{}", self.path_pattern, d),
            None => self.path_pattern.clone(),
        }
    }
}

/// Expand one entry for the source locale, list the files it matches and
/// restore a placeholder-bearing template for each of them.
pub fn resolve_entry<M: GlobMatcher + ?Sized>(
    matcher: &M,
    spec: &PathSpec,
    source_locale: &str,
) -> Result<Vec<BucketPathEntry>, PatternError> {
    if spec.path.trim().is_empty() {
        return Err(PatternError::InvalidPattern {
            pattern: spec.path.clone(),
            reason: "empty pattern".to_string(),
        });
    }
    let locale = resolve_overridden_locale(source_locale, spec.delimiter);
    let template = PatternTemplate::parse(&spec.path);
    let search = expand(&spec.path, &locale);
    let files = matcher.find(&search)?;
    tracing::debug!(
        event = "pattern_expanded",
        pattern = %spec.path,
        search = %search,
        matched = files.len()
    );
    Ok(files
        .iter()
        .map(|file| BucketPathEntry {
            path_pattern: restore_parsed(&template, file, &locale),
            delimiter: spec.delimiter,
        })
        .collect())
}

/// `include − exclude` by exact identity, deduplicated, in encounter order.
///
/// A pattern escaping the root aborts the whole resolution; any other
/// per-entry failure is logged and that entry contributes nothing.
pub fn resolve_path_entries<M: GlobMatcher + ?Sized>(
    matcher: &M,
    source_locale: &str,
    include: &[PathSpec],
    exclude: &[PathSpec],
) -> Result<Vec<BucketPathEntry>, PatternError> {
    let mut seen = HashSet::new();
    let mut included = Vec::new();
    for spec in include {
        for entry in resolve_or_skip(matcher, spec, source_locale)? {
            if seen.insert(entry.clone()) {
                included.push(entry);
            }
        }
    }

    let mut excluded = HashSet::new();
    for spec in exclude {
        excluded.extend(resolve_or_skip(matcher, spec, source_locale)?);
    }

    Ok(included
        .into_iter()
        .filter(|entry| !excluded.contains(entry))
        .collect())
}

fn resolve_or_skip<M: GlobMatcher + ?Sized>(
    matcher: &M,
    spec: &PathSpec,
    source_locale: &str,
) -> Result<Vec<BucketPathEntry>, PatternError> {
    match resolve_entry(matcher, spec, source_locale) {
        Ok(entries) => Ok(entries),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::warn!(event = "pattern_entry_skipped", pattern = %spec.path, error = %err);
            Ok(Vec::new())
        }
    }
}
