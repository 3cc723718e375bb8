use std::sync::Arc;

use color_eyre::eyre::eyre;

use locsync_config::BucketConfig;
use locsync_core::{LocSyncError, Result};
use locsync_patterns::{any_match, resolve_path_entries, BucketPathEntry, FsGlobMatcher, PatternError, WildcardGlob};

use crate::context::SyncContext;

/// Locked, ignored and locale-injected key patterns of one bucket.
#[derive(Debug, Clone, Default)]
pub struct KeyRules {
    locked: Vec<WildcardGlob>,
    ignored: Vec<WildcardGlob>,
    inject_locale: Vec<WildcardGlob>,
}

impl KeyRules {
    pub fn new(locked: &[String], ignored: &[String], inject_locale: &[String]) -> std::result::Result<Self, PatternError> {
        let compile = |list: &[String]| list.iter().map(|p| WildcardGlob::new(p)).collect::<std::result::Result<Vec<_>, _>>();
        Ok(Self {
            locked: compile(locked)?,
            ignored: compile(ignored)?,
            inject_locale: compile(inject_locale)?,
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        any_match(&self.locked, key)
    }

    pub fn is_ignored(&self, key: &str) -> bool {
        any_match(&self.ignored, key)
    }

    pub fn is_injected(&self, key: &str) -> bool {
        any_match(&self.inject_locale, key)
    }

    /// Copied or injected rather than localized.
    pub fn is_fixed(&self, key: &str) -> bool {
        self.is_locked(key) || self.is_injected(key)
    }
}

/// A configured bucket with its path entries resolved against the filesystem.
#[derive(Debug, Clone)]
pub struct ResolvedBucket {
    pub bucket_type: String,
    pub entries: Vec<BucketPathEntry>,
    pub rules: Arc<KeyRules>,
}

pub fn resolve_bucket(ctx: &SyncContext, bucket: &BucketConfig) -> Result<ResolvedBucket> {
    let matcher = FsGlobMatcher::new(&ctx.root);
    let entries = resolve_path_entries(&matcher, ctx.source_locale(), &bucket.include, &bucket.exclude)
        .map_err(|e| LocSyncError::Config(format!("bucket `{}`: {e}", bucket.bucket_type)))?;
    let rules = KeyRules::new(&bucket.locked_keys, &bucket.ignored_keys, &bucket.inject_locale)
        .map_err(|e| eyre!("bucket `{}`: {e}", bucket.bucket_type))?;
    tracing::info!(
        event = "bucket_resolved",
        bucket = %bucket.bucket_type,
        entries = entries.len()
    );
    if entries.is_empty() {
        tracing::warn!(event = "bucket_empty", bucket = %bucket.bucket_type, "include patterns matched no files");
    }
    Ok(ResolvedBucket {
        bucket_type: bucket.bucket_type.clone(),
        entries,
        rules: Arc::new(rules),
    })
}

pub fn resolve_buckets(ctx: &SyncContext) -> Result<Vec<ResolvedBucket>> {
    ctx.config
        .buckets
        .iter()
        .map(|b| resolve_bucket(ctx, b))
        .collect()
}
