use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use locsync_core::{KeyMap, Result};
use locsync_domain::{PlanLocaleGroup, PlanReport, PlannedTask, SCHEMA_VERSION};
use locsync_loaders::{create_loader, BucketLoader, LoadError};
use locsync_patterns::{BucketPathEntry, WildcardGlob};

use crate::buckets::{KeyRules, ResolvedBucket};
use crate::context::SyncContext;
use crate::delta::{compute_delta, Delta};
use crate::lockfile::Lockfile;

/// Invocation-level narrowing of a run.
#[derive(Debug, Clone, Default)]
pub struct PlanFilters {
    pub locales: Vec<String>,
    pub buckets: Vec<String>,
    pub files: Vec<WildcardGlob>,
    pub keys: Vec<WildcardGlob>,
    pub force: bool,
}

impl PlanFilters {
    /// Every target locale and every key of a file is considered.
    pub fn covers_all_keys_and_locales(&self) -> bool {
        self.locales.is_empty() && self.keys.is_empty()
    }

    fn accepts_locale(&self, locale: &str) -> bool {
        self.locales.is_empty() || self.locales.iter().any(|l| l == locale)
    }

    fn accepts_bucket(&self, bucket: &str) -> bool {
        self.buckets.is_empty() || self.buckets.iter().any(|b| b == bucket)
    }

    fn accepts_file(&self, path_pattern: &str, source_path: &str) -> bool {
        self.files.is_empty()
            || self
                .files
                .iter()
                .any(|g| g.is_match_or_contains(path_pattern) || g.is_match_or_contains(source_path))
    }

    fn accepts_key(&self, key: &str) -> bool {
        self.keys.is_empty() || self.keys.iter().any(|g| g.is_match(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySubset {
    All,
    Keys(Vec<String>),
}

impl KeySubset {
    pub fn resolve<'a>(&'a self, source: &'a KeyMap) -> Vec<&'a str> {
        match self {
            KeySubset::All => source.keys().map(String::as_str).collect(),
            KeySubset::Keys(keys) => keys.iter().map(String::as_str).collect(),
        }
    }
}

/// One source file taking part in a run, shared by all of its tasks.
pub struct PlannedFile {
    pub bucket_type: String,
    pub entry: BucketPathEntry,
    pub rules: Arc<KeyRules>,
    /// Source content with ignored keys removed.
    pub source: KeyMap,
    pub loader: Arc<dyn BucketLoader>,
}

impl std::fmt::Debug for PlannedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedFile")
            .field("bucket_type", &self.bucket_type)
            .field("entry", &self.entry)
            .field("keys", &self.source.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: usize,
    pub file: Arc<PlannedFile>,
    pub locale: String,
    pub keys: KeySubset,
    pub delta: Delta,
}

impl Task {
    pub fn key_count(&self) -> usize {
        match &self.keys {
            KeySubset::All => self.file.source.len(),
            KeySubset::Keys(k) => k.len(),
        }
    }

    fn to_report(&self) -> PlannedTask {
        PlannedTask {
            bucket: self.file.bucket_type.clone(),
            file: self.file.entry.path_pattern.clone(),
            locale: self.locale.clone(),
            all_keys: self.keys == KeySubset::All,
            keys: self.keys.resolve(&self.file.source).into_iter().map(str::to_string).collect(),
            renamed: self.delta.renamed.clone(),
            removed: self.delta.removed.clone(),
            target_missing: self.delta.target_missing,
        }
    }
}

#[derive(Debug, Default)]
pub struct Plan {
    pub tasks: Vec<Task>,
    pub files: Vec<Arc<PlannedFile>>,
    /// File/locale pairs that were examined and found up to date.
    pub up_to_date: usize,
    /// Whether the lockfile may be updated from this plan's outcome.
    pub full_coverage: bool,
}

impl Plan {
    /// Tasks grouped by target locale, locales in first-seen order.
    pub fn by_locale(&self) -> Vec<(&str, Vec<&Task>)> {
        let mut groups: Vec<(&str, Vec<&Task>)> = Vec::new();
        for task in &self.tasks {
            match groups.iter_mut().find(|(l, _)| *l == task.locale) {
                Some((_, tasks)) => tasks.push(task),
                None => groups.push((task.locale.as_str(), vec![task])),
            }
        }
        groups
    }

    pub fn to_report(&self, source_locale: &str) -> PlanReport {
        PlanReport {
            schema_version: SCHEMA_VERSION,
            source_locale: source_locale.to_string(),
            files: self.files.len(),
            tasks: self.tasks.len(),
            up_to_date: self.up_to_date,
            locales: self
                .by_locale()
                .into_iter()
                .map(|(locale, tasks)| PlanLocaleGroup {
                    locale: locale.to_string(),
                    tasks: tasks.into_iter().map(Task::to_report).collect(),
                })
                .collect(),
        }
    }
}

/// Walk buckets × files × target locales and emit one task per file/locale
/// with pending keys.
pub fn build_plan(
    ctx: &SyncContext,
    buckets: &[ResolvedBucket],
    lockfile: &Lockfile,
    filters: &PlanFilters,
) -> Result<Plan> {
    let source_locale = ctx.source_locale();
    for locale in &filters.locales {
        if !ctx.config.target_locales.contains(locale) {
            tracing::warn!(event = "unknown_locale_filter", locale = %locale, "not a configured target locale");
        }
    }

    let mut plan = Plan {
        full_coverage: filters.covers_all_keys_and_locales(),
        ..Default::default()
    };
    // one task per physical target file, whichever entries lead to it
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for bucket in buckets {
        if !filters.accepts_bucket(&bucket.bucket_type) {
            continue;
        }
        for entry in &bucket.entries {
            let source_path = entry.path_for(source_locale);
            if !filters.accepts_file(&entry.path_pattern, &source_path) {
                continue;
            }
            let Some(file) = plan_file(ctx, bucket, entry)? else {
                continue;
            };
            let file = Arc::new(file);
            plan.files.push(file.clone());

            for locale in &ctx.config.target_locales {
                if !filters.accepts_locale(locale) {
                    continue;
                }
                let target_path = file.loader.path_for(locale);
                if !seen.insert(target_path.clone()) {
                    tracing::warn!(
                        event = "duplicate_task_skipped",
                        file = %entry.identity(),
                        locale = %locale,
                        target = %target_path.display(),
                        "target file already planned by another entry"
                    );
                    continue;
                }
                let target = pull_target(&file, locale);
                let delta = compute_delta(
                    &file.source,
                    target.as_ref(),
                    lockfile.entry(&entry.identity()),
                );
                let keys = if filters.force {
                    if filters.keys.is_empty() {
                        KeySubset::All
                    } else {
                        KeySubset::Keys(
                            file.source.keys().filter(|k| filters.accepts_key(k)).cloned().collect(),
                        )
                    }
                } else {
                    KeySubset::Keys(
                        delta
                            .pending_keys()
                            .into_iter()
                            .filter(|k| filters.accepts_key(k))
                            .collect(),
                    )
                };
                if matches!(&keys, KeySubset::Keys(k) if k.is_empty()) || file.source.is_empty() {
                    plan.up_to_date += 1;
                    continue;
                }
                tracing::debug!(
                    event = "task_planned",
                    bucket = %file.bucket_type,
                    file = %entry.path_pattern,
                    locale = %locale,
                    added = delta.added.len(),
                    updated = delta.updated.len(),
                    renamed = delta.renamed.len(),
                    removed = delta.removed.len(),
                    target_missing = delta.target_missing
                );
                plan.tasks.push(Task {
                    id: plan.tasks.len(),
                    file: file.clone(),
                    locale: locale.clone(),
                    keys,
                    delta,
                });
            }
        }
    }
    tracing::info!(
        event = "plan_built",
        files = plan.files.len(),
        tasks = plan.tasks.len(),
        up_to_date = plan.up_to_date,
        force = filters.force
    );
    Ok(plan)
}

fn plan_file(ctx: &SyncContext, bucket: &ResolvedBucket, entry: &BucketPathEntry) -> Result<Option<PlannedFile>> {
    let mut loader = create_loader(&bucket.bucket_type, &ctx.root, entry)?;
    loader.set_default_locale(ctx.source_locale());
    let source = match loader.init().and_then(|_| loader.pull(ctx.source_locale())) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(
                event = "source_unreadable",
                bucket = %bucket.bucket_type,
                file = %entry.path_pattern,
                error = %err
            );
            return Ok(None);
        }
    };
    let source = strip_ignored(source, &bucket.rules);
    Ok(Some(PlannedFile {
        bucket_type: bucket.bucket_type.clone(),
        entry: entry.clone(),
        rules: bucket.rules.clone(),
        source,
        loader: Arc::from(loader),
    }))
}

/// `None` when the target cannot be used; a malformed file is flagged, not fatal.
fn pull_target(file: &PlannedFile, locale: &str) -> Option<KeyMap> {
    match file.loader.pull(locale) {
        Ok(data) => Some(strip_ignored(data, &file.rules)),
        Err(LoadError::NotFound(_)) => None,
        Err(err) => {
            tracing::warn!(
                event = "target_unreadable",
                file = %file.entry.path_pattern,
                locale = %locale,
                error = %err,
                "treating locale as 0% complete"
            );
            None
        }
    }
}

fn strip_ignored(mut data: KeyMap, rules: &KeyRules) -> KeyMap {
    data.retain(|k, _| !rules.is_ignored(k));
    data
}
