//! Orchestration over the lower-level crates: bucket setup, delta computation,
//! planning, bounded execution and the watch loop. Used by the CLI.

pub use locsync_core::Result;

pub mod buckets;
pub mod context;
pub mod delta;
pub mod execute;
pub mod localizer;
pub mod lockfile;
pub mod pipeline;
pub mod plan;
pub mod watch;

pub use buckets::{resolve_buckets, KeyRules, ResolvedBucket};
pub use context::SyncContext;
pub use delta::{compute_delta, Delta};
pub use execute::{effective_concurrency, execute_tasks, TaskOutcome, TaskResult, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use localizer::{pseudo_localize, LocalizeError, LocalizeRequest, Localizer, PseudoLocalizer};
pub use lockfile::{Lockfile, LockfileError};
pub use pipeline::{plan_only, run_once, RunOptions};
pub use plan::{build_plan, KeySubset, Plan, PlanFilters, PlannedFile, Task};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use locsync_core::KeyMap;
    use locsync_loaders::{BucketLoader, LoadError};
    use locsync_patterns::BucketPathEntry;

    use crate::buckets::KeyRules;
    use crate::delta::Delta;
    use crate::plan::{KeySubset, PlannedFile, Task};

    /// In-memory bucket file keyed by locale.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryLoader {
        pub files: Arc<Mutex<BTreeMap<String, KeyMap>>>,
    }

    impl MemoryLoader {
        pub fn get(&self, locale: &str) -> Option<KeyMap> {
            self.files.lock().expect("lock").get(locale).cloned()
        }
    }

    impl BucketLoader for MemoryLoader {
        fn bucket_type(&self) -> &'static str {
            "memory"
        }
        fn set_default_locale(&mut self, _locale: &str) {}
        fn init(&mut self) -> Result<(), LoadError> {
            Ok(())
        }
        fn path_for(&self, locale: &str) -> PathBuf {
            PathBuf::from(format!("{locale}.mem"))
        }
        fn pull(&self, locale: &str) -> Result<KeyMap, LoadError> {
            self.get(locale).ok_or_else(|| LoadError::NotFound(self.path_for(locale)))
        }
        fn push(&self, locale: &str, data: &KeyMap) -> Result<(), LoadError> {
            self.files.lock().expect("lock").insert(locale.to_string(), data.clone());
            Ok(())
        }
    }

    pub fn map(pairs: &[(&str, &str)]) -> KeyMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    pub fn planned_file(name: &str, source: KeyMap, rules: KeyRules, loader: MemoryLoader) -> Arc<PlannedFile> {
        Arc::new(PlannedFile {
            bucket_type: "memory".into(),
            entry: BucketPathEntry {
                path_pattern: format!("{name}/[locale].mem"),
                delimiter: None,
            },
            rules: Arc::new(rules),
            source,
            loader: Arc::new(loader),
        })
    }

    pub fn task(id: usize, file: &Arc<PlannedFile>, locale: &str, delta: Delta) -> Task {
        Task {
            id,
            file: file.clone(),
            locale: locale.into(),
            keys: KeySubset::Keys(delta.pending_keys()),
            delta,
        }
    }
}
