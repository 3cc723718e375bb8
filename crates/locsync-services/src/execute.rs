//! Bounded-concurrency task execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use locsync_core::KeyMap;
use locsync_loaders::LoadError;

use crate::localizer::{LocalizeError, LocalizeRequest, Localizer};
use crate::plan::{KeySubset, Task};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const MAX_CONCURRENCY: usize = 32;

/// Requested concurrency, defaulted and clamped to `1..=MAX_CONCURRENCY`.
pub fn effective_concurrency(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_CONCURRENCY).clamp(1, MAX_CONCURRENCY)
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Localize(#[from] LocalizeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// `localized` keys went through the localizer; the rest were moved, copied or injected.
    Succeeded { localized: usize },
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: usize,
    pub outcome: TaskOutcome,
}

/// Run every task with at most `concurrency` in flight. Failures are recorded
/// per task and never cancel siblings; the result list has one entry per task,
/// in task order.
pub async fn execute_tasks<L: Localizer>(
    tasks: &[Task],
    localizer: Arc<L>,
    source_locale: &str,
    concurrency: Option<usize>,
) -> Vec<TaskResult> {
    let limit = effective_concurrency(concurrency);
    tracing::info!(event = "execute_started", tasks = tasks.len(), concurrency = limit);

    let semaphore = Arc::new(Semaphore::new(limit));
    let mut set = JoinSet::new();
    let mut results: BTreeMap<usize, TaskOutcome> = BTreeMap::new();

    for task in tasks.iter().cloned() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(e) => {
                results.insert(task.id, TaskOutcome::Failed { reason: e.to_string() });
                continue;
            }
        };
        let localizer = localizer.clone();
        let source_locale = source_locale.to_string();
        set.spawn(async move {
            let _permit = permit;
            let outcome = match run_task(&task, localizer.as_ref(), &source_locale).await {
                Ok(localized) => {
                    tracing::info!(
                        event = "task_succeeded",
                        file = %task.file.entry.path_pattern,
                        locale = %task.locale,
                        localized
                    );
                    TaskOutcome::Succeeded { localized }
                }
                Err(err) => {
                    tracing::warn!(
                        event = "task_failed",
                        file = %task.file.entry.path_pattern,
                        locale = %task.locale,
                        error = %err
                    );
                    TaskOutcome::Failed { reason: err.to_string() }
                }
            };
            (task.id, outcome)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, outcome)) => {
                results.insert(id, outcome);
            }
            Err(err) => tracing::error!(event = "task_panicked", error = %err),
        }
    }

    tasks
        .iter()
        .map(|t| TaskResult {
            task_id: t.id,
            outcome: results.remove(&t.id).unwrap_or_else(|| TaskOutcome::Failed {
                reason: "task aborted before completion".to_string(),
            }),
        })
        .collect()
}

/// Pull the target, carry renames and removals over, localize what is still
/// pending, apply key rules and write the result back in one piece.
pub(crate) async fn run_task<L: Localizer>(task: &Task, localizer: &L, source_locale: &str) -> Result<usize, TaskError> {
    let file = &task.file;
    let rules = &file.rules;
    let mut target = match file.loader.pull(&task.locale) {
        Ok(data) => data,
        Err(LoadError::NotFound(_)) => KeyMap::new(),
        Err(LoadError::Malformed { path, reason, .. }) => {
            tracing::warn!(event = "target_rewritten", path = %path.display(), reason = %reason);
            KeyMap::new()
        }
        Err(err) => return Err(err.into()),
    };

    for key in &task.delta.removed {
        target.remove(key);
    }
    let mut moved = Vec::new();
    for (old, new) in &task.delta.renamed {
        if let Some(value) = target.remove(old) {
            target.insert(new.clone(), value);
            moved.push(new.as_str());
        }
    }

    let pending: KeyMap = task
        .keys
        .resolve(&file.source)
        .into_iter()
        .filter(|k| !rules.is_fixed(k))
        .filter(|k| task.keys == KeySubset::All || !moved.contains(k))
        .filter_map(|k| file.source.get(k).map(|v| (k.to_string(), v.clone())))
        .collect();

    let localized = pending.len();
    if !pending.is_empty() {
        let expected: Vec<String> = pending.keys().cloned().collect();
        let translated = localizer
            .localize(LocalizeRequest {
                bucket_type: file.bucket_type.clone(),
                file: file.entry.path_pattern.clone(),
                source_locale: source_locale.to_string(),
                target_locale: task.locale.clone(),
                data: pending,
            })
            .await?;
        for key in expected {
            let value = translated
                .get(&key)
                .cloned()
                .ok_or_else(|| LocalizeError::MissingKey(key.clone()))?;
            target.insert(key, value);
        }
    }

    for (key, value) in &file.source {
        if rules.is_injected(key) {
            target.insert(key.clone(), task.locale.clone());
        } else if rules.is_locked(key) {
            target.insert(key.clone(), value.clone());
        }
    }
    target.retain(|k, _| file.source.contains_key(k) || rules.is_ignored(k));

    file.loader.push(&task.locale, &target)?;
    Ok(localized)
}
