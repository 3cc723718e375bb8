use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskReport {
    pub bucket: String,
    pub file: String,
    pub locale: String,
    pub keys: usize,
    pub renamed: usize,
    pub removed: usize,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocaleSummary {
    pub locale: String,
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub schema_version: u32,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub locales: Vec<LocaleSummary>,
    pub tasks: Vec<TaskReport>,
    /// Bucket files whose lockfile entry was rewritten after this run.
    pub lockfile_updated: usize,
}

impl RunSummary {
    /// Totals and per-locale counts, locales in first-seen order.
    pub fn from_tasks(tasks: Vec<TaskReport>, lockfile_updated: usize) -> Self {
        let mut locales: Vec<LocaleSummary> = Vec::new();
        for t in &tasks {
            let idx = match locales.iter().position(|l| l.locale == t.locale) {
                Some(i) => i,
                None => {
                    locales.push(LocaleSummary {
                        locale: t.locale.clone(),
                        ..Default::default()
                    });
                    locales.len() - 1
                }
            };
            let entry = &mut locales[idx];
            entry.tasks += 1;
            match t.status {
                TaskStatus::Succeeded => entry.succeeded += 1,
                TaskStatus::Failed => entry.failed += 1,
            }
        }
        let succeeded = locales.iter().map(|l| l.succeeded).sum();
        let failed = locales.iter().map(|l| l.failed).sum();
        Self {
            schema_version: SCHEMA_VERSION,
            total: tasks.len(),
            succeeded,
            failed,
            locales,
            tasks,
            lockfile_updated,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedTask {
    pub bucket: String,
    pub file: String,
    pub locale: String,
    /// `true` when every source key is pending (force mode).
    pub all_keys: bool,
    pub keys: Vec<String>,
    pub renamed: Vec<(String, String)>,
    pub removed: Vec<String>,
    pub target_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanLocaleGroup {
    pub locale: String,
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanReport {
    pub schema_version: u32,
    pub source_locale: String,
    pub files: usize,
    pub tasks: usize,
    /// File/locale pairs with nothing pending.
    pub up_to_date: usize,
    pub locales: Vec<PlanLocaleGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WatchPatternReport {
    pub schema_version: u32,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub resolved: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(locale: &str, status: TaskStatus) -> TaskReport {
        TaskReport {
            bucket: "json".into(),
            file: "locales/[locale].json".into(),
            locale: locale.into(),
            keys: 1,
            renamed: 0,
            removed: 0,
            status,
            error: None,
        }
    }

    #[test]
    fn summary_groups_by_locale() {
        let s = RunSummary::from_tasks(
            vec![
                task("fr", TaskStatus::Succeeded),
                task("es", TaskStatus::Failed),
                task("fr", TaskStatus::Failed),
            ],
            0,
        );
        assert_eq!(s.total, 3);
        assert_eq!(s.failed, 2);
        assert!(s.has_failures());
        assert_eq!(s.locales[0].locale, "fr");
        assert_eq!(s.locales[0].succeeded, 1);
        assert_eq!(s.locales[1], LocaleSummary { locale: "es".into(), tasks: 1, succeeded: 0, failed: 1 });
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&task("fr", TaskStatus::Succeeded)).expect("json");
        assert!(json.contains("\"status\":\"succeeded\""));
        assert!(!json.contains("error"));
    }
}
