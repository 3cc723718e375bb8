use std::sync::Arc;

use color_eyre::eyre::WrapErr;

use locsync_core::Result;
use locsync_domain::{PlanReport, RunSummary, TaskReport, TaskStatus};

use crate::buckets::resolve_buckets;
use crate::context::SyncContext;
use crate::execute::{execute_tasks, TaskOutcome, TaskResult};
use crate::localizer::Localizer;
use crate::lockfile::Lockfile;
use crate::plan::{build_plan, Plan, PlanFilters};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub filters: PlanFilters,
    /// Overrides the configured concurrency.
    pub concurrency: Option<usize>,
}

/// Resolve buckets and build a plan without executing anything.
pub fn plan_only(ctx: &SyncContext, options: &RunOptions) -> Result<(Plan, PlanReport)> {
    let buckets = resolve_buckets(ctx)?;
    let lockfile = Lockfile::load(&ctx.lockfile_path)?;
    let plan = build_plan(ctx, &buckets, &lockfile, &options.filters)?;
    let report = plan.to_report(ctx.source_locale());
    Ok((plan, report))
}

/// One full pass: resolve, plan, execute, then record checksums for every
/// file whose tasks all succeeded.
pub async fn run_once<L: Localizer>(ctx: &SyncContext, localizer: Arc<L>, options: &RunOptions) -> Result<RunSummary> {
    let buckets = resolve_buckets(ctx)?;
    let mut lockfile = Lockfile::load(&ctx.lockfile_path)?;
    let plan = build_plan(ctx, &buckets, &lockfile, &options.filters)?;

    let concurrency = options.concurrency.or(ctx.config.run.concurrency);
    let results = execute_tasks(&plan.tasks, localizer, ctx.source_locale(), concurrency).await;

    let updated = if plan.full_coverage {
        record_successes(&plan, &results, &mut lockfile)
    } else {
        tracing::debug!(event = "lockfile_skipped", "run was narrowed by locale or key filters");
        0
    };
    if updated > 0 {
        lockfile
            .save(&ctx.lockfile_path)
            .wrap_err("writing lockfile")?;
    }

    let reports = plan
        .tasks
        .iter()
        .zip(&results)
        .map(|(task, result)| {
            let (status, error) = match &result.outcome {
                TaskOutcome::Succeeded { .. } => (TaskStatus::Succeeded, None),
                TaskOutcome::Failed { reason } => (TaskStatus::Failed, Some(reason.clone())),
            };
            TaskReport {
                bucket: task.file.bucket_type.clone(),
                file: task.file.entry.path_pattern.clone(),
                locale: task.locale.clone(),
                keys: task.key_count(),
                renamed: task.delta.renamed.len(),
                removed: task.delta.removed.len(),
                status,
                error,
            }
        })
        .collect();
    let summary = RunSummary::from_tasks(reports, updated);
    tracing::info!(
        event = "run_finished",
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        lockfile_updated = summary.lockfile_updated
    );
    Ok(summary)
}

fn record_successes(plan: &Plan, results: &[TaskResult], lockfile: &mut Lockfile) -> usize {
    let mut updated = 0;
    for file in &plan.files {
        let all_ok = plan
            .tasks
            .iter()
            .zip(results)
            .filter(|(task, _)| Arc::ptr_eq(&task.file, file))
            .all(|(_, result)| result.outcome.is_success());
        if all_ok && lockfile.record(&file.entry.identity(), &file.source) {
            updated += 1;
        }
    }
    updated
}
