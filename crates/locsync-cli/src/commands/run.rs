use std::sync::Arc;

use clap::{Args, ValueEnum};
use color_eyre::eyre::{bail, Result};
use owo_colors::OwoColorize;

use locsync_domain::{RunSummary, TaskStatus};
use locsync_services::watch::{watch_project, CancelToken, WatchOptions};
use locsync_services::{run_once, Localizer, PseudoLocalizer, RunOptions, SyncContext};

use super::{load_context, FilterArgs, OutputFormat};
use crate::Globals;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LocalizerKind {
    /// Offline accent-and-bracket transform
    #[default]
    Pseudo,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Parallel localization tasks, clamped to 1..=32
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep running and re-sync when watched files change
    #[arg(long)]
    pub watch: bool,

    /// Quiet period before a watch run, in milliseconds
    #[arg(long, value_name = "MS", requires = "watch")]
    pub debounce: Option<u64>,

    /// Upper bound on how long a burst of changes can postpone a watch run
    #[arg(long, value_name = "MS", requires = "watch")]
    pub max_wait: Option<u64>,

    /// Extra glob to watch (repeatable)
    #[arg(long = "watch-include", value_name = "GLOB", requires = "watch")]
    pub watch_include: Vec<String>,

    /// Glob to ignore while watching (repeatable)
    #[arg(long = "watch-exclude", value_name = "GLOB", requires = "watch")]
    pub watch_exclude: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, value_enum, default_value_t = LocalizerKind::Pseudo)]
    pub localizer: LocalizerKind,
}

pub fn run_run(globals: &Globals, args: RunArgs) -> Result<()> {
    let mut ctx = load_context(globals)?;
    ctx.config.run = ctx
        .config
        .run
        .clone()
        .with_overrides(args.concurrency, args.debounce, args.max_wait);

    let options = RunOptions {
        filters: args.filters.to_filters()?,
        concurrency: ctx.config.run.concurrency,
    };

    let localizer = match args.localizer {
        LocalizerKind::Pseudo => Arc::new(PseudoLocalizer),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(sync(ctx, localizer, options, args, globals.use_color))
}

async fn sync<L: Localizer>(
    ctx: SyncContext,
    localizer: Arc<L>,
    options: RunOptions,
    args: RunArgs,
    use_color: bool,
) -> Result<()> {
    let summary = run_once(&ctx, localizer.clone(), &options).await?;
    print_summary(&summary, args.format, use_color)?;
    if !options.filters.covers_all_keys_and_locales() {
        crate::ui_warn!("lockfile left unchanged: --locale or --key narrowed this run");
    }

    if !args.watch {
        if summary.has_failures() {
            bail!("{} of {} task(s) failed", summary.failed, summary.total);
        }
        return Ok(());
    }

    let watch_options = WatchOptions {
        include: args.watch_include,
        exclude: args.watch_exclude,
        debounce_ms: ctx.config.run.debounce_ms,
        max_wait_ms: ctx.config.run.max_wait_ms,
    };
    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(event = "shutdown_requested");
            on_signal.cancel();
        }
    });

    crate::ui_info!("watching for changes, press Ctrl+C to stop");
    let stats = watch_project(Arc::new(ctx), localizer, options, &watch_options, cancel).await?;
    crate::ui_info!(
        "watch stopped after {} run(s), {} failed",
        stats.runs,
        stats.failed_runs
    );
    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat, use_color: bool) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    if summary.total == 0 {
        crate::ui_ok!("everything is up to date");
        return Ok(());
    }
    for locale in &summary.locales {
        let failed = format!("{} failed", locale.failed);
        let failed = if use_color && locale.failed > 0 {
            failed.red().to_string()
        } else {
            failed
        };
        let name = if use_color {
            locale.locale.bold().to_string()
        } else {
            locale.locale.clone()
        };
        println!(
            "{}: {} task(s), {} succeeded, {}",
            name, locale.tasks, locale.succeeded, failed
        );
    }
    for task in summary.tasks.iter().filter(|t| t.status == TaskStatus::Failed) {
        crate::ui_err!(
            "{} [{}] {}: {}",
            task.file,
            task.locale,
            task.bucket,
            task.error.as_deref().unwrap_or("unknown error")
        );
    }
    if summary.failed == 0 {
        crate::ui_ok!(
            "{} task(s) succeeded, {} lockfile entr(ies) updated",
            summary.succeeded,
            summary.lockfile_updated
        );
    }
    Ok(())
}
