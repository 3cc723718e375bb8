use clap::Args;
use color_eyre::eyre::Result;
use owo_colors::OwoColorize;

use locsync_domain::{PlanReport, PlannedTask};
use locsync_services::{plan_only, RunOptions};

use super::{load_context, FilterArgs, OutputFormat};
use crate::Globals;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn run_plan(globals: &Globals, args: PlanArgs) -> Result<()> {
    let ctx = load_context(globals)?;
    let options = RunOptions {
        filters: args.filters.to_filters()?,
        concurrency: None,
    };

    let (_, report) = plan_only(&ctx, &options)?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Text => print_plan(&report, globals.use_color),
    }
    Ok(())
}

fn print_plan(report: &PlanReport, use_color: bool) {
    if report.tasks == 0 {
        crate::ui_ok!(
            "nothing to do: {} file(s) from `{}` are up to date",
            report.files,
            report.source_locale
        );
        return;
    }
    println!(
        "{} task(s) across {} file(s), {} up to date",
        report.tasks, report.files, report.up_to_date
    );
    for group in &report.locales {
        if use_color {
            println!("{}", group.locale.bold());
        } else {
            println!("{}", group.locale);
        }
        for task in &group.tasks {
            println!("  {}", describe(task, use_color));
        }
    }
}

fn describe(task: &PlannedTask, use_color: bool) -> String {
    let keys = if task.all_keys {
        format!("all {} key(s)", task.keys.len())
    } else {
        format!("{} key(s)", task.keys.len())
    };
    let mut line = format!("[{}] {}  {}", task.bucket, task.file, keys);
    if !task.renamed.is_empty() {
        line.push_str(&format!(", {} renamed", task.renamed.len()));
    }
    if !task.removed.is_empty() {
        line.push_str(&format!(", {} removed", task.removed.len()));
    }
    if task.target_missing {
        let note = " (target missing)";
        if use_color {
            line.push_str(&note.yellow().to_string());
        } else {
            line.push_str(note);
        }
    }
    line
}
