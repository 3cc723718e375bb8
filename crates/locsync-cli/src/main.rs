use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::{debug, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "locsync", version, about = "Placeholder-aware localization file sync")]
struct Cli {
    /// Project root holding locsync.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file to use instead of <root>/locsync.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only warnings and errors on the console
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Localize everything that changed since the last recorded run
    Run(commands::run::RunArgs),

    /// Show the tasks a run would execute, without localizing anything
    Plan(commands::plan::PlanArgs),

    /// Dump JSON Schemas of the report types
    Schema {
        #[arg(long, default_value = "./docs/assets/schemas")]
        out_dir: PathBuf,
    },
}

/// Flags shared by every subcommand.
pub struct Globals {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub use_color: bool,
}

trait Runnable {
    fn run(self, globals: &Globals) -> Result<()>;
}

impl Runnable for Commands {
    fn run(self, globals: &Globals) -> Result<()> {
        let cmd_name = match &self {
            Commands::Run(_) => "run",
            Commands::Plan(_) => "plan",
            Commands::Schema { .. } => "schema",
        };
        debug!(event = "command_started", command = cmd_name);

        let result = match self {
            Commands::Run(args) => commands::run::run_run(globals, args),
            Commands::Plan(args) => commands::plan::run_plan(globals, args),
            Commands::Schema { out_dir } => commands::schema::run_schema(out_dir),
        };

        match &result {
            Ok(_) => debug!(event = "command_finished", command = cmd_name),
            Err(e) => error!(event = "command_failed", command = cmd_name, error = %e),
        }

        result
    }
}

/// Console layer on stderr (stdout carries reports) plus a daily debug log file.
/// The returned guard flushes the file writer on drop.
fn init_tracing(quiet: bool) -> WorkerGuard {
    let file_appender = rolling::daily("logs", "locsync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if quiet { "warn" } else { "info" };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        );

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _guard = init_tracing(cli.quiet);

    let use_color = !cli.no_color
        && std::io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none();

    let globals = Globals {
        root: cli.root,
        config: cli.config,
        use_color,
    };
    cli.cmd.run(&globals)
}
