use clap::{Args, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};

use locsync_patterns::WildcardGlob;
use locsync_services::{PlanFilters, SyncContext};

use crate::Globals;

pub mod plan;
pub mod run;
pub mod schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON document on a single line
    Json,
}

/// Narrowing shared by `run` and `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only these target locales (repeatable)
    #[arg(long = "locale", value_name = "LOCALE")]
    pub locales: Vec<String>,

    /// Only these bucket types (repeatable)
    #[arg(long = "bucket", value_name = "TYPE")]
    pub buckets: Vec<String>,

    /// Only files whose path matches the glob, or contains it when it has no wildcard
    #[arg(long = "file", value_name = "GLOB")]
    pub files: Vec<String>,

    /// Only keys matching the glob (repeatable)
    #[arg(long = "key", value_name = "GLOB")]
    pub keys: Vec<String>,

    /// Localize every key, ignoring recorded checksums
    #[arg(long)]
    pub force: bool,
}

impl FilterArgs {
    pub fn to_filters(&self) -> Result<PlanFilters> {
        Ok(PlanFilters {
            locales: self.locales.clone(),
            buckets: self.buckets.clone(),
            files: compile_globs(&self.files).wrap_err("invalid --file pattern")?,
            keys: compile_globs(&self.keys).wrap_err("invalid --key pattern")?,
            force: self.force,
        })
    }
}

fn compile_globs(raw: &[String]) -> Result<Vec<WildcardGlob>> {
    let mut out = Vec::with_capacity(raw.len());
    for p in raw {
        out.push(WildcardGlob::new(p)?);
    }
    Ok(out)
}

pub fn load_context(globals: &Globals) -> Result<SyncContext> {
    SyncContext::load(&globals.root, globals.config.as_deref())
}
