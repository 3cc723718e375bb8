//! Continuous mode: resolve watch patterns, subscribe to file changes,
//! debounce bursts and re-run the pipeline one run at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use locsync_core::Result;
use locsync_patterns::PatternError;

use crate::context::SyncContext;
use crate::localizer::Localizer;
use crate::pipeline::RunOptions;

mod cancel;
mod debounce;
mod manager;
mod patterns;
mod source;

pub use cancel::CancelToken;
pub use debounce::{DebounceStrategy, Debouncer};
pub use manager::{PipelineRunner, SyncRunner, WatchManager, WatchStats};
pub use patterns::{resolve_watch_patterns, validate_patterns, WatchFilter, WatchPatternSet, DEFAULT_EXCLUDES};
pub use source::{ChangeEvent, ChangeKind, FsEventSource};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch pattern #{0} is empty")]
    EmptyPattern(usize),
    #[error("failed to start file watcher: {0}")]
    Init(#[source] notify::Error),
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub debounce_ms: u64,
    /// Switches to the bounded strategy.
    pub max_wait_ms: Option<u64>,
}

impl WatchOptions {
    pub fn strategy(&self) -> DebounceStrategy {
        let quiet = Duration::from_millis(self.debounce_ms);
        match self.max_wait_ms {
            Some(max) => DebounceStrategy::Bounded {
                quiet,
                max_wait: Duration::from_millis(max),
            },
            None => DebounceStrategy::Simple { quiet },
        }
    }
}

/// Watch the project until `cancel` fires. Fails only when the watch cannot start.
pub async fn watch_project<L: Localizer>(
    ctx: Arc<SyncContext>,
    localizer: Arc<L>,
    run_options: RunOptions,
    watch_options: &WatchOptions,
    cancel: CancelToken,
) -> Result<WatchStats> {
    let patterns = resolve_watch_patterns(&ctx, &watch_options.include, &watch_options.exclude)?;
    let filter = WatchFilter::new(&ctx.root, &patterns)?;
    let (source, events) = FsEventSource::start(&ctx.root)?;
    tracing::info!(
        event = "watch_started",
        include = patterns.include.len(),
        exclude = patterns.exclude.len(),
        files = patterns.resolved.len()
    );

    let runner = Arc::new(SyncRunner::new(ctx, localizer, run_options));
    let manager = WatchManager::new(runner, filter, watch_options.strategy());
    let stats = manager.run_with_subscription(events, cancel, source).await;
    tracing::info!(event = "watch_stopped", runs = stats.runs, failed_runs = stats.failed_runs);
    Ok(stats)
}
