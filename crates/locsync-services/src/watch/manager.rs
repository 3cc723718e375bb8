use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use locsync_core::Result;
use locsync_domain::RunSummary;

use super::cancel::CancelToken;
use super::debounce::{DebounceStrategy, Debouncer};
use super::patterns::WatchFilter;
use super::source::ChangeEvent;
use crate::context::SyncContext;
use crate::localizer::Localizer;
use crate::pipeline::{run_once, RunOptions};

/// What the watch loop re-runs after every debounced burst.
pub trait PipelineRunner: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = Result<RunSummary>> + Send;
}

/// Re-resolves buckets, plans and executes against the project on every run.
pub struct SyncRunner<L> {
    ctx: Arc<SyncContext>,
    localizer: Arc<L>,
    options: RunOptions,
}

impl<L: Localizer> SyncRunner<L> {
    pub fn new(ctx: Arc<SyncContext>, localizer: Arc<L>, options: RunOptions) -> Self {
        Self {
            ctx,
            localizer,
            options,
        }
    }
}

impl<L: Localizer> PipelineRunner for SyncRunner<L> {
    async fn run(&self) -> Result<RunSummary> {
        run_once(&self.ctx, self.localizer.clone(), &self.options).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub events_accepted: usize,
    pub events_ignored: usize,
    pub runs: usize,
    pub failed_runs: usize,
}

type RunHandle = JoinHandle<Result<RunSummary>>;

/// Single-consumer loop over change events. At most one run is in flight;
/// events arriving meanwhile re-arm the debouncer and lead to one follow-up run.
pub struct WatchManager<R> {
    runner: Arc<R>,
    filter: WatchFilter,
    strategy: DebounceStrategy,
}

impl<R: PipelineRunner> WatchManager<R> {
    pub fn new(runner: Arc<R>, filter: WatchFilter, strategy: DebounceStrategy) -> Self {
        Self {
            runner,
            filter,
            strategy,
        }
    }

    /// Same as [`run`](Self::run), holding `subscription` only until `cancel`
    /// fires; an in-flight run drains after it is released.
    pub async fn run_with_subscription<S>(
        self,
        events: UnboundedReceiver<ChangeEvent>,
        cancel: CancelToken,
        subscription: S,
    ) -> WatchStats {
        let run = self.run(events, cancel.clone());
        tokio::pin!(run);
        tokio::select! {
            stats = &mut run => stats,
            _ = cancel.cancelled() => {
                drop(subscription);
                tracing::debug!(event = "watch_unsubscribed");
                run.await
            }
        }
    }

    /// Runs until `cancel` fires or the event stream ends, then waits for an
    /// in-flight run to finish.
    pub async fn run(self, mut events: UnboundedReceiver<ChangeEvent>, cancel: CancelToken) -> WatchStats {
        let mut stats = WatchStats::default();
        let mut debouncer = Debouncer::new(self.strategy);
        let mut running: Option<RunHandle> = None;

        loop {
            let deadline = if running.is_none() { debouncer.deadline() } else { None };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(event = "watch_shutdown", "interrupt received");
                    break;
                }
                joined = join_running(&mut running) => {
                    running = None;
                    finish_run(joined, &mut stats);
                    if debouncer.is_pending() {
                        tracing::debug!(event = "watch_follow_up_pending");
                    }
                }
                received = events.recv() => match received {
                    Some(change) => {
                        if self.filter.accepts(&change.path) {
                            stats.events_accepted += 1;
                            debouncer.record(Instant::now());
                            tracing::info!(
                                event = "watch_change",
                                path = %change.path.display(),
                                kind = ?change.kind,
                                running = running.is_some()
                            );
                        } else {
                            stats.events_ignored += 1;
                            tracing::trace!(event = "watch_change_ignored", path = %change.path.display());
                        }
                    }
                    None => {
                        tracing::info!(event = "watch_stream_closed");
                        break;
                    }
                },
                _ = sleep_until_opt(deadline) => {
                    debouncer.clear();
                    tracing::info!(event = "watch_debounce_fired", "changes settled, starting run");
                    let runner = self.runner.clone();
                    running = Some(tokio::spawn(async move { runner.run().await }));
                }
            }
        }

        events.close();
        drop(events);
        if let Some(handle) = running.take() {
            tracing::info!(event = "watch_draining", "waiting for the current run to finish");
            finish_run(handle.await, &mut stats);
        }
        stats
    }
}

fn finish_run(joined: std::result::Result<Result<RunSummary>, JoinError>, stats: &mut WatchStats) {
    stats.runs += 1;
    match joined {
        Ok(Ok(summary)) => {
            if summary.has_failures() {
                stats.failed_runs += 1;
            }
            tracing::info!(
                event = "watch_run_finished",
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed
            );
        }
        Ok(Err(err)) => {
            stats.failed_runs += 1;
            tracing::error!(event = "watch_run_failed", error = %err);
        }
        Err(err) => {
            stats.failed_runs += 1;
            tracing::error!(event = "watch_run_panicked", error = %err);
        }
    }
}

async fn join_running(running: &mut Option<RunHandle>) -> std::result::Result<Result<RunSummary>, JoinError> {
    match running {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::watch::ChangeKind;

    #[derive(Default)]
    struct RecordingRunner {
        started: Mutex<Vec<Instant>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        work: Duration,
    }

    impl RecordingRunner {
        fn with_work(work: Duration) -> Self {
            Self {
                work,
                ..Default::default()
            }
        }

        fn starts(&self) -> Vec<Instant> {
            self.started.lock().expect("lock").clone()
        }
    }

    impl PipelineRunner for RecordingRunner {
        async fn run(&self) -> Result<RunSummary> {
            self.started.lock().expect("lock").push(Instant::now());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RunSummary::from_tasks(Vec::new(), 0))
        }
    }

    fn root() -> PathBuf {
        PathBuf::from("/project")
    }

    fn change(rel: &str) -> ChangeEvent {
        ChangeEvent {
            path: root().join(rel),
            kind: ChangeKind::Modify,
        }
    }

    fn manager(runner: Arc<RecordingRunner>, strategy: DebounceStrategy) -> WatchManager<RecordingRunner> {
        let filter = WatchFilter::from_patterns(
            Path::new("/project"),
            &["locales/*.json".into()],
            &["**/node_modules/**".into()],
        )
        .expect("filter");
        WatchManager::new(runner, filter, strategy)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_under_simple_debounce_runs_once_after_quiet_period() {
        let runner = Arc::new(RecordingRunner::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let quiet = Duration::from_millis(500);
        let handle = tokio::spawn(
            manager(runner.clone(), DebounceStrategy::Simple { quiet }).run(rx, cancel.clone()),
        );

        let mut last_event = Instant::now();
        for _ in 0..5 {
            last_event = Instant::now();
            tx.send(change("locales/en.json")).expect("send");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        let stats = handle.await.expect("join");

        let starts = runner.starts();
        assert_eq!(starts.len(), 1);
        assert!(starts[0] - last_event >= quiet);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.events_accepted, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_events_never_trigger_a_run() {
        let runner = Arc::new(RecordingRunner::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let handle = tokio::spawn(
            manager(
                runner.clone(),
                DebounceStrategy::Simple {
                    quiet: Duration::from_millis(100),
                },
            )
            .run(rx, cancel.clone()),
        );
        tx.send(change("node_modules/x/locales/en.json")).expect("send");
        tx.send(change("src/main.rs")).expect("send");
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let stats = handle.await.expect("join");
        assert_eq!(stats.events_ignored, 2);
        assert!(runner.starts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn events_during_a_run_cause_one_follow_up_run() {
        let runner = Arc::new(RecordingRunner::with_work(Duration::from_secs(1)));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let handle = tokio::spawn(
            manager(
                runner.clone(),
                DebounceStrategy::Simple {
                    quiet: Duration::from_millis(100),
                },
            )
            .run(rx, cancel.clone()),
        );

        tx.send(change("locales/en.json")).expect("send");
        // first run starts at ~100ms and lasts a second
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(change("locales/en.json")).expect("send");
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(change("locales/fr.json")).expect("send");
        tokio::time::sleep(Duration::from_secs(4)).await;
        cancel.cancel();
        let stats = handle.await.expect("join");

        assert_eq!(runner.starts().len(), 2);
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(stats.runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_debounce_fires_despite_a_steady_stream() {
        let runner = Arc::new(RecordingRunner::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let handle = tokio::spawn(
            manager(
                runner.clone(),
                DebounceStrategy::Bounded {
                    quiet: Duration::from_millis(500),
                    max_wait: Duration::from_millis(1000),
                },
            )
            .run(rx, cancel.clone()),
        );

        let first = Instant::now();
        for _ in 0..20 {
            tx.send(change("locales/en.json")).expect("send");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let starts = runner.starts();
        assert!(!starts.is_empty());
        assert!(starts[0] - first <= Duration::from_millis(1000));
        cancel.cancel();
        handle.await.expect("join");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_the_in_flight_run() {
        let runner = Arc::new(RecordingRunner::with_work(Duration::from_secs(2)));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let handle = tokio::spawn(
            manager(
                runner.clone(),
                DebounceStrategy::Simple {
                    quiet: Duration::from_millis(10),
                },
            )
            .run(rx, cancel.clone()),
        );
        tx.send(change("locales/en.json")).expect("send");
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
        let stats = handle.await.expect("join");
        assert_eq!(stats.runs, 1);
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 0);
        assert!(tx.send(change("locales/en.json")).is_err());
    }

    struct Subscription(Arc<AtomicBool>);

    impl Drop for Subscription {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_is_released_before_the_run_drains() {
        let runner = Arc::new(RecordingRunner::with_work(Duration::from_secs(2)));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();
        let released = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(
            manager(
                runner.clone(),
                DebounceStrategy::Simple {
                    quiet: Duration::from_millis(10),
                },
            )
            .run_with_subscription(rx, cancel.clone(), Subscription(released.clone())),
        );
        tx.send(change("locales/en.json")).expect("send");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!released.load(Ordering::SeqCst));

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 1);

        let stats = handle.await.expect("join");
        assert_eq!(stats.runs, 1);
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 0);
    }
}
