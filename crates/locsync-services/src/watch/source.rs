use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
}

impl From<EventKind> for ChangeKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => ChangeKind::Modify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Native filesystem watcher feeding a channel. Dropping it ends the stream.
pub struct FsEventSource {
    _watcher: RecommendedWatcher,
}

impl FsEventSource {
    pub fn start(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<ChangeEvent>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(ev) => {
                    if matches!(ev.kind, EventKind::Access(_)) {
                        return;
                    }
                    let kind = ChangeKind::from(ev.kind);
                    for path in ev.paths {
                        let _ = tx.send(ChangeEvent { path, kind });
                    }
                }
                Err(err) => tracing::warn!(event = "watch_backend_error", error = %err),
            },
            Config::default(),
        )
        .map_err(WatchError::Init)?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch {
                path: root.to_path_buf(),
                source: e,
            })?;
        Ok((Self { _watcher: watcher }, rx))
    }
}

impl std::fmt::Debug for FsEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsEventSource").finish_non_exhaustive()
    }
}
