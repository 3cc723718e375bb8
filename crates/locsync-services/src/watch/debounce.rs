use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceStrategy {
    /// Fire once `quiet` has passed without a new event.
    Simple { quiet: Duration },
    /// Like `Simple`, but never wait longer than `max_wait` after the first event of a burst.
    Bounded { quiet: Duration, max_wait: Duration },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    strategy: DebounceStrategy,
    first_event: Option<Instant>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(strategy: DebounceStrategy) -> Self {
        Self {
            strategy,
            first_event: None,
            last_event: None,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.first_event.get_or_insert(now);
        self.last_event = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }

    /// When the pending burst should fire, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        let last = self.last_event?;
        match self.strategy {
            DebounceStrategy::Simple { quiet } => Some(last + quiet),
            DebounceStrategy::Bounded { quiet, max_wait } => {
                let first = self.first_event.unwrap_or(last);
                Some((last + quiet).min(first + max_wait))
            }
        }
    }

    pub fn clear(&mut self) {
        self.first_event = None;
        self.last_event = None;
    }
}
