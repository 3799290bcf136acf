//! Coalescing of filesystem event bursts into one deadline.
//!
//! The state is a single optional deadline owned by the watcher task. Every
//! qualifying event pushes the deadline to `event + window`; the watcher fires
//! once the deadline passes with no further events.

use std::time::Duration;

use tokio::time::Instant;

/// Stand-in deadline when `event + window` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// New deadline after an event at `event_at`.
///
/// A deadline never moves earlier, so an event delivered out of order cannot
/// cut a pending window short. Windows too large to represent saturate to
/// roughly thirty years out.
pub fn next_deadline(current: Option<Instant>, event_at: Instant, window: Duration) -> Instant {
    let candidate = event_at
        .checked_add(window)
        .or_else(|| event_at.checked_add(FAR_FUTURE))
        .unwrap_or(event_at);
    match current {
        Some(existing) if existing > candidate => existing,
        _ => candidate,
    }
}

#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reschedule after an event, replacing any pending deadline.
    pub fn record(&mut self, event_at: Instant) {
        self.deadline = Some(next_deadline(self.deadline, event_at, self.window));
    }

    /// Clear and return `true` if the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
