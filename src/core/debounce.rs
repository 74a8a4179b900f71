//! Trailing-edge debouncer: a cancellable, single-shot delayed payload.
//!
//! At most one payload is pending. `schedule()` replaces it and restarts
//! the timer, so a burst of edits collapses into one delivery carrying the
//! last payload once input has been quiet for `delay`.
//!
//! Firing is poll-driven: the host calls `tick()` from its update loop.
//! The `*_at` variants take an explicit instant so callers (and tests) can
//! drive time themselves.
//!
//! # Usage
//! ```ignore
//! // On every edit:
//! debouncer.schedule(value);
//!
//! // In update loop:
//! if let Some(value) = debouncer.tick() {
//!     commit(value);
//! }
//! ```

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    /// Pending payload and the instant it becomes due
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload`, replacing (not queuing behind) any pending one.
    pub fn schedule(&mut self, payload: T) {
        self.schedule_at(payload, Instant::now());
    }

    pub fn schedule_at(&mut self, payload: T, now: Instant) {
        if self.pending.is_some() {
            log::trace!("Debouncer: restarting timer ({}ms)", self.delay.as_millis());
        } else {
            log::trace!("Debouncer: scheduled in {}ms", self.delay.as_millis());
        }
        self.pending = Some((payload, now + self.delay));
    }

    /// Drop the pending payload, if any.
    pub fn cancel(&mut self) -> Option<T> {
        let cancelled = self.pending.take().map(|(payload, _)| payload);
        if cancelled.is_some() {
            log::trace!("Debouncer: cancelled pending payload");
        }
        cancelled
    }

    /// Take the payload if its quiet period has elapsed.
    pub fn tick(&mut self) -> Option<T> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((_, due)) if now >= due => {
                log::trace!("Debouncer: firing");
                self.pending.take().map(|(payload, _)| payload)
            }
            _ => None,
        }
    }

    /// Take the pending payload immediately, ignoring the timer.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(payload, _)| payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(payload, _)| payload)
    }
}
