//! Debouncing of parameter changes
//!
//! Rapid successive changes (typing a date, clicking through nodes) coalesce
//! into a single fetch once no new change has arrived for the quiet period.
//! The very first change after a view opens with no data fires immediately,
//! so opening a view never waits on the timer.
//!
//! This is a pure state machine: callers pass the current instant in and the
//! event loop owns the actual timer, sleeping until [`Debouncer::deadline`]
//! and then calling [`Debouncer::poll`].

use core::time::Duration;
use std::time::Instant;

/// What to do with a submitted change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceDecision<T> {
    /// Fetch right away
    Immediate(T),
    /// Wait; the change will be released by `poll` at `deadline` unless a
    /// newer change replaces it first
    Scheduled { deadline: Instant },
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<Pending<T>>,
    bypass_next: bool,
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            bypass_next: true,
        }
    }

    /// Submit a change. Replaces any pending change and restarts the quiet
    /// period.
    pub fn submit(&mut self, value: T, now: Instant) -> DebounceDecision<T> {
        if self.bypass_next && self.pending.is_none() {
            self.bypass_next = false;
            return DebounceDecision::Immediate(value);
        }
        self.bypass_next = false;

        let deadline = now + self.quiet;
        self.pending = Some(Pending { value, deadline });
        DebounceDecision::Scheduled { deadline }
    }

    /// Release the pending change if its quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.deadline <= now => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending change, returning it
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }

    /// Forget everything, as if the view had just been opened with no data
    pub fn reset(&mut self) {
        self.pending = None;
        self.bypass_next = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    #[test]
    fn test_first_change_bypasses_quiet_period() {
        let mut debouncer = Debouncer::new(QUIET);
        let t0 = Instant::now();

        assert_eq!(debouncer.submit(1, t0), DebounceDecision::Immediate(1));
        assert_eq!(
            debouncer.submit(2, t0),
            DebounceDecision::Scheduled {
                deadline: t0 + QUIET
            }
        );
    }

    #[test]
    fn test_burst_coalesces_to_last_value() {
        let mut debouncer = Debouncer::new(QUIET);
        let t0 = Instant::now();
        debouncer.submit(0, t0);

        for (i, ms) in [0u64, 100, 200, 300].into_iter().enumerate() {
            debouncer.submit(i + 1, t0 + Duration::from_millis(ms));
        }

        let last = t0 + Duration::from_millis(300);
        assert_eq!(debouncer.poll(last + QUIET - Duration::from_millis(1)), None);
        assert_eq!(debouncer.poll(last + QUIET), Some(4));
        assert_eq!(debouncer.poll(last + QUIET * 2), None, "released once");
    }

    #[test]
    fn test_reset_rearms_bypass() {
        let mut debouncer = Debouncer::new(QUIET);
        let t0 = Instant::now();
        debouncer.submit("a", t0);
        debouncer.submit("b", t0);
        assert!(debouncer.is_pending());

        debouncer.reset();
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.submit("c", t0), DebounceDecision::Immediate("c"));
    }

    #[test]
    fn test_cancel_returns_pending() {
        let mut debouncer = Debouncer::new(QUIET);
        let t0 = Instant::now();
        debouncer.submit(1, t0);
        debouncer.submit(2, t0);

        assert_eq!(debouncer.cancel(), Some(2));
        assert!(!debouncer.is_pending());
    }
}
