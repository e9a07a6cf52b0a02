//! Time sources

use core::cell::Cell;
use core::time::Duration;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

/// Monotonic and wall-clock time
pub trait Clock {
    /// Monotonic instant, for expiry and quiet periods
    fn now(&self) -> Instant;

    /// Local wall-clock time, for anchoring date ranges
    fn local_time(&self) -> NaiveDateTime;
}

/// The host's clocks
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to, for simulations and tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    instant: Cell<Instant>,
    local: Cell<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(local: NaiveDateTime) -> Self {
        Self {
            instant: Cell::new(Instant::now()),
            local: Cell::new(local),
        }
    }

    /// Move both clocks forward
    pub fn advance(&self, by: Duration) {
        self.instant.set(self.instant.get() + by);
        if let Ok(delta) = chrono::TimeDelta::from_std(by) {
            self.local.set(self.local.get() + delta);
        }
    }
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn local_time(&self) -> NaiveDateTime {
        (**self).local_time()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.instant.get()
    }

    fn local_time(&self) -> NaiveDateTime {
        self.local.get()
    }
}
