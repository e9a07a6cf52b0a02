//! Request superseding and cancellation
//!
//! Every fetch a view starts is tagged with a [`RequestTicket`]. Starting a
//! new request makes all earlier tickets stale and fires their cancellation
//! signal. A view runs its fetch through [`RequestTicket::run`], which drops
//! the fetch future (aborting the underlying transport request) as soon as
//! the ticket is cancelled, and checks [`RequestTracker::is_current`] before
//! committing anything. Out-of-order responses therefore never overwrite
//! fresher state.
//!
//! The tracker is meant for a single-threaded event loop and uses a no-op
//! raw mutex for its signals.

use core::cell::{Cell, RefCell};
use core::future::Future;
use std::rc::Rc;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use log::debug;

type CancelSignal = Signal<NoopRawMutex, ()>;

/// Issues tickets and remembers which one is current
#[derive(Default)]
pub struct RequestTracker {
    generation: Cell<u64>,
    cancel: RefCell<Option<Rc<CancelSignal>>>,
}

/// Identity of one request
#[derive(Clone)]
pub struct RequestTicket {
    id: u64,
    cancel: Rc<CancelSignal>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding and cancelling the previous one
    pub fn begin(&self) -> RequestTicket {
        let id = self.generation.get() + 1;
        self.generation.set(id);

        let cancel = Rc::new(CancelSignal::new());
        if let Some(previous) = self.cancel.replace(Some(cancel.clone())) {
            previous.signal(());
            debug!("Request {} supersedes request {}", id, id - 1);
        }

        RequestTicket { id, cancel }
    }

    /// Whether `ticket` belongs to the most recent request
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.id == self.generation.get() && !ticket.is_cancelled()
    }

    /// Cancel the in-flight request without starting a new one
    pub fn cancel_all(&self) {
        self.generation.set(self.generation.get() + 1);
        if let Some(previous) = self.cancel.take() {
            previous.signal(());
        }
    }
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.signaled()
    }

    /// Drive `fut` until it completes or this ticket is cancelled.
    ///
    /// Returns `None` on cancellation; `fut` is dropped at that point.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }

        match select(fut, self.cancel.wait()).await {
            Either::First(output) => Some(output),
            Either::Second(()) => {
                // Keep the flag visible to later `is_current` checks
                self.cancel.signal(());
                debug!("Request {} cancelled in flight", self.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::future::pending;

    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;

    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let tracker = RequestTracker::new();
        let a = tracker.begin();
        let b = tracker.begin();

        assert!(!tracker.is_current(&a));
        assert!(tracker.is_current(&b));
        assert!(a.is_cancelled(), "superseded ticket is signalled");
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_cancelled_run_drops_the_future() {
        let tracker = RequestTracker::new();
        let a = tracker.begin();

        let (result, ()) = block_on(join(a.run(pending::<u32>()), async {
            yield_now().await;
            tracker.begin();
        }));

        assert_eq!(result, None);
        assert!(!tracker.is_current(&a));
    }

    #[test]
    fn test_run_after_cancel_returns_immediately() {
        let tracker = RequestTracker::new();
        let a = tracker.begin();
        tracker.cancel_all();

        assert_eq!(block_on(a.run(async { 7 })), None);
        assert!(!tracker.is_current(&a));
    }

    #[test]
    fn test_current_run_completes() {
        let tracker = RequestTracker::new();
        let a = tracker.begin();

        assert_eq!(block_on(a.run(async { 7 })), Some(7));
        assert!(tracker.is_current(&a));
    }
}
