//! Request coordination for a single-threaded event loop
//!
//! - [`tracker`]: tags every fetch with a ticket so stale responses are
//!   dropped, and cancels superseded fetches.
//! - [`debounce`]: coalesces bursts of parameter changes into one fetch.
//! - [`progressive`]: widens the requested history step by step until a node
//!   with unknown recency returns data.
//! - [`cache`]: short-lived read-through cache of responses.
//! - [`clock`]: time source used by the cache and debouncer.

pub mod cache;
pub mod clock;
pub mod debounce;
pub mod progressive;
pub mod tracker;

pub use cache::{CachedSource, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{DebounceDecision, Debouncer};
pub use progressive::{ProgressiveOutcome, fetch_progressively};
pub use tracker::{RequestTicket, RequestTracker};
