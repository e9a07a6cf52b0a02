//! Transport-independent core library for the JoySense dashboard
//!
//! This crate contains the logic of the agricultural sensor dashboard that is
//! independent of how readings are fetched: the data model and hierarchy
//! catalog, the time-series aggregation pipeline (time bucketer,
//! continuous-segment selector, threshold recommender), request coordination
//! (superseding, cancellation, debouncing, progressive range widening and a
//! short-lived response cache), and the chart and lot-report views built on
//! top of them.
//!
//! Everything runs on a single-threaded event loop. Async operations are
//! plain futures over the [`source`] traits; the crate never spawns tasks or
//! owns an executor.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod coordination;
pub mod model;
pub mod source;
pub mod time;
pub mod views;
