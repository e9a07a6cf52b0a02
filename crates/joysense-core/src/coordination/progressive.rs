//! Progressive range widening
//!
//! A newly selected node may have reported a minute ago or three weeks ago.
//! Rather than always paying for the widest query, attempts are issued in
//! sequence with a growing history window and row cap, stopping at the first
//! one that returns data.
//!
//! A transient failure on one attempt moves on to the next attempt. Any other
//! failure stops the ladder. When the ladder is exhausted without data the
//! outcome is [`ProgressiveOutcome::NoRecentData`], unless every attempt
//! failed, in which case the last failure is returned.

use chrono::NaiveDateTime;
use log::{debug, info, warn};

use crate::config::RangeStep;
use crate::model::Measurement;
use crate::source::{FetchResult, MeasurementQuery, MeasurementSource, RowLimit};
use crate::time::DateRange;

/// Result of walking the range ladder
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressiveOutcome {
    /// The first attempt that returned rows
    Found {
        rows: Vec<Measurement>,
        step: RangeStep,
        attempts: usize,
    },
    /// Every attempt came back empty
    NoRecentData { attempts: usize },
}

/// Fetch with widening history ending at `anchor`.
///
/// `base` supplies the filters (node, metric, ...); its range and limit are
/// replaced on every attempt.
pub async fn fetch_progressively<S: MeasurementSource>(
    source: &S,
    base: &MeasurementQuery,
    anchor: NaiveDateTime,
    ladder: &[RangeStep],
) -> FetchResult<ProgressiveOutcome> {
    let mut last_error = None;
    let mut failures = 0;

    for (index, step) in ladder.iter().enumerate() {
        let query = base
            .clone()
            .with_range(DateRange::last_days(anchor, step.days))
            .with_limit(RowLimit::Capped(step.limit));

        debug!(
            "Progressive attempt {}: {} days, limit {}",
            index + 1,
            step.days,
            step.limit
        );

        match source.measurements(&query).await {
            Ok(rows) if !rows.is_empty() => {
                info!("Found {} rows within {} days", rows.len(), step.days);
                return Ok(ProgressiveOutcome::Found {
                    rows,
                    step: *step,
                    attempts: index + 1,
                });
            }
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                warn!("Attempt over {} days failed, widening: {}", step.days, e);
                failures += 1;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    match last_error {
        Some(e) if failures == ladder.len() => Err(e),
        _ => {
            info!("No data in the last {} days", ladder.last().map_or(0, |s| s.days));
            Ok(ProgressiveOutcome::NoRecentData {
                attempts: ladder.len(),
            })
        }
    }
}
