//! Shared chart-data shaping library
//!
//! Pure functions over slices of [`Measurement`]s, used by both the live chart
//! view and the lot threshold report so the two never diverge:
//!
//! - [`bucket`]: groups readings into 15 minute, hourly or daily buckets and
//!   averages them per sensor type.
//! - [`segment`]: picks the most recent run of readings without long gaps when
//!   the caller gave no explicit range.
//! - [`thresholds`]: recommends min/max alert bounds per sensor type from
//!   percentiles and the standard deviation.

pub mod bucket;
pub mod segment;
pub mod thresholds;

pub use bucket::{ChartPoint, ChartSeries, Granularity, bucket_measurements};
pub use segment::{Segment, SegmentAttempt, SegmentOutcome, select_continuous_segment};
pub use thresholds::{
    AnalysisError, AnalysisResult, Recommendations, ThresholdRecommendation, recommend_thresholds,
};

use crate::model::{Measurement, MetricId};
use crate::time::DateRange;

/// Readings of one metric, optionally restricted to a date range
pub fn filter_measurements<'a>(
    measurements: &'a [Measurement],
    metric: Option<MetricId>,
    range: Option<&'a DateRange>,
) -> impl Iterator<Item = &'a Measurement> + 'a {
    measurements.iter().filter(move |m| {
        metric.is_none_or(|id| m.metric_id == id)
            && range.is_none_or(|r| r.contains(&m.timestamp))
    })
}

/// Round to two decimal places for display
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
