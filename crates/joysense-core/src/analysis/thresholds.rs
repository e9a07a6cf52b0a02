//! Threshold recommendations per sensor type
//!
//! For each sensor type with at least one valid reading:
//!
//! - `avg`: arithmetic mean
//! - `std_dev`: population standard deviation (divides by N)
//! - `p5` / `p95`: `v[floor(0.05 N)]` and `v[ceil(0.95 N)]` of the sorted
//!   values, the upper index clamped to the last value
//! - `min = max(0, p5 - margin)`, `max = p95 + margin`, where
//!   `margin = 0.5 * std_dev`
//!
//! All outputs are rounded to two decimals. The percentiles and margin factor
//! come from [`ThresholdConfig`].

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::config::ThresholdConfig;
use crate::model::{Measurement, SensorTypeId};

use super::round2;

/// Recommended alert bounds for one sensor type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRecommendation {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub std_dev: f64,
    pub p5: f64,
    pub p95: f64,
    /// Valid readings the recommendation is based on
    pub samples: usize,
}

pub type Recommendations = BTreeMap<SensorTypeId, ThresholdRecommendation>;

/// Error types for threshold analysis
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// No sensor type had a single valid reading
    #[error("Insufficient data: no sensor type has valid readings in the selected range")]
    InsufficientData,
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Recommend thresholds for every sensor type in `measurements`.
///
/// The slice is expected to hold a single metric over a single date range.
/// Types without valid readings are left out of the map; if that leaves
/// nothing, [`AnalysisError::InsufficientData`] is returned instead of an
/// empty map.
pub fn recommend_thresholds(
    measurements: &[Measurement],
    config: &ThresholdConfig,
) -> AnalysisResult<Recommendations> {
    let mut groups: BTreeMap<SensorTypeId, Vec<f64>> = BTreeMap::new();
    for m in measurements {
        if let Some(value) = m.valid_value() {
            groups.entry(m.type_id).or_default().push(value);
        }
    }

    let recommendations: Recommendations = groups
        .into_iter()
        .filter_map(|(type_id, values)| {
            recommend_for_values(values, config).map(|rec| (type_id, rec))
        })
        .collect();

    if recommendations.is_empty() {
        debug!(
            "No valid readings among {} measurements",
            measurements.len()
        );
        return Err(AnalysisError::InsufficientData);
    }

    Ok(recommendations)
}

/// Recommendation for one group of values, `None` if the group is empty
pub fn recommend_for_values(
    mut values: Vec<f64>,
    config: &ThresholdConfig,
) -> Option<ThresholdRecommendation> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let avg = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    values.sort_by(f64::total_cmp);
    let last = n - 1;
    let lower_idx = ((config.lower_percentile * n as f64).floor() as usize).min(last);
    let upper_idx = ((config.upper_percentile * n as f64).ceil() as usize).min(last);
    let p5 = values[lower_idx];
    let p95 = values[upper_idx];

    let margin = config.margin_factor * std_dev;

    Some(ThresholdRecommendation {
        min: round2((p5 - margin).max(0.0)),
        max: round2(p95 + margin),
        avg: round2(avg),
        std_dev: round2(std_dev),
        p5: round2(p5),
        p95: round2(p95),
        samples: n,
    })
}
