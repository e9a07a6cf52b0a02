//! Tunable constants for the aggregation pipeline and request coordination
//!
//! The gap ladder, subsampling targets, progressive ranges, percentile margin
//! and debounce interval were tuned empirically against field data. They are
//! collected here with their defaults so they can be adjusted from a config
//! file instead of code.

use core::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of rungs in the gap and range ladders
pub const MAX_LADDER_STEPS: usize = 8;

/// Accepted debounce quiet periods, in milliseconds
pub const DEBOUNCE_RANGE_MS: core::ops::RangeInclusive<u64> = 300..=1000;

/// One rung of the continuous-segment gap ladder.
///
/// A segment found with gaps up to `max_gap_secs` is accepted when it holds
/// at least `min_points` readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapStep {
    pub max_gap_secs: u64,
    pub min_points: usize,
}

impl GapStep {
    pub const fn hours(hours: u64, min_points: usize) -> Self {
        Self {
            max_gap_secs: hours * 3600,
            min_points,
        }
    }

    pub const fn max_gap(&self) -> Duration {
        Duration::from_secs(self.max_gap_secs)
    }
}

/// One attempt of the progressive range widening ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeStep {
    /// Days of history requested, ending now
    pub days: u32,
    /// Row cap sent with the request
    pub limit: usize,
}

/// Chart shaping: bucketing, subsampling and segment selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Ranges longer than this are bucketed by calendar day
    pub daily_bucket_after_days: u32,
    /// Custom ranges with more raw points than this are subsampled
    pub subsample_threshold: usize,
    /// Number of points subsampling aims to keep
    pub subsample_target: usize,
    /// Escalating gap thresholds, each strictly more relaxed than the last
    pub gap_ladder: heapless::Vec<GapStep, MAX_LADDER_STEPS>,
    /// Raw points kept when no rung of the gap ladder yields a segment
    pub fallback_points: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            daily_bucket_after_days: 7,
            subsample_threshold: 30_000,
            subsample_target: 20_000,
            gap_ladder: ladder(&[
                GapStep::hours(2, 10),
                GapStep::hours(4, 5),
                GapStep::hours(12, 3),
                GapStep::hours(24, 2),
            ]),
            fallback_points: 100,
        }
    }
}

/// Threshold recommendation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Margin added around the percentiles, as a multiple of the std deviation
    pub margin_factor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            lower_percentile: 0.05,
            upper_percentile: 0.95,
            margin_factor: 0.5,
        }
    }
}

/// Fetch coordination: progressive ranges, debouncing and caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub range_ladder: heapless::Vec<RangeStep, MAX_LADDER_STEPS>,
    /// Quiet period before a burst of parameter changes triggers a fetch
    pub debounce_ms: u64,
    /// Lifetime of a cached response
    pub cache_ttl_secs: u64,
    /// Live ranges end at "now" rounded down to this grain, so repeated
    /// live loads share cache entries
    pub anchor_grain_secs: u64,
}

impl FetchConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub const fn anchor_grain(&self) -> Duration {
        Duration::from_secs(self.anchor_grain_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            range_ladder: ladder(&[
                RangeStep {
                    days: 1,
                    limit: 1_000,
                },
                RangeStep {
                    days: 7,
                    limit: 5_000,
                },
                RangeStep {
                    days: 14,
                    limit: 10_000,
                },
                RangeStep {
                    days: 30,
                    limit: 20_000,
                },
            ]),
            debounce_ms: 500,
            cache_ttl_secs: 300,
            anchor_grain_secs: 60,
        }
    }
}

/// Top-level dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub chart: ChartConfig,
    pub thresholds: ThresholdConfig,
    pub fetch: FetchConfig,
}

impl DashboardConfig {
    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gaps = &self.chart.gap_ladder;
        if gaps.is_empty() {
            return Err(ConfigError::EmptyLadder { name: "gap_ladder" });
        }
        if gaps.windows(2).any(|w| w[1].max_gap_secs <= w[0].max_gap_secs) {
            return Err(ConfigError::LadderNotRelaxing { name: "gap_ladder" });
        }

        let ranges = &self.fetch.range_ladder;
        if ranges.is_empty() {
            return Err(ConfigError::EmptyLadder {
                name: "range_ladder",
            });
        }
        if ranges.windows(2).any(|w| w[1].days <= w[0].days) {
            return Err(ConfigError::LadderNotRelaxing {
                name: "range_ladder",
            });
        }

        if !DEBOUNCE_RANGE_MS.contains(&self.fetch.debounce_ms) {
            return Err(ConfigError::OutOfRange {
                field: "debounce_ms",
            });
        }
        if self.fetch.anchor_grain_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "anchor_grain_secs",
            });
        }

        if self.chart.subsample_target == 0 {
            return Err(ConfigError::OutOfRange {
                field: "subsample_target",
            });
        }

        let t = &self.thresholds;
        let in_unit = |p: f64| (0.0..=1.0).contains(&p);
        if !in_unit(t.lower_percentile)
            || !in_unit(t.upper_percentile)
            || t.lower_percentile > t.upper_percentile
        {
            return Err(ConfigError::OutOfRange {
                field: "percentiles",
            });
        }
        if t.margin_factor.is_nan() || t.margin_factor < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "margin_factor",
            });
        }

        Ok(())
    }
}

/// Error types for configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must have at least one step")]
    EmptyLadder { name: &'static str },

    #[error("{name} steps must strictly relax from one rung to the next")]
    LadderNotRelaxing { name: &'static str },

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },
}

fn ladder<T: Copy, const N: usize>(steps: &[T]) -> heapless::Vec<T, N> {
    let mut out = heapless::Vec::new();
    for step in steps.iter().take(N) {
        let _ = out.push(*step);
    }
    out
}
