//! Continuous-segment selection for the live dashboard
//!
//! Sensors can stop reporting for long stretches, so a fixed wall-clock
//! window may render empty. Instead, when no explicit range is given, the
//! chart shows the most recent run of readings whose consecutive gaps stay
//! under a threshold. The threshold escalates through the configured gap
//! ladder until the run is long enough, and falls back to the last N raw
//! points if the data is too sparse for any rung.
//!
//! The search only ever walks backward from the newest reading, and every
//! rung relaxes the threshold of the previous one.

use core::time::Duration;

use log::debug;

use crate::config::ChartConfig;
use crate::model::Measurement;

/// How the segment was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// A continuous run with gaps no larger than `max_gap`
    Continuous { max_gap: Duration },
    /// No rung produced enough points; the last raw points were kept
    Fallback,
    /// There were no readings at all
    Empty,
}

/// One rung tried during selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAttempt {
    pub max_gap: Duration,
    /// Points in the run found with this threshold
    pub points: usize,
}

/// Selected readings, ascending by time
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub measurements: Vec<Measurement>,
    pub outcome: SegmentOutcome,
    /// The escalation path, in the order the rungs were tried
    pub attempts: Vec<SegmentAttempt>,
}

/// Select the most recent continuous run of readings
pub fn select_continuous_segment(measurements: &[Measurement], config: &ChartConfig) -> Segment {
    let mut ordered: Vec<&Measurement> = measurements.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    if ordered.is_empty() {
        return Segment {
            measurements: Vec::new(),
            outcome: SegmentOutcome::Empty,
            attempts: Vec::new(),
        };
    }

    let mut attempts = Vec::with_capacity(config.gap_ladder.len());

    for step in config.gap_ladder.iter() {
        let start = run_start(&ordered, step.max_gap());
        let points = ordered.len() - start;
        attempts.push(SegmentAttempt {
            max_gap: step.max_gap(),
            points,
        });

        if points >= step.min_points {
            debug!(
                "Continuous segment of {} points with max gap {}s",
                points, step.max_gap_secs
            );
            return Segment {
                measurements: ordered[start..].iter().map(|m| **m).collect(),
                outcome: SegmentOutcome::Continuous {
                    max_gap: step.max_gap(),
                },
                attempts,
            };
        }

        debug!(
            "Segment with max gap {}s has {} points (< {}), relaxing",
            step.max_gap_secs, points, step.min_points
        );
    }

    let start = ordered.len().saturating_sub(config.fallback_points);
    debug!(
        "Data too sparse for any gap threshold, keeping last {} points",
        ordered.len() - start
    );

    Segment {
        measurements: ordered[start..].iter().map(|m| **m).collect(),
        outcome: SegmentOutcome::Fallback,
        attempts,
    }
}

/// Index of the first reading in the backward run ending at the newest one
fn run_start(ordered: &[&Measurement], max_gap: Duration) -> usize {
    let max_gap_secs = i64::try_from(max_gap.as_secs()).unwrap_or(i64::MAX);

    let mut start = ordered.len().saturating_sub(1);
    while start > 0 {
        let gap = ordered[start].timestamp - ordered[start - 1].timestamp;
        if gap.num_seconds() > max_gap_secs {
            break;
        }
        start -= 1;
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GapStep;
    use crate::model::fixtures::*;

    const HOUR: u64 = 3600;

    fn hours(h: i64) -> Measurement {
        reading(h, 1, at_minutes(h * 60), h as f64)
    }

    #[test]
    fn test_escalates_until_gap_fits() {
        // 0, 1, 2 h then a 10 h gap, then 12 h
        let data = [hours(12), hours(0), hours(2), hours(1)];

        let segment = select_continuous_segment(&data, &ChartConfig::default());

        let path: Vec<(u64, usize)> = segment
            .attempts
            .iter()
            .map(|a| (a.max_gap.as_secs() / HOUR, a.points))
            .collect();
        assert_eq!(
            path,
            [(2, 1), (4, 1), (12, 4)],
            "only the newest point until the 12 h rung bridges the 10 h gap"
        );
        assert_eq!(
            segment.outcome,
            SegmentOutcome::Continuous {
                max_gap: Duration::from_secs(12 * HOUR)
            }
        );

        let times: Vec<i64> = segment.measurements.iter().map(|m| m.id.0).collect();
        assert_eq!(times, [0, 1, 2, 12]);
    }

    #[test]
    fn test_dense_recent_run_stops_at_first_rung() {
        // 30 readings 15 minutes apart, preceded by an old reading 3 h earlier
        let mut data: Vec<Measurement> = (0..30)
            .map(|i| reading(i, 1, at_minutes(600 + i * 15), 1.0))
            .collect();
        data.push(reading(99, 1, at_minutes(600 - 180), 1.0));

        let segment = select_continuous_segment(&data, &ChartConfig::default());

        assert_eq!(segment.attempts.len(), 1);
        assert_eq!(segment.measurements.len(), 30, "the 3 h gap is not bridged");
        assert_eq!(segment.measurements[0].timestamp, at_minutes(600));
    }

    #[test]
    fn test_sparse_data_falls_back_to_last_points() {
        // Readings two days apart never form a run of 2 under 24 h
        let data: Vec<Measurement> = (0..150)
            .map(|i| reading(i, 1, at_minutes(i * 48 * 60), 1.0))
            .collect();

        let segment = select_continuous_segment(&data, &ChartConfig::default());

        assert_eq!(segment.outcome, SegmentOutcome::Fallback);
        assert_eq!(segment.attempts.len(), 4);
        assert_eq!(segment.measurements.len(), 100);
        assert_eq!(segment.measurements[0].id.0, 50);
    }

    #[test]
    fn test_single_reading_falls_back_to_itself() {
        let segment = select_continuous_segment(&[hours(5)], &ChartConfig::default());

        assert_eq!(segment.outcome, SegmentOutcome::Fallback);
        assert_eq!(segment.measurements.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let segment = select_continuous_segment(&[], &ChartConfig::default());
        assert_eq!(segment.outcome, SegmentOutcome::Empty);
        assert!(segment.attempts.is_empty());
    }

    #[test]
    fn test_custom_ladder() {
        let mut config = ChartConfig::default();
        config.gap_ladder.clear();
        let _ = config.gap_ladder.push(GapStep::hours(1, 2));

        let data = [hours(0), hours(1), hours(5)];
        let segment = select_continuous_segment(&data, &config);

        assert_eq!(segment.outcome, SegmentOutcome::Fallback);
        assert_eq!(segment.measurements.len(), 3);
    }
}
