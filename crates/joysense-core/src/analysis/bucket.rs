//! Time bucketing of raw readings for charting
//!
//! Readings are grouped into fixed-width buckets keyed by their truncated
//! timestamp and averaged per sensor type with a running mean. The output is
//! one row per bucket, carrying a column for every sensor type seen anywhere
//! in the series. A bucket without a reading for a type reports `None` for
//! that column, which consumers must treat as "no data", never as zero.

use std::collections::{BTreeMap, BTreeSet, btree_map};

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ChartConfig;
use crate::model::{Measurement, SensorTypeId};
use crate::time::DateRange;

/// Width of a chart bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// 15-minute buckets aligned to :00, :15, :30 and :45
    FifteenMinutes,
    /// Hourly buckets
    Hourly,
    /// Calendar-day buckets
    Daily,
}

impl Granularity {
    /// Pick the bucket width for a span of data.
    ///
    /// Spans longer than the configured day threshold are bucketed by day,
    /// multi-day custom selections by hour, and anything else by 15 minutes.
    pub fn choose(span: TimeDelta, custom_multi_day: bool, config: &ChartConfig) -> Self {
        if span > TimeDelta::days(i64::from(config.daily_bucket_after_days)) {
            Self::Daily
        } else if custom_multi_day {
            Self::Hourly
        } else {
            Self::FifteenMinutes
        }
    }

    /// Short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15m",
            Self::Hourly => "1h",
            Self::Daily => "1d",
        }
    }

    /// Start of the bucket containing `timestamp`
    pub fn truncate(self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let date = timestamp.date();
        let start = match self {
            Self::FifteenMinutes => {
                date.and_hms_opt(timestamp.hour(), timestamp.minute() / 15 * 15, 0)
            }
            Self::Hourly => date.and_hms_opt(timestamp.hour(), 0, 0),
            Self::Daily => date.and_hms_opt(0, 0, 0),
        };
        start.unwrap_or(timestamp)
    }

    /// Axis label for a bucket starting at `start`
    pub fn time_label(self, start: &NaiveDateTime, multi_day: bool) -> String {
        let format = match self {
            Self::Daily => "%d/%m",
            Self::Hourly if multi_day => "%d/%m %H:%M",
            Self::Hourly | Self::FifteenMinutes => "%H:%M",
        };
        start.format(format).to_string()
    }
}

/// One chart row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub bucket_start: NaiveDateTime,
    pub time_label: String,
    /// Mean value per sensor type; `None` when the bucket has no reading
    pub values: BTreeMap<SensorTypeId, Option<f64>>,
}

impl ChartPoint {
    pub fn value(&self, type_id: SensorTypeId) -> Option<f64> {
        self.values.get(&type_id).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    sum: f64,
    count: u32,
    mean: f64,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.mean = self.sum / f64::from(self.count);
    }
}

/// Bucketed chart rows, ascending by bucket start.
///
/// This is a consuming iterator: rows are materialized one at a time as it
/// is advanced, and it cannot be restarted. Bucket the input again for a
/// second pass.
#[derive(Debug)]
pub struct ChartSeries {
    granularity: Granularity,
    multi_day: bool,
    columns: Vec<SensorTypeId>,
    buckets: btree_map::IntoIter<NaiveDateTime, BTreeMap<SensorTypeId, RunningMean>>,
}

impl ChartSeries {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Every sensor type seen in the input, ascending
    pub fn columns(&self) -> &[SensorTypeId] {
        &self.columns
    }
}

impl Iterator for ChartSeries {
    type Item = ChartPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, means) = self.buckets.next()?;

        let values = self
            .columns
            .iter()
            .map(|type_id| (*type_id, means.get(type_id).map(|m| m.mean)))
            .collect();

        Some(ChartPoint {
            time_label: self.granularity.time_label(&start, self.multi_day),
            bucket_start: start,
            values,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.buckets.size_hint()
    }
}

impl ExactSizeIterator for ChartSeries {}

/// Group readings into chart buckets.
///
/// `range` is the explicit range the caller asked for, if any; without one
/// the span is taken from the first and last reading. `custom_multi_day`
/// marks a user-picked range covering several days.
///
/// Custom ranges with more raw points than the configured threshold are
/// subsampled with a uniform stride before bucketing. This is lossy and
/// trades precision for bounded output.
pub fn bucket_measurements(
    measurements: &[Measurement],
    range: Option<&DateRange>,
    custom_multi_day: bool,
    config: &ChartConfig,
) -> ChartSeries {
    let mut ordered: Vec<&Measurement> = measurements.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    let span = match (range, ordered.first(), ordered.last()) {
        (Some(range), _, _) => range.span(),
        (None, Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => TimeDelta::zero(),
    };
    let granularity = Granularity::choose(span, custom_multi_day, config);

    if range.is_some() {
        ordered = subsample(ordered, config);
    }

    let mut columns = BTreeSet::new();
    let mut buckets: BTreeMap<NaiveDateTime, BTreeMap<SensorTypeId, RunningMean>> =
        BTreeMap::new();

    for m in ordered {
        let Some(value) = m.valid_value() else {
            continue;
        };
        columns.insert(m.type_id);
        buckets
            .entry(granularity.truncate(m.timestamp))
            .or_default()
            .entry(m.type_id)
            .or_default()
            .push(value);
    }

    debug!(
        "Bucketed into {} {} buckets across {} sensor types",
        buckets.len(),
        granularity.label(),
        columns.len()
    );

    ChartSeries {
        granularity,
        multi_day: custom_multi_day,
        columns: columns.into_iter().collect(),
        buckets: buckets.into_iter(),
    }
}

/// Keep every Nth point so that roughly `subsample_target` points remain.
///
/// The stride is `round(len / target)`, which keeps between 0.75 and 1.25
/// times the target once the input is over 1.5 times the target.
fn subsample<'a>(points: Vec<&'a Measurement>, config: &ChartConfig) -> Vec<&'a Measurement> {
    if points.len() <= config.subsample_threshold || config.subsample_target == 0 {
        return points;
    }

    let stride = ((points.len() as f64 / config.subsample_target as f64).round() as usize).max(1);
    debug!(
        "Subsampling {} points with stride {} (target {})",
        points.len(),
        stride,
        config.subsample_target
    );

    points.into_iter().step_by(stride).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    fn config() -> ChartConfig {
        ChartConfig::default()
    }

    #[test]
    fn test_granularity_choice() {
        let cfg = config();
        assert_eq!(
            Granularity::choose(TimeDelta::days(8), false, &cfg),
            Granularity::Daily
        );
        assert_eq!(
            Granularity::choose(TimeDelta::days(7), true, &cfg),
            Granularity::Hourly,
            "exactly 7 days is not longer than 7 days"
        );
        assert_eq!(
            Granularity::choose(TimeDelta::hours(6), false, &cfg),
            Granularity::FifteenMinutes
        );
    }

    #[test]
    fn test_truncate_aligns_to_boundaries() {
        let ts = at_minutes(13 * 60 + 44) + TimeDelta::seconds(59);

        assert_eq!(Granularity::FifteenMinutes.truncate(ts), at_minutes(13 * 60 + 30));
        assert_eq!(Granularity::Hourly.truncate(ts), at_minutes(13 * 60));
        assert_eq!(Granularity::Daily.truncate(ts), origin());
    }

    #[test]
    fn test_bucket_values_are_true_means() {
        // 20 points over three 15-minute buckets: 7 + 7 + 6
        let data: Vec<Measurement> = (0..20)
            .map(|i| {
                let minute = match i {
                    0..7 => i * 2,
                    7..14 => 15 + (i - 7) * 2,
                    _ => 30 + (i - 14) * 2,
                };
                reading(i, 1, at_minutes(minute), (i * i) as f64 / 3.0)
            })
            .collect();

        let series = bucket_measurements(&data, None, false, &config());
        assert_eq!(series.granularity(), Granularity::FifteenMinutes);
        let points: Vec<ChartPoint> = series.collect();
        assert_eq!(points.len(), 3);

        for (bucket, point) in points.iter().enumerate() {
            let members: Vec<f64> = data
                .iter()
                .filter(|m| Granularity::FifteenMinutes.truncate(m.timestamp) == point.bucket_start)
                .filter_map(|m| m.value)
                .collect();
            let expected = members.iter().sum::<f64>() / members.len() as f64;
            let actual = point.value(SensorTypeId(1)).unwrap();

            assert!(
                (actual - expected).abs() < 1e-9,
                "bucket {bucket}: expected {expected}, got {actual}"
            );
        }
        assert_eq!(points[1].time_label, "00:15");
    }

    #[test]
    fn test_missing_type_is_none_not_zero() {
        let data = [
            reading(1, 1, at_minutes(0), 10.0),
            reading(2, 2, at_minutes(1), 20.0),
            reading(3, 1, at_minutes(20), 30.0),
        ];

        let series = bucket_measurements(&data, None, false, &config());
        assert_eq!(series.columns(), [SensorTypeId(1), SensorTypeId(2)]);

        let points: Vec<ChartPoint> = series.collect();
        assert_eq!(points[1].values.get(&SensorTypeId(2)), Some(&None));
        assert_eq!(points[1].value(SensorTypeId(1)), Some(30.0));
    }

    #[test]
    fn test_invalid_values_skipped() {
        let mut missing = reading(2, 1, at_minutes(1), 0.0);
        missing.value = None;
        let data = [reading(1, 1, at_minutes(0), 10.0), missing];

        let points: Vec<ChartPoint> = bucket_measurements(&data, None, false, &config()).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(SensorTypeId(1)), Some(10.0));
    }

    #[test]
    fn test_bucketing_is_idempotent() {
        let data: Vec<Measurement> = (0..50)
            .map(|i| reading(i, i % 3, at_minutes(i * 7), (i % 11) as f64))
            .collect();
        let range = DateRange::new(origin(), at_minutes(50 * 7));

        let first: Vec<ChartPoint> =
            bucket_measurements(&data, Some(&range), true, &config()).collect();
        let second: Vec<ChartPoint> =
            bucket_measurements(&data, Some(&range), true, &config()).collect();

        assert_eq!(first, second);
        assert_eq!(first[0].time_label, "01/03 00:00");
    }

    #[test]
    fn test_long_range_buckets_by_day() {
        let data: Vec<Measurement> = (0..10)
            .map(|i| reading(i, 1, at_minutes(i * 24 * 60 + 30), 1.0))
            .collect();
        let range = DateRange::new(origin(), at_minutes(10 * 24 * 60));

        let series = bucket_measurements(&data, Some(&range), true, &config());
        assert_eq!(series.granularity(), Granularity::Daily);
        assert_eq!(series.len(), 10);
    }

    #[test]
    fn test_large_custom_range_is_subsampled() {
        let cfg = config();
        let data: Vec<Measurement> = (0..50_000)
            .map(|i| reading(i, 1, at_minutes(0) + TimeDelta::seconds(i), 1.0))
            .collect();
        let refs: Vec<&Measurement> = data.iter().collect();

        let kept = subsample(refs, &cfg);
        assert!(
            (15_000..=25_000).contains(&kept.len()),
            "kept {} points",
            kept.len()
        );
        assert_eq!(kept[0].id, data[0].id, "stride starts at the first point");
    }

    #[test]
    fn test_small_input_not_subsampled() {
        let data: Vec<Measurement> = (0..100)
            .map(|i| reading(i, 1, at_minutes(i), 1.0))
            .collect();
        let refs: Vec<&Measurement> = data.iter().collect();

        assert_eq!(subsample(refs, &config()).len(), 100);
    }
}
