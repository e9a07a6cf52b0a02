//! Lot report: thresholds and trend for one location and metric over a range

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::{
    AnalysisError, ChartPoint, Granularity, Recommendations, bucket_measurements,
    filter_measurements, recommend_thresholds,
};
use crate::config::DashboardConfig;
use crate::model::{LocationId, Measurement, MetricId, SensorTypeId};
use crate::source::{FetchError, MeasurementQuery, MeasurementSource, RowLimit};
use crate::time::DateRange;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRequest {
    pub location: LocationId,
    pub metric: MetricId,
    pub range: DateRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdReport {
    pub request: ReportRequest,
    pub granularity: Granularity,
    pub columns: Vec<SensorTypeId>,
    pub points: Vec<ChartPoint>,
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Fetch every reading in the request range and derive the report.
///
/// Rows outside the metric or range are dropped before analysis, since the
/// backend filter is not trusted to be exact at the range bounds.
pub async fn build_threshold_report<S: MeasurementSource>(
    source: &S,
    request: &ReportRequest,
    config: &DashboardConfig,
) -> Result<ThresholdReport, ReportError> {
    let query = MeasurementQuery::for_location(request.location)
        .with_metric(Some(request.metric))
        .with_range(request.range)
        .with_limit(RowLimit::All);

    let rows = source.measurements(&query).await?;
    let readings: Vec<Measurement> =
        filter_measurements(&rows, Some(request.metric), Some(&request.range))
            .copied()
            .collect();
    debug!("{} of {} rows kept for report", readings.len(), rows.len());

    let recommendations = recommend_thresholds(&readings, &config.thresholds)?;

    let series = bucket_measurements(
        &readings,
        Some(&request.range),
        request.range.spans_multiple_days(),
        &config.chart,
    );
    let granularity = series.granularity();
    let columns = series.columns().to_vec();
    let points = series.collect();

    info!(
        "Report for location {} metric {}: {} types",
        request.location,
        request.metric,
        recommendations.len()
    );

    Ok(ThresholdReport {
        request: request.clone(),
        granularity,
        columns,
        points,
        recommendations,
    })
}
