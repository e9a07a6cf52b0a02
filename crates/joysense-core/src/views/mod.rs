//! View state built on top of the analysis and coordination layers

pub mod chart;
pub mod report;

pub use chart::{ChartRequest, ChartState, ChartView, LoadOutcome};
pub use report::{ReportError, ReportRequest, ThresholdReport, build_threshold_report};

/// What a view currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewStatus {
    /// Nothing requested yet
    #[default]
    Idle,
    Ready,
    /// The requested range holds no valid readings
    NoData,
    /// The node has not reported within the widest history window
    NoRecentData,
    /// The last request failed permanently
    Failed(String),
}
