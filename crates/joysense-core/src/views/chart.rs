//! Live chart view for one node
//!
//! Holds the state behind the dashboard chart and runs the fetch pipeline:
//!
//! 1. A request either names an explicit date range or asks for "recent"
//!    data. Recent requests walk the progressive range ladder, then keep only
//!    the most recent continuous segment of readings.
//! 2. Readings are bucketed per sensor type and committed to the view state,
//!    but only if the request is still the current one.
//!
//! Transient failures leave the previous chart untouched and silent; other
//! failures clear the series and are surfaced in [`ViewStatus::Failed`].
//! [`ChartState::request`] always names the request the series belongs to;
//! the request in flight is tracked separately in [`ChartState::pending`].

use core::cell::{Ref, RefCell};

use log::{debug, error, info, warn};

use crate::analysis::{
    AnalysisResult, ChartPoint, Granularity, Recommendations, SegmentOutcome, bucket_measurements,
    recommend_thresholds, select_continuous_segment,
};
use crate::config::DashboardConfig;
use crate::coordination::{
    Clock, DebounceDecision, Debouncer, ProgressiveOutcome, RequestTracker, fetch_progressively,
};
use crate::model::{Measurement, MetricId, NodeId, SensorTypeId};
use crate::source::{FetchResult, MeasurementQuery, MeasurementSource, RowLimit};
use crate::time::{DateRange, floor_to};

use super::ViewStatus;

/// Parameters of a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub node: NodeId,
    pub metric: Option<MetricId>,
    /// Explicit range picked by the user, `None` for the live view
    pub range: Option<DateRange>,
}

impl ChartRequest {
    pub fn live(node: NodeId) -> Self {
        Self {
            node,
            metric: None,
            range: None,
        }
    }

    pub fn with_metric(mut self, metric: MetricId) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    fn query(&self) -> MeasurementQuery {
        MeasurementQuery::for_node(self.node).with_metric(self.metric)
    }
}

/// What a `load` call did to the view state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New state was committed (data, empty, or a reported failure)
    Committed,
    /// A transient failure left the previous state in place
    KeptPrevious,
    /// A newer request superseded this one; nothing was committed
    Superseded,
}

/// State rendered by the chart
#[derive(Debug, Clone, Default)]
pub struct ChartState {
    /// The request behind the committed series and status
    pub request: Option<ChartRequest>,
    /// The request in flight; prior data stays visible meanwhile
    pub pending: Option<ChartRequest>,
    pub status: ViewStatus,
    pub granularity: Option<Granularity>,
    pub columns: Vec<SensorTypeId>,
    pub points: Vec<ChartPoint>,
    /// How the live segment was chosen, for live requests
    pub segment: Option<SegmentOutcome>,
    /// The readings behind `points`
    pub readings: Vec<Measurement>,
}

impl ChartState {
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn clear_series(&mut self) {
        self.granularity = None;
        self.columns.clear();
        self.points.clear();
        self.segment = None;
        self.readings.clear();
    }
}

enum Fetched {
    Rows(Vec<Measurement>),
    NoRecentData,
}

/// Chart view over a measurement source
pub struct ChartView<S, C> {
    source: S,
    clock: C,
    config: DashboardConfig,
    tracker: RequestTracker,
    debouncer: RefCell<Debouncer<ChartRequest>>,
    state: RefCell<ChartState>,
}

impl<S: MeasurementSource, C: Clock> ChartView<S, C> {
    pub fn new(source: S, clock: C, config: DashboardConfig) -> Self {
        let debouncer = Debouncer::new(config.fetch.debounce());
        Self {
            source,
            clock,
            config,
            tracker: RequestTracker::new(),
            debouncer: RefCell::new(debouncer),
            state: RefCell::new(ChartState::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> Ref<'_, ChartState> {
        self.state.borrow()
    }

    /// Submit a parameter change through the debouncer.
    ///
    /// Returns the request to load right away if the change bypasses the
    /// quiet period; otherwise the event loop should call [`Self::due`] at
    /// [`Self::next_deadline`].
    pub fn schedule(&self, request: ChartRequest) -> Option<ChartRequest> {
        let now = self.clock.now();
        match self.debouncer.borrow_mut().submit(request, now) {
            DebounceDecision::Immediate(request) => Some(request),
            DebounceDecision::Scheduled { .. } => None,
        }
    }

    /// A debounced request whose quiet period has elapsed
    pub fn due(&self) -> Option<ChartRequest> {
        self.debouncer.borrow_mut().poll(self.clock.now())
    }

    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.debouncer.borrow().deadline()
    }

    /// Forget all data and cancel anything in flight, as when the view closes
    pub fn reset(&self) {
        self.tracker.cancel_all();
        self.debouncer.borrow_mut().reset();
        *self.state.borrow_mut() = ChartState::default();
    }

    /// Fetch and commit the chart for `request`
    pub async fn load(&self, request: ChartRequest) -> LoadOutcome {
        let ticket = self.tracker.begin();
        {
            let mut state = self.state.borrow_mut();
            state.pending = Some(request.clone());
        }

        let Some(result) = ticket.run(self.fetch(&request)).await else {
            return LoadOutcome::Superseded;
        };
        if !self.tracker.is_current(&ticket) {
            debug!("Dropping stale response for request {}", ticket.id());
            return LoadOutcome::Superseded;
        }

        let mut state = self.state.borrow_mut();
        state.pending = None;

        match result {
            Ok(Fetched::Rows(rows)) => {
                self.commit(&mut state, request, rows);
                LoadOutcome::Committed
            }
            Ok(Fetched::NoRecentData) => {
                info!("Node {} has no recent data", request.node);
                state.clear_series();
                state.status = ViewStatus::NoRecentData;
                state.request = Some(request);
                LoadOutcome::Committed
            }
            Err(e) if e.is_transient() => {
                warn!("Keeping previous chart after transient failure: {}", e);
                LoadOutcome::KeptPrevious
            }
            Err(e) => {
                error!("Chart request for node {} failed: {}", request.node, e);
                state.clear_series();
                state.status = ViewStatus::Failed(e.to_string());
                state.request = Some(request);
                LoadOutcome::Committed
            }
        }
    }

    /// Threshold recommendations for the readings currently charted
    pub fn recommendations(&self) -> AnalysisResult<Recommendations> {
        recommend_thresholds(&self.state.borrow().readings, &self.config.thresholds)
    }

    async fn fetch(&self, request: &ChartRequest) -> FetchResult<Fetched> {
        match request.range {
            Some(range) => {
                let query = request
                    .query()
                    .with_range(range)
                    .with_limit(RowLimit::All);
                self.source.measurements(&query).await.map(Fetched::Rows)
            }
            None => {
                let anchor = floor_to(self.clock.local_time(), self.config.fetch.anchor_grain());
                let outcome = fetch_progressively(
                    &self.source,
                    &request.query(),
                    anchor,
                    &self.config.fetch.range_ladder,
                )
                .await?;

                Ok(match outcome {
                    ProgressiveOutcome::Found { rows, .. } => Fetched::Rows(rows),
                    ProgressiveOutcome::NoRecentData { .. } => Fetched::NoRecentData,
                })
            }
        }
    }

    fn commit(&self, state: &mut ChartState, request: ChartRequest, rows: Vec<Measurement>) {
        let chart = &self.config.chart;

        let (readings, segment) = match &request.range {
            Some(_) => (rows, None),
            None => {
                let segment = select_continuous_segment(&rows, chart);
                (segment.measurements, Some(segment.outcome))
            }
        };

        let multi_day = request.range.is_some_and(|r| r.spans_multiple_days());
        let series = bucket_measurements(&readings, request.range.as_ref(), multi_day, chart);
        let granularity = series.granularity();
        let columns = series.columns().to_vec();
        let points: Vec<ChartPoint> = series.collect();

        debug!(
            "Committing {} points for node {} ({} readings)",
            points.len(),
            request.node,
            readings.len()
        );

        state.status = if points.is_empty() {
            ViewStatus::NoData
        } else {
            ViewStatus::Ready
        };
        state.granularity = Some(granularity);
        state.columns = columns;
        state.points = points;
        state.segment = segment;
        state.readings = readings;
        state.request = Some(request);
    }
}
