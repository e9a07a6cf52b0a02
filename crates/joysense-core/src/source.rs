//! Boundary to the backend read API
//!
//! The core never talks HTTP itself. Views and coordination helpers are
//! generic over [`MeasurementSource`] and [`CatalogSource`]; the client crate
//! implements them over the JSON API and tests implement them in memory.
//!
//! Sources must distinguish "no data" (an empty `Vec`) from "query failed"
//! (an `Err`). Malformed payloads are the source's concern: they are logged
//! and reported as empty, never as errors.

use core::future::Future;

use thiserror::Error;

use crate::model::{
    Company, Country, Entity, EntityId, Farm, Location, LocationId, Lot, Measurement, Metric,
    MetricId, NodeId, NodeWithLocation, SensorType,
};
use crate::time::DateRange;

/// Row cap for a measurement query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowLimit {
    /// At most this many rows
    Capped(usize),
    /// Unbounded retrieval (`getAll`)
    All,
}

impl Default for RowLimit {
    fn default() -> Self {
        Self::Capped(1_000)
    }
}

/// Filters for a measurement query. Every filter is optional and they
/// combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MeasurementQuery {
    pub node: Option<NodeId>,
    pub location: Option<LocationId>,
    pub entity: Option<EntityId>,
    pub metric: Option<MetricId>,
    pub range: Option<DateRange>,
    pub limit: RowLimit,
}

impl MeasurementQuery {
    pub fn for_node(node: NodeId) -> Self {
        Self {
            node: Some(node),
            ..Self::default()
        }
    }

    pub fn for_location(location: LocationId) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_metric(mut self, metric: Option<MetricId>) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_limit(mut self, limit: RowLimit) -> Self {
        self.limit = limit;
        self
    }
}

/// Failure of a backend request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl FetchError {
    /// Timeouts, network failures and 5xx responses are likely to go away on
    /// their own. Views keep their last good state for these instead of
    /// showing an error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::Server { .. }
        )
    }
}

/// Result type for backend requests
pub type FetchResult<T> = Result<T, FetchError>;

/// Read access to measurements
pub trait MeasurementSource {
    /// Measurements matching `query`. An empty `Vec` means no data.
    fn measurements(
        &self,
        query: &MeasurementQuery,
    ) -> impl Future<Output = FetchResult<Vec<Measurement>>>;
}

/// Read access to the classification hierarchy
pub trait CatalogSource {
    fn metrics(&self) -> impl Future<Output = FetchResult<Vec<Metric>>>;
    fn sensor_types(&self) -> impl Future<Output = FetchResult<Vec<SensorType>>>;
    fn entities(&self) -> impl Future<Output = FetchResult<Vec<Entity>>>;
    fn countries(&self) -> impl Future<Output = FetchResult<Vec<Country>>>;
    fn companies(&self) -> impl Future<Output = FetchResult<Vec<Company>>>;
    fn farms(&self) -> impl Future<Output = FetchResult<Vec<Farm>>>;
    fn lots(&self) -> impl Future<Output = FetchResult<Vec<Lot>>>;
    fn locations(&self) -> impl Future<Output = FetchResult<Vec<Location>>>;
    fn nodes_with_location(&self) -> impl Future<Output = FetchResult<Vec<NodeWithLocation>>>;
}

impl<S: MeasurementSource> MeasurementSource for &S {
    fn measurements(
        &self,
        query: &MeasurementQuery,
    ) -> impl Future<Output = FetchResult<Vec<Measurement>>> {
        (**self).measurements(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Network("reset".into()).is_transient());
        assert!(
            FetchError::Server {
                status: 500,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !FetchError::Rejected {
                status: 404,
                message: "no such node".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_query_builder() {
        let query = MeasurementQuery::for_node(NodeId(3))
            .with_metric(Some(MetricId(1)))
            .with_limit(RowLimit::All);

        assert_eq!(query.node, Some(NodeId(3)));
        assert_eq!(query.metric, Some(MetricId(1)));
        assert_eq!(query.limit, RowLimit::All);
        assert_eq!(query.range, None);
    }
}
