//! Records fetched from the backend read API
//!
//! All records are immutable snapshots. Measurements are produced by the
//! field hardware ingestion pipeline; the hierarchy records form a fixed
//! chain `Location -> Lot -> Farm -> Company -> Country`, with nodes attached
//! to a location and grouped by entity (crop/production block).

use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

macro_rules! id_types {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<i64> for $name {
                fn from(value: i64) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

id_types!(
    /// Identifier of a single reading
    MeasurementId,
    /// Identifier of a physical sensor device
    NodeId,
    /// Identifier of a location (installation point inside a lot)
    LocationId,
    /// Identifier of a lot (`ubicacion`), a geographic sub-area of a farm
    LotId,
    /// Identifier of a crop/production grouping
    EntityId,
    /// Identifier of a farm (`fundo`)
    FarmId,
    /// Identifier of a company
    CompanyId,
    /// Identifier of a country
    CountryId,
    /// Identifier of a measured magnitude (temperature, humidity, ...)
    MetricId,
    /// Identifier of a sensor subtype within a metric
    SensorTypeId,
);

/// One timestamped sensor value.
///
/// `value` is `None` when the backend row carried a missing or non-numeric
/// reading. Such rows are kept so callers can count them, but they are never
/// treated as data by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub node_id: NodeId,
    pub location_id: LocationId,
    pub type_id: SensorTypeId,
    pub metric_id: MetricId,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

impl Measurement {
    /// The reading as a usable number, if it is one
    pub fn valid_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub country_id: CountryId,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    pub name: String,
    pub company_id: CompanyId,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    pub farm_id: FarmId,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub lot_id: LotId,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub active: bool,
}

/// A physical sensor device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub entity_id: EntityId,
    /// Nodes in storage or not yet installed have no location
    pub location_id: Option<LocationId>,
    pub active: bool,
}

/// Node row joined with its location, as returned by the nodes-with-location
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWithLocation {
    pub node: Node,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub name: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorType {
    pub id: SensorTypeId,
    pub name: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    /// 2024-03-01 00:00:00, the origin used by the tests
    pub(crate) fn origin() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    pub(crate) fn at_minutes(minutes: i64) -> NaiveDateTime {
        origin() + chrono::TimeDelta::minutes(minutes)
    }

    pub(crate) fn reading(id: i64, type_id: i64, timestamp: NaiveDateTime, value: f64) -> Measurement {
        Measurement {
            id: MeasurementId(id),
            node_id: NodeId(1),
            location_id: LocationId(10),
            type_id: SensorTypeId(type_id),
            metric_id: MetricId(2),
            timestamp,
            value: Some(value),
        }
    }
}
