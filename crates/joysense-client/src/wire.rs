//! Backend row formats
//!
//! The backend exposes its tables as JSON arrays with the database column
//! names. Each row type here mirrors one endpoint and converts into the core
//! model. A body that is not an array decodes to no rows; a row that fails
//! to decode is skipped. Both cases are logged.

use joysense_core::model::{
    Company, CompanyId, Country, CountryId, Entity, EntityId, Farm, FarmId, Location, LocationId,
    Lot, LotId, Measurement, MeasurementId, Metric, MetricId, Node, NodeId, NodeWithLocation,
    SensorType, SensorTypeId,
};
use joysense_core::time::parse_timestamp;
use log::warn;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Row status meaning "active"
const STATUS_ACTIVE: i64 = 1;

fn is_active(status: Option<i64>) -> bool {
    status.is_none_or(|s| s == STATUS_ACTIVE)
}

/// Conversion from a wire row into a model value
pub trait WireRow: DeserializeOwned {
    type Model;

    /// `None` when the row is structurally valid but unusable
    fn into_model(self) -> Option<Self::Model>;
}

/// Decode `body` as an array of `R`, dropping what cannot be used
pub fn decode_rows<R: WireRow>(resource: &str, body: Value) -> Vec<R::Model> {
    let Value::Array(items) = body else {
        warn!("Expected an array from {}, treating as empty", resource);
        return Vec::new();
    };

    let total = items.len();
    let rows: Vec<R::Model> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<R>(item) {
            Ok(row) => row.into_model(),
            Err(e) => {
                warn!("Skipping malformed {} row: {}", resource, e);
                None
            }
        })
        .collect();

    if rows.len() < total {
        warn!("Dropped {} of {} {} rows", total - rows.len(), total, resource);
    }
    rows
}

/// A reading as a number, accepting numeric strings
fn reading_value(raw: &Value) -> Option<f64> {
    let value: Option<f64> = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
pub struct MeasurementRow {
    pub medicionid: i64,
    pub nodoid: i64,
    pub localizacionid: i64,
    pub tipoid: i64,
    pub metricaid: i64,
    pub fecha: String,
    #[serde(default)]
    pub medicion: Value,
}

impl WireRow for MeasurementRow {
    type Model = Measurement;

    fn into_model(self) -> Option<Measurement> {
        let Some(timestamp) = parse_timestamp(&self.fecha) else {
            warn!(
                "Skipping measurement {} with bad timestamp {:?}",
                self.medicionid, self.fecha
            );
            return None;
        };
        Some(Measurement {
            id: MeasurementId(self.medicionid),
            node_id: NodeId(self.nodoid),
            location_id: LocationId(self.localizacionid),
            type_id: SensorTypeId(self.tipoid),
            metric_id: MetricId(self.metricaid),
            timestamp,
            value: reading_value(&self.medicion),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricRow {
    pub metricaid: i64,
    pub metrica: String,
    #[serde(default)]
    pub unidad: Option<String>,
}

impl WireRow for MetricRow {
    type Model = Metric;

    fn into_model(self) -> Option<Metric> {
        Some(Metric {
            id: MetricId(self.metricaid),
            name: self.metrica,
            unit: self.unidad.filter(|u| !u.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SensorTypeRow {
    pub tipoid: i64,
    pub tipo: String,
}

impl WireRow for SensorTypeRow {
    type Model = SensorType;

    fn into_model(self) -> Option<SensorType> {
        Some(SensorType {
            id: SensorTypeId(self.tipoid),
            name: self.tipo,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EntityRow {
    pub entidadid: i64,
    pub entidad: String,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for EntityRow {
    type Model = Entity;

    fn into_model(self) -> Option<Entity> {
        Some(Entity {
            id: EntityId(self.entidadid),
            name: self.entidad,
            active: is_active(self.statusid),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CountryRow {
    pub paisid: i64,
    pub pais: String,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for CountryRow {
    type Model = Country;

    fn into_model(self) -> Option<Country> {
        Some(Country {
            id: CountryId(self.paisid),
            name: self.pais,
            active: is_active(self.statusid),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CompanyRow {
    pub empresaid: i64,
    pub empresa: String,
    pub paisid: i64,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for CompanyRow {
    type Model = Company;

    fn into_model(self) -> Option<Company> {
        Some(Company {
            id: CompanyId(self.empresaid),
            name: self.empresa,
            country_id: CountryId(self.paisid),
            active: is_active(self.statusid),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct FarmRow {
    pub fundoid: i64,
    pub fundo: String,
    pub empresaid: i64,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for FarmRow {
    type Model = Farm;

    fn into_model(self) -> Option<Farm> {
        Some(Farm {
            id: FarmId(self.fundoid),
            name: self.fundo,
            company_id: CompanyId(self.empresaid),
            active: is_active(self.statusid),
        })
    }
}

/// Lot row (`ubicacion`)
#[derive(Debug, Deserialize)]
pub struct LotRow {
    pub ubicacionid: i64,
    pub ubicacion: String,
    pub fundoid: i64,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for LotRow {
    type Model = Lot;

    fn into_model(self) -> Option<Lot> {
        Some(Lot {
            id: LotId(self.ubicacionid),
            name: self.ubicacion,
            farm_id: FarmId(self.fundoid),
            active: is_active(self.statusid),
        })
    }
}

/// Location row (`localizacion`)
#[derive(Debug, Deserialize)]
pub struct LocationRow {
    pub localizacionid: i64,
    pub localizacion: String,
    pub ubicacionid: i64,
    #[serde(default)]
    pub statusid: Option<i64>,
}

impl WireRow for LocationRow {
    type Model = Location;

    fn into_model(self) -> Option<Location> {
        Some(Location {
            id: LocationId(self.localizacionid),
            name: self.localizacion,
            lot_id: LotId(self.ubicacionid),
            active: is_active(self.statusid),
        })
    }
}

/// Node joined with its location. The join is null for nodes that are not
/// installed anywhere.
#[derive(Debug, Deserialize)]
pub struct NodeLocationRow {
    pub nodoid: i64,
    pub nodo: String,
    pub entidadid: i64,
    #[serde(default)]
    pub statusid: Option<i64>,
    #[serde(default)]
    pub localizacion: Option<LocationRow>,
}

impl WireRow for NodeLocationRow {
    type Model = NodeWithLocation;

    fn into_model(self) -> Option<NodeWithLocation> {
        let location = self.localizacion.and_then(LocationRow::into_model);
        Some(NodeWithLocation {
            node: Node {
                id: NodeId(self.nodoid),
                name: self.nodo,
                entity_id: EntityId(self.entidadid),
                location_id: location.as_ref().map(|l| l.id),
                active: is_active(self.statusid),
            },
            location,
        })
    }
}
