//! reqwest-backed implementation of the core source traits

use joysense_core::model::{
    Company, Country, Entity, Farm, Location, Lot, Measurement, Metric, NodeWithLocation,
    SensorType,
};
use joysense_core::source::{
    CatalogSource, FetchError, FetchResult, MeasurementQuery, MeasurementSource, RowLimit,
};
use joysense_core::time::format_wire;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::wire::{
    CompanyRow, CountryRow, EntityRow, FarmRow, LocationRow, LotRow, MeasurementRow, MetricRow,
    NodeLocationRow, SensorTypeRow, WireRow, decode_rows,
};

/// Backend resource names
mod resource {
    pub const MEASUREMENTS: &str = "mediciones";
    pub const METRICS: &str = "metricas";
    pub const SENSOR_TYPES: &str = "tipos";
    pub const ENTITIES: &str = "entidades";
    pub const COUNTRIES: &str = "paises";
    pub const COMPANIES: &str = "empresas";
    pub const FARMS: &str = "fundos";
    pub const LOTS: &str = "ubicaciones";
    pub const LOCATIONS: &str = "localizaciones";
    pub const NODES_WITH_LOCATION: &str = "nodos-localizacion";
}

/// Backend client bound to one schema
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    schema: String,
}

impl HttpSource {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            schema: config.schema.clone(),
        })
    }

    pub fn endpoint(&self, resource: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.schema, resource)
    }

    async fn get(&self, resource: &str, params: &[(&'static str, String)]) -> FetchResult<Value> {
        let url = self.endpoint(resource);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_server_error() {
            return Err(FetchError::Server {
                status: status.as_u16(),
                message: body,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("Undecodable body from {}: {}", resource, e);
            Value::Null
        }))
    }

    async fn rows<R: WireRow>(
        &self,
        resource: &str,
        params: &[(&'static str, String)],
    ) -> FetchResult<Vec<R::Model>> {
        let body = self.get(resource, params).await?;
        Ok(decode_rows::<R>(resource, body))
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

/// Query-string parameters for a measurement query
pub fn query_pairs(query: &MeasurementQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(node) = query.node {
        pairs.push(("nodoid", node.to_string()));
    }
    if let Some(location) = query.location {
        pairs.push(("localizacionid", location.to_string()));
    }
    if let Some(entity) = query.entity {
        pairs.push(("entidadid", entity.to_string()));
    }
    if let Some(metric) = query.metric {
        pairs.push(("metricaid", metric.to_string()));
    }
    if let Some(range) = &query.range {
        pairs.push(("startDate", format_wire(&range.start)));
        pairs.push(("endDate", format_wire(&range.end)));
    }
    match query.limit {
        RowLimit::Capped(limit) => pairs.push(("limit", limit.to_string())),
        RowLimit::All => pairs.push(("getAll", "true".to_string())),
    }
    pairs
}

impl MeasurementSource for HttpSource {
    async fn measurements(&self, query: &MeasurementQuery) -> FetchResult<Vec<Measurement>> {
        self.rows::<MeasurementRow>(resource::MEASUREMENTS, &query_pairs(query))
            .await
    }
}

impl CatalogSource for HttpSource {
    async fn metrics(&self) -> FetchResult<Vec<Metric>> {
        self.rows::<MetricRow>(resource::METRICS, &[]).await
    }

    async fn sensor_types(&self) -> FetchResult<Vec<SensorType>> {
        self.rows::<SensorTypeRow>(resource::SENSOR_TYPES, &[]).await
    }

    async fn entities(&self) -> FetchResult<Vec<Entity>> {
        self.rows::<EntityRow>(resource::ENTITIES, &[]).await
    }

    async fn countries(&self) -> FetchResult<Vec<Country>> {
        self.rows::<CountryRow>(resource::COUNTRIES, &[]).await
    }

    async fn companies(&self) -> FetchResult<Vec<Company>> {
        self.rows::<CompanyRow>(resource::COMPANIES, &[]).await
    }

    async fn farms(&self) -> FetchResult<Vec<Farm>> {
        self.rows::<FarmRow>(resource::FARMS, &[]).await
    }

    async fn lots(&self) -> FetchResult<Vec<Lot>> {
        self.rows::<LotRow>(resource::LOTS, &[]).await
    }

    async fn locations(&self) -> FetchResult<Vec<Location>> {
        self.rows::<LocationRow>(resource::LOCATIONS, &[]).await
    }

    async fn nodes_with_location(&self) -> FetchResult<Vec<NodeWithLocation>> {
        self.rows::<NodeLocationRow>(resource::NODES_WITH_LOCATION, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use chrono::NaiveDate;
    use joysense_core::model::{MetricId, NodeId};
    use joysense_core::time::DateRange;

    use super::*;

    fn source() -> HttpSource {
        HttpSource::new(&ClientConfig {
            base_url: "http://localhost:3001".into(),
            schema: "sense".into(),
            timeout: Duration::from_secs(5),
            cache_ttl: None,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_includes_schema() {
        assert_eq!(
            source().endpoint(resource::MEASUREMENTS),
            "http://localhost:3001/api/sense/mediciones"
        );
    }

    #[test]
    fn test_query_pairs_for_capped_range() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let range = DateRange::new(
            day.and_hms_opt(0, 0, 0).unwrap(),
            day.and_hms_opt(23, 59, 59).unwrap(),
        );
        let query = MeasurementQuery::for_node(NodeId(4))
            .with_metric(Some(MetricId(2)))
            .with_range(range)
            .with_limit(RowLimit::Capped(5_000));

        assert_eq!(
            query_pairs(&query),
            [
                ("nodoid", "4".to_string()),
                ("metricaid", "2".to_string()),
                ("startDate", "2024-03-01 00:00:00".to_string()),
                ("endDate", "2024-03-01 23:59:59".to_string()),
                ("limit", "5000".to_string()),
            ]
        );
    }

    #[test]
    fn test_unbounded_query_uses_get_all() {
        let query = MeasurementQuery::for_node(NodeId(4)).with_limit(RowLimit::All);
        assert_eq!(
            query_pairs(&query),
            [("nodoid", "4".to_string()), ("getAll", "true".to_string())]
        );
    }
}
