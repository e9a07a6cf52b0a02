//! In-memory join of the classification hierarchy
//!
//! The backend returns each hierarchy level wholesale. The catalog indexes
//! them by id and answers the lookups the views need: names for metrics and
//! sensor types, the breadcrumb of a node up to its country, and the nodes
//! installed under a lot or farm.
//!
//! Parent references are guaranteed by the database, but records can be
//! fetched at slightly different moments, so a missing parent yields a
//! partial breadcrumb rather than an error.

use std::collections::BTreeMap;

use embassy_futures::join::{join3, join5};
use log::info;

use crate::model::{
    Company, CompanyId, Country, CountryId, Entity, EntityId, Farm, FarmId, Location, LocationId,
    Lot, LotId, Metric, MetricId, Node, NodeId, SensorType, SensorTypeId,
};
use crate::source::{CatalogSource, FetchResult};

/// Indexed hierarchy snapshot
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    countries: BTreeMap<CountryId, Country>,
    companies: BTreeMap<CompanyId, Company>,
    farms: BTreeMap<FarmId, Farm>,
    lots: BTreeMap<LotId, Lot>,
    locations: BTreeMap<LocationId, Location>,
    entities: BTreeMap<EntityId, Entity>,
    nodes: BTreeMap<NodeId, Node>,
    metrics: BTreeMap<MetricId, Metric>,
    sensor_types: BTreeMap<SensorTypeId, SensorType>,
}

/// A node and its ancestors, as far as they could be resolved
#[derive(Debug, Clone, Copy)]
pub struct Breadcrumb<'a> {
    pub node: &'a Node,
    pub entity: Option<&'a Entity>,
    pub location: Option<&'a Location>,
    pub lot: Option<&'a Lot>,
    pub farm: Option<&'a Farm>,
    pub company: Option<&'a Company>,
    pub country: Option<&'a Country>,
}

impl Breadcrumb<'_> {
    /// Names from the country down to the node, skipping unresolved levels
    pub fn path(&self) -> Vec<&str> {
        [
            self.country.map(|c| c.name.as_str()),
            self.company.map(|c| c.name.as_str()),
            self.farm.map(|f| f.name.as_str()),
            self.lot.map(|l| l.name.as_str()),
            self.location.map(|l| l.name.as_str()),
            Some(self.node.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

macro_rules! index_by_id {
    ($items:expr) => {
        $items.into_iter().map(|item| (item.id, item)).collect()
    };
}

impl Catalog {
    /// Fetch every hierarchy level from `source` and index it
    pub async fn load<S: CatalogSource>(source: &S) -> FetchResult<Self> {
        let (metrics, sensor_types, entities, countries, companies) = join5(
            source.metrics(),
            source.sensor_types(),
            source.entities(),
            source.countries(),
            source.companies(),
        )
        .await;
        let (farms, lots, locations) =
            join3(source.farms(), source.lots(), source.locations()).await;
        let nodes = source.nodes_with_location().await?;

        let mut catalog = Self {
            countries: index_by_id!(countries?),
            companies: index_by_id!(companies?),
            farms: index_by_id!(farms?),
            lots: index_by_id!(lots?),
            locations: index_by_id!(locations?),
            entities: index_by_id!(entities?),
            nodes: BTreeMap::new(),
            metrics: index_by_id!(metrics?),
            sensor_types: index_by_id!(sensor_types?),
        };

        for joined in nodes {
            // The join may carry a location the plain list missed
            if let Some(location) = joined.location {
                catalog.locations.entry(location.id).or_insert(location);
            }
            catalog.nodes.insert(joined.node.id, joined.node);
        }

        info!(
            "Catalog loaded: {} nodes, {} locations, {} metrics",
            catalog.nodes.len(),
            catalog.locations.len(),
            catalog.metrics.len()
        );
        Ok(catalog)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(&id)
    }

    pub fn metric(&self, id: MetricId) -> Option<&Metric> {
        self.metrics.get(&id)
    }

    pub fn sensor_type(&self, id: SensorTypeId) -> Option<&SensorType> {
        self.sensor_types.get(&id)
    }

    /// Display name of a sensor type, falling back to its id
    pub fn sensor_type_name(&self, id: SensorTypeId) -> String {
        self.sensor_type(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("type {id}"))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn active_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.active)
    }

    /// Resolve a node and its ancestors
    pub fn breadcrumb(&self, id: NodeId) -> Option<Breadcrumb<'_>> {
        let node = self.nodes.get(&id)?;
        let location = node.location_id.and_then(|id| self.locations.get(&id));
        let lot = location.and_then(|l| self.lots.get(&l.lot_id));
        let farm = lot.and_then(|l| self.farms.get(&l.farm_id));
        let company = farm.and_then(|f| self.companies.get(&f.company_id));
        let country = company.and_then(|c| self.countries.get(&c.country_id));

        Some(Breadcrumb {
            node,
            entity: self.entities.get(&node.entity_id),
            location,
            lot,
            farm,
            company,
            country,
        })
    }

    /// Nodes installed at any location of `lot`
    pub fn nodes_in_lot(&self, lot: LotId) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| {
                n.location_id
                    .and_then(|id| self.locations.get(&id))
                    .is_some_and(|l| l.lot_id == lot)
            })
            .collect()
    }

    /// Nodes installed anywhere on `farm`
    pub fn nodes_in_farm(&self, farm: FarmId) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| {
                n.location_id
                    .and_then(|id| self.locations.get(&id))
                    .and_then(|l| self.lots.get(&l.lot_id))
                    .is_some_and(|l| l.farm_id == farm)
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::fixtures::StaticCatalog;
    use super::*;
    use crate::source::FetchError;

    #[test]
    fn test_breadcrumb_resolves_full_chain() {
        let catalog = block_on(Catalog::load(&StaticCatalog::default())).unwrap();
        let crumb = catalog.breadcrumb(NodeId(1)).unwrap();

        assert_eq!(
            crumb.path(),
            ["Peru", "Agricola", "Fundo Norte", "Lote A", "Hilera 3", "Nodo 1"]
        );
        assert_eq!(crumb.entity.map(|e| e.name.as_str()), Some("Arandano"));
    }

    #[test]
    fn test_missing_parent_gives_partial_breadcrumb() {
        let catalog = block_on(Catalog::load(&StaticCatalog::default())).unwrap();

        let crumb = catalog.breadcrumb(NodeId(2)).unwrap();
        assert_eq!(
            crumb.path(),
            ["Hilera 9", "Nodo 2"],
            "location from the node join, but its lot is unknown"
        );

        let uninstalled = catalog.breadcrumb(NodeId(3)).unwrap();
        assert_eq!(uninstalled.path(), ["Nodo 3"]);
        assert!(catalog.breadcrumb(NodeId(99)).is_none());
    }

    #[test]
    fn test_nodes_by_lot_and_farm() {
        let catalog = block_on(Catalog::load(&StaticCatalog::default())).unwrap();

        let ids = |nodes: Vec<&Node>| nodes.iter().map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(ids(catalog.nodes_in_lot(LotId(1))), [NodeId(1)]);
        assert_eq!(ids(catalog.nodes_in_farm(FarmId(1))), [NodeId(1)]);
        assert_eq!(catalog.active_nodes().count(), 2);
        assert_eq!(catalog.sensor_type_name(SensorTypeId(1)), "Sonda 10cm");
        assert_eq!(catalog.sensor_type_name(SensorTypeId(5)), "type 5");
    }

    #[test]
    fn test_failed_level_fails_load() {
        let source = StaticCatalog { fail_metrics: true };
        assert_eq!(
            block_on(Catalog::load(&source)).unwrap_err(),
            FetchError::Timeout
        );
    }
}
