//! Process-wide state, built once at startup and passed to every component.

use crate::address_index::{AddressIndex, DEFAULT_MIN_QUERY_LEN, DEFAULT_SUGGESTION_LIMIT};
use crate::crs::{CrsTransformer, MTM_ZONE_7_EPSG, WGS84_EPSG};
use crate::network::NetworkBuilder;
use crate::resolver::NodeResolver;
use crate::routing::{RouteOrchestrator, SelectionStrategy};
use crate::store::{Deadline, SpatialStore};
use crate::{DEFAULT_SNAP_TOLERANCE, Error};

/// Already-resolved settings for the core components
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    pub geographic_epsg: u32,
    pub projected_epsg: u32,
    /// Endpoint merge distance in projected units
    pub snap_tolerance: f64,
    pub min_query_len: usize,
    pub suggestion_limit: usize,
    pub selection: SelectionStrategy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            geographic_epsg: WGS84_EPSG,
            projected_epsg: MTM_ZONE_7_EPSG,
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            selection: SelectionStrategy::default(),
        }
    }
}

pub struct AppContext<S> {
    transformer: CrsTransformer,
    address_index: AddressIndex,
    store: S,
    config: ContextConfig,
}

impl<S: SpatialStore> AppContext<S> {
    /// # Errors
    ///
    /// [`Error::UnsupportedCrs`] for an unknown reference system pair,
    /// [`Error::InvalidData`] for a negative or non-finite snap tolerance.
    pub fn new(store: S, config: ContextConfig) -> Result<Self, Error> {
        let transformer = CrsTransformer::new(config.geographic_epsg, config.projected_epsg)?;
        if !config.snap_tolerance.is_finite() || config.snap_tolerance < 0.0 {
            return Err(Error::InvalidData(format!(
                "snap tolerance must be a non-negative number, got {}",
                config.snap_tolerance
            )));
        }

        Ok(Self {
            transformer,
            address_index: AddressIndex::new(config.min_query_len, config.suggestion_limit),
            store,
            config,
        })
    }

    pub fn transformer(&self) -> &CrsTransformer {
        &self.transformer
    }

    pub fn address_index(&self) -> &AddressIndex {
        &self.address_index
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn session(&self, deadline: Deadline) -> Result<S::Session<'_>, Error> {
        self.store.acquire(deadline)
    }

    pub fn resolver(&self) -> NodeResolver<'_> {
        NodeResolver::new(&self.transformer)
    }

    pub fn orchestrator(&self) -> RouteOrchestrator<'_> {
        RouteOrchestrator::new(&self.address_index, &self.transformer, self.config.selection)
    }

    /// Builder for street data given in `source_epsg`
    pub fn network_builder(&self, source_epsg: u32) -> Result<NetworkBuilder<'_>, Error> {
        NetworkBuilder::new(&self.transformer, source_epsg, self.config.snap_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn rejects_bad_settings() {
        let unsupported = ContextConfig {
            projected_epsg: 3857,
            ..ContextConfig::default()
        };
        assert!(matches!(
            AppContext::new(SqliteStore::open_in_memory().unwrap(), unsupported),
            Err(Error::UnsupportedCrs(3857))
        ));

        let negative = ContextConfig {
            snap_tolerance: -1.0,
            ..ContextConfig::default()
        };
        assert!(matches!(
            AppContext::new(SqliteStore::open_in_memory().unwrap(), negative),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn builder_accepts_both_reference_systems() {
        let context =
            AppContext::new(SqliteStore::open_in_memory().unwrap(), ContextConfig::default())
                .unwrap();
        assert!(context.network_builder(WGS84_EPSG).is_ok());
        assert!(context.network_builder(MTM_ZONE_7_EPSG).is_ok());
        assert!(matches!(
            context.network_builder(32188),
            Err(Error::UnsupportedCrs(32188))
        ));
    }
}
