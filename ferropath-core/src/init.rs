//! Startup ingestion, run only against empty relations.

use log::info;

use crate::context::AppContext;
use crate::loading::DataSource;
use crate::network::BuildReport;
use crate::store::{Deadline, Relation, SpatialStore, StoreSession};
use crate::Error;

/// What a startup run ingested; `None` means the relation was already populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitReport {
    pub addresses: Option<usize>,
    pub network: Option<BuildReport>,
}

impl InitReport {
    pub fn ingested_anything(&self) -> bool {
        self.addresses.is_some() || self.network.is_some()
    }
}

/// Populates empty address and street relations from a [`DataSource`].
///
/// Must finish before any query is served; it is not safe to run next to
/// query traffic or from a second process on the same store.
pub struct InitializationGuard<'a, S> {
    context: &'a AppContext<S>,
}

impl<'a, S: SpatialStore> InitializationGuard<'a, S> {
    pub fn new(context: &'a AppContext<S>) -> Self {
        Self { context }
    }

    /// # Errors
    ///
    /// Any load or build failure. The service must not start in that case.
    pub fn ensure_initialized<D: DataSource + ?Sized>(
        &self,
        source: &D,
    ) -> Result<InitReport, Error> {
        let mut session = self.context.session(Deadline::none())?;
        let address_count = session.relation_count(Relation::Addresses)?;
        let street_count = session.relation_count(Relation::Streets)?;
        info!("Counted {address_count} addresses and {street_count} streets in the store");

        let mut report = InitReport::default();

        if address_count == 0 {
            let addresses = source.load_addresses()?;
            let ingested = self
                .context
                .address_index()
                .ingest(&mut session, &addresses)?;
            info!("Initialized {ingested} addresses");
            report.addresses = Some(ingested);
        }

        if street_count == 0 {
            let segments = source.load_streets()?;
            let builder = self.context.network_builder(source.streets_epsg())?;
            report.network = Some(builder.build(&mut session, segments)?);
        }

        if !report.ingested_anything() {
            info!("Store already populated, skipping ingestion");
        }
        Ok(report)
    }
}
