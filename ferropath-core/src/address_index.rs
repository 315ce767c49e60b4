//! Address gazetteer: bulk replace and substring lookup

use log::debug;

use crate::Error;
use crate::model::Address;
use crate::store::StoreSession;

pub const DEFAULT_MIN_QUERY_LEN: usize = 2;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressIndex {
    min_query_len: usize,
    suggestion_limit: usize,
}

impl Default for AddressIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUERY_LEN, DEFAULT_SUGGESTION_LIMIT)
    }
}

impl AddressIndex {
    pub fn new(min_query_len: usize, suggestion_limit: usize) -> Self {
        Self {
            min_query_len,
            suggestion_limit,
        }
    }

    /// Whether `query` is long enough to reach storage
    pub fn accepts(&self, query: &str) -> bool {
        query.chars().count() >= self.min_query_len
    }

    /// Replaces every stored address with `records`.
    ///
    /// # Errors
    ///
    /// [`Error::IngestionFailure`] if a record has an empty label or a
    /// coordinate outside the geographic range. Nothing is replaced then.
    pub fn ingest<S: StoreSession>(
        &self,
        session: &mut S,
        records: &[Address],
    ) -> Result<usize, Error> {
        for (position, address) in records.iter().enumerate() {
            let (lon, lat) = (address.lon(), address.lat());
            if address.display_name.trim().is_empty() {
                return Err(Error::ingestion(format!("address #{position} has no label")));
            }
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                return Err(Error::ingestion(format!(
                    "address '{}' has invalid coordinates ({lon}, {lat})",
                    address.display_name
                )));
            }
        }
        session.replace_addresses(records)
    }

    /// Case-insensitive substring search, in storage order.
    ///
    /// Queries shorter than the minimum length return nothing without
    /// touching the store.
    pub fn search<S: StoreSession>(&self, session: &S, query: &str) -> Result<Vec<Address>, Error> {
        if !self.accepts(query) {
            debug!("Address query '{query}' too short, skipped");
            return Ok(Vec::new());
        }
        session.search_addresses(query, None)
    }

    /// Up to the suggestion limit of matching labels
    pub fn suggest<S: StoreSession>(&self, session: &S, query: &str) -> Result<Vec<String>, Error> {
        if !self.accepts(query) {
            return Ok(Vec::new());
        }
        Ok(session
            .search_addresses(&query.to_lowercase(), Some(self.suggestion_limit))?
            .into_iter()
            .map(|address| address.display_name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Deadline, SpatialStore, SqliteStore};

    fn gazetteer() -> Vec<Address> {
        (1..=15)
            .map(|n| Address::new(format!("{n} Rue Saint-Jean"), -71.21, 46.81))
            .chain([Address::new("3 Avenue Cartier", -71.22, 46.80)])
            .collect()
    }

    #[test]
    fn short_queries_never_reach_the_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let index = AddressIndex::default();
        let session = store.acquire(Deadline::none()).unwrap();

        assert!(index.search(&session, "").unwrap().is_empty());
        assert!(index.search(&session, "r").unwrap().is_empty());
        assert!(index.suggest(&session, "é").unwrap().is_empty());
        assert_eq!(store.query_count(), 0);
    }

    #[test]
    fn suggestions_are_capped() {
        let store = SqliteStore::open_in_memory().unwrap();
        let index = AddressIndex::default();
        let mut session = store.acquire(Deadline::none()).unwrap();
        index.ingest(&mut session, &gazetteer()).unwrap();

        assert_eq!(index.suggest(&session, "SAINT-JEAN").unwrap().len(), 10);
        assert_eq!(index.search(&session, "saint-jean").unwrap().len(), 15);
        assert_eq!(
            index.suggest(&session, "cartier").unwrap(),
            ["3 Avenue Cartier"]
        );
        assert!(index.search(&session, "zz").unwrap().is_empty());
    }

    #[test]
    fn invalid_records_abort_ingestion() {
        let store = SqliteStore::open_in_memory().unwrap();
        let index = AddressIndex::default();
        let mut session = store.acquire(Deadline::none()).unwrap();
        index.ingest(&mut session, &gazetteer()).unwrap();

        let bad = [Address::new("Nowhere", -71.2, 146.8)];
        assert!(matches!(
            index.ingest(&mut session, &bad),
            Err(Error::IngestionFailure(_))
        ));
        assert_eq!(index.search(&session, "rue").unwrap().len(), 15);
    }
}
