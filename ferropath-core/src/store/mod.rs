//! Spatial storage and routing collaborator.
//!
//! The core never talks to a database directly: it acquires a
//! [`StoreSession`] from a [`SpatialStore`] for the duration of one request
//! or one ingestion run, and the session is released when dropped.

use std::time::{Duration, Instant};

use geo::LineString;
use hashbrown::HashMap;

use crate::model::{Address, Edge, Node, PathRow};
use crate::network::TopologyBuild;
use crate::{EdgeId, Error, NodeId};

mod graph;
mod pool;
mod sqlite;

pub use graph::{RoutingGraph, Traversal};
pub use sqlite::{SqliteSession, SqliteStore};

/// Upper bound forwarded from a request to every collaborator call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No upper bound; used by startup ingestion
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// # Errors
    ///
    /// Returns [`Error::CollaboratorTimeout`] once the deadline has passed.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_expired() {
            Err(Error::CollaboratorTimeout)
        } else {
            Ok(())
        }
    }
}

/// Named relations kept by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Addresses,
    Streets,
    Vertices,
}

impl Relation {
    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Addresses => "addresses",
            Relation::Streets => "streets",
            Relation::Vertices => "streets_vertices",
        }
    }
}

/// Result of a k=1 nearest-node query
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNode {
    pub node: Node,
    /// Euclidean distance in projected units
    pub distance: f64,
}

pub trait SpatialStore: Send + Sync {
    type Session<'a>: StoreSession
    where
        Self: 'a;

    /// Takes a connection from the pool, waiting at most until `deadline`.
    ///
    /// # Errors
    ///
    /// [`Error::CollaboratorTimeout`] if no connection frees up in time,
    /// [`Error::CollaboratorUnavailable`] if the pool is unusable.
    fn acquire(&self, deadline: Deadline) -> Result<Self::Session<'_>, Error>;
}

/// One scoped connection to the store.
///
/// Every method checks the session deadline before touching storage.
pub trait StoreSession {
    fn deadline(&self) -> Deadline;

    /// Row count of a relation; a relation that does not exist yet counts 0.
    fn relation_count(&self, relation: Relation) -> Result<u64, Error>;

    /// Drops the address relation and loads `addresses` in its place.
    fn replace_addresses(&mut self, addresses: &[Address]) -> Result<usize, Error>;

    /// Case-insensitive substring match on the display name, in storage order.
    fn search_addresses(&self, needle: &str, limit: Option<usize>)
    -> Result<Vec<Address>, Error>;

    /// Builds the topology of `edges` and replaces the street and vertex
    /// relations with the result, atomically.
    fn replace_network(
        &mut self,
        edges: Vec<Edge>,
        snap_tolerance: f64,
    ) -> Result<TopologyBuild, Error>;

    /// Nearest node to a projected point, `None` when there are no nodes.
    fn nearest_node(&self, x: f64, y: f64) -> Result<Option<NearestNode>, Error>;

    /// Minimum-cost path as `pgr_dijkstra` rows; empty when unreachable.
    fn shortest_path(
        &self,
        start: NodeId,
        end: NodeId,
        directed: bool,
    ) -> Result<Vec<PathRow>, Error>;

    /// Projected geometries of the given edges; unknown ids are absent.
    fn edge_geometries(&self, ids: &[EdgeId]) -> Result<HashMap<EdgeId, LineString<f64>>, Error>;

    /// All edges ordered by id
    fn edges(&self) -> Result<Vec<Edge>, Error>;

    /// All nodes ordered by id
    fn nodes(&self) -> Result<Vec<Node>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_expiry() {
        assert!(Deadline::none().check().is_ok());
        assert_eq!(Deadline::none().remaining(), None);
        assert!(Deadline::after(Duration::from_secs(60)).check().is_ok());

        let past = Deadline::at(Instant::now() - Duration::from_millis(5));
        assert!(matches!(past.check(), Err(Error::CollaboratorTimeout)));
        assert_eq!(past.remaining(), Some(Duration::ZERO));
    }
}
