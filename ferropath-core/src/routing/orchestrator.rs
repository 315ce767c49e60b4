//! Route requests from query text to an assembled path.
//!
//! Stages run strictly in order and stop at the first empty outcome:
//! start address, end address, start node, end node, shortest path,
//! assembly. Storage failures abort the request as errors; empty stages are
//! [`RouteOutcome`] variants.

use geo::Point;
use log::{debug, warn};

use super::SelectionStrategy;
use crate::address_index::AddressIndex;
use crate::crs::CrsTransformer;
use crate::model::{PathResult, PathRow, PathStep, RouteOutcome};
use crate::resolver::NodeResolver;
use crate::store::StoreSession;
use crate::{Error, NodeId};

/// One end of a route request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteQuery {
    /// Free text matched against address labels
    Text(String),
    /// Geographic point snapped straight to the graph
    Point { lat: f64, lon: f64 },
}

impl From<&str> for RouteQuery {
    fn from(text: &str) -> Self {
        RouteQuery::Text(text.to_string())
    }
}

pub struct RouteOrchestrator<'a> {
    addresses: &'a AddressIndex,
    resolver: NodeResolver<'a>,
    transformer: &'a CrsTransformer,
    strategy: SelectionStrategy,
    directed: bool,
}

impl<'a> RouteOrchestrator<'a> {
    pub fn new(
        addresses: &'a AddressIndex,
        transformer: &'a CrsTransformer,
        strategy: SelectionStrategy,
    ) -> Self {
        Self {
            addresses,
            resolver: NodeResolver::new(transformer),
            transformer,
            strategy,
            directed: true,
        }
    }

    /// Runs the whole request on one session.
    ///
    /// # Errors
    ///
    /// Storage failures and invalid coordinates only; every "nothing found"
    /// case is an `Ok` outcome.
    pub fn route<S: StoreSession>(
        &self,
        session: &S,
        start: &RouteQuery,
        end: &RouteQuery,
    ) -> Result<RouteOutcome, Error> {
        let Some(start_point) = self.locate(session, start)? else {
            return Ok(RouteOutcome::NoStartMatch);
        };
        let Some(end_point) = self.locate(session, end)? else {
            return Ok(RouteOutcome::NoEndMatch);
        };

        let Some(start_node) = self
            .resolver
            .resolve(session, start_point.y(), start_point.x())?
        else {
            return Ok(RouteOutcome::NoNodeForStart);
        };
        let Some(end_node) = self
            .resolver
            .resolve(session, end_point.y(), end_point.x())?
        else {
            return Ok(RouteOutcome::NoNodeForEnd);
        };

        self.route_between(session, start_node.node_id, end_node.node_id)
    }

    /// Shortest path and assembly between two known nodes
    pub fn route_between<S: StoreSession>(
        &self,
        session: &S,
        start: NodeId,
        end: NodeId,
    ) -> Result<RouteOutcome, Error> {
        let rows = session.shortest_path(start, end, self.directed)?;
        if rows.is_empty() {
            debug!("No path from node {start} to node {end}");
            return Ok(RouteOutcome::NoPathFound);
        }
        Ok(RouteOutcome::Success(self.assemble(session, &rows)?))
    }

    fn locate<S: StoreSession>(
        &self,
        session: &S,
        query: &RouteQuery,
    ) -> Result<Option<Point<f64>>, Error> {
        match query {
            RouteQuery::Point { lat, lon } => Ok(Some(Point::new(*lon, *lat))),
            RouteQuery::Text(text) => {
                let candidates = self.addresses.search(session, text)?;
                let chosen = self.strategy.select(text, &candidates);
                if let Some(address) = chosen {
                    debug!(
                        "'{text}' matched {} addresses, using '{}'",
                        candidates.len(),
                        address.display_name
                    );
                }
                Ok(chosen.map(|address| address.geometry))
            }
        }
    }

    /// Joins rows to edge geometry and reprojects it for the client.
    fn assemble<S: StoreSession>(&self, session: &S, rows: &[PathRow]) -> Result<PathResult, Error> {
        let edge_ids: Vec<_> = rows.iter().filter_map(|row| row.edge).collect();
        let geometries = session.edge_geometries(&edge_ids)?;

        let steps = rows
            .iter()
            .map(|row| -> Result<PathStep, Error> {
                let geometry = match row.edge {
                    Some(edge) => match geometries.get(&edge) {
                        Some(line) => Some(self.transformer.line_to_geographic(line)?),
                        None => {
                            warn!("Edge {edge} on the path has no stored geometry");
                            None
                        }
                    },
                    None => None,
                };
                Ok(PathStep {
                    seq: row.seq,
                    path_seq: row.path_seq,
                    node: row.node,
                    edge: row.edge,
                    cost: row.cost,
                    geometry,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PathResult::new(steps))
    }
}
