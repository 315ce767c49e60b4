//! Node identity from edge endpoints.
//!
//! Endpoints are visited in edge order, source before target. An endpoint
//! within `tolerance` of an existing node is merged into it, otherwise it
//! becomes a new node. Node ids are assigned from 1 in creation order, so
//! the same input always produces the same nodes.

use geo::{Coord, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::model::{Edge, Node};
use crate::{EdgeId, Error, NodeId};

/// Node position with its id for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct IndexedVertex {
    pub(crate) coords: [f64; 2], // [x, y]
    pub(crate) id: NodeId,
}

impl RTreeObject for IndexedVertex {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedVertex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

/// Edges with source/target assigned, plus the nodes they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyBuild {
    pub edges: Vec<Edge>,
    pub nodes: Vec<Node>,
}

/// Assigns `source` and `target` on every edge.
///
/// # Errors
///
/// Returns [`Error::IngestionFailure`] for a negative or non-finite
/// tolerance, or an edge without vertices or with non-finite endpoints.
/// Nothing is returned in that case; callers never see a partial topology.
pub fn build_topology(mut edges: Vec<Edge>, tolerance: f64) -> Result<TopologyBuild, Error> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(Error::ingestion(format!(
            "snap tolerance must be a non-negative number, got {tolerance}"
        )));
    }

    let mut tree: RTree<IndexedVertex> = RTree::new();
    let mut nodes = Vec::new();

    for edge in &mut edges {
        let (start, end) = edge
            .endpoints()
            .ok_or_else(|| Error::ingestion(format!("edge {} has no vertices", edge.id)))?;

        let source = snap_or_insert(&mut tree, &mut nodes, start, tolerance, edge.id)?;
        let target = snap_or_insert(&mut tree, &mut nodes, end, tolerance, edge.id)?;
        edge.source = Some(source);
        edge.target = Some(target);
    }

    log::debug!(
        "Topology built: {} nodes for {} edges (tolerance {tolerance})",
        nodes.len(),
        edges.len()
    );

    Ok(TopologyBuild { edges, nodes })
}

fn snap_or_insert(
    tree: &mut RTree<IndexedVertex>,
    nodes: &mut Vec<Node>,
    endpoint: Coord<f64>,
    tolerance: f64,
    edge: EdgeId,
) -> Result<NodeId, Error> {
    if !endpoint.x.is_finite() || !endpoint.y.is_finite() {
        return Err(Error::ingestion(format!(
            "edge {edge} has a non-finite endpoint"
        )));
    }

    let query = [endpoint.x, endpoint.y];
    if let Some(existing) = tree.nearest_neighbor(&query)
        && existing.distance_2(&query) <= tolerance * tolerance
    {
        return Ok(existing.id);
    }

    let id = nodes.len() as NodeId + 1;
    tree.insert(IndexedVertex { coords: query, id });
    nodes.push(Node {
        id,
        geometry: Point::from(endpoint),
    });
    Ok(id)
}
