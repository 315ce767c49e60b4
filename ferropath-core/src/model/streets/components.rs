//! Street network components - raw segments, edges and nodes

use geo::{Coord, Geometry, LineString, Point};
use serde_json::{Map, Value};

use crate::{EdgeId, NodeId};

/// Raw street record as read from the source dataset
#[derive(Debug, Clone)]
pub struct StreetSegment {
    /// Source-stable identifier, becomes the edge id
    pub external_id: EdgeId,
    /// Geometry as found in the source, possibly multi-part or invalid
    pub geometry: Geometry<f64>,
    /// Remaining source properties
    pub attributes: Map<String, Value>,
}

/// Street graph edge after ingestion.
///
/// `source` and `target` stay `None` until the topology build assigns them.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: Option<NodeId>,
    pub target: Option<NodeId>,
    /// Planar length in projected units
    pub cost: f64,
    /// Equal to `cost`: streets are traversable both ways
    pub reverse_cost: f64,
    /// Line in the projected reference system
    pub geometry: LineString<f64>,
}

impl Edge {
    pub fn new(id: EdgeId, geometry: LineString<f64>, cost: f64) -> Self {
        Self {
            id,
            source: None,
            target: None,
            cost,
            reverse_cost: cost,
            geometry,
        }
    }

    /// First and last vertex of the geometry
    pub fn endpoints(&self) -> Option<(Coord<f64>, Coord<f64>)> {
        let first = self.geometry.0.first()?;
        let last = self.geometry.0.last()?;
        Some((*first, *last))
    }

    pub fn is_linked(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }
}

/// Street graph node, created only by the topology build
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Point in the projected reference system
    pub geometry: Point<f64>,
}
