//! Per-request path results. Built fresh for every query and never stored.

use geo::LineString;

use crate::{EdgeId, NodeId};

/// Row produced by the shortest-path primitive.
///
/// The last row of a path carries the end node and no edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRow {
    /// 1-based position in the result set
    pub seq: u32,
    /// 1-based position along the path
    pub path_seq: u32,
    pub node: NodeId,
    pub edge: Option<EdgeId>,
    /// Cost of leaving `node` through `edge`
    pub cost: f64,
}

/// Path row joined to its edge geometry
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub seq: u32,
    pub path_seq: u32,
    pub node: NodeId,
    pub edge: Option<EdgeId>,
    pub cost: f64,
    /// Edge geometry in the geographic reference system
    pub geometry: Option<LineString<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathResult {
    pub steps: Vec<PathStep>,
    pub total_cost: f64,
}

impl PathResult {
    pub fn new(steps: Vec<PathStep>) -> Self {
        let total_cost = steps.iter().map(|step| step.cost).sum();
        Self { steps, total_cost }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Traversed edges in path order
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.steps.iter().filter_map(|step| step.edge).collect()
    }

    /// Visited nodes in path order, end node included
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.steps.iter().map(|step| step.node).collect()
    }
}

/// Terminal state of a route request.
///
/// Everything except `Success` is an expected empty outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    NoStartMatch,
    NoEndMatch,
    NoNodeForStart,
    NoNodeForEnd,
    NoPathFound,
    Success(PathResult),
}

impl RouteOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RouteOutcome::NoStartMatch => "no_start_match",
            RouteOutcome::NoEndMatch => "no_end_match",
            RouteOutcome::NoNodeForStart => "no_node_for_start",
            RouteOutcome::NoNodeForEnd => "no_node_for_end",
            RouteOutcome::NoPathFound => "no_path_found",
            RouteOutcome::Success(_) => "ok",
        }
    }

    pub fn path(&self) -> Option<&PathResult> {
        match self {
            RouteOutcome::Success(path) => Some(path),
            _ => None,
        }
    }

    /// The path for `Success`, an empty one otherwise
    pub fn into_path(self) -> PathResult {
        match self {
            RouteOutcome::Success(path) => path,
            _ => PathResult::empty(),
        }
    }
}
