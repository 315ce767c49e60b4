use hashbrown::HashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use rstar::RTree;

use crate::model::{Edge, Node};
use crate::network::topology::IndexedVertex;
use crate::{EdgeId, NodeId};

/// One traversal direction of a stored edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Traversal {
    pub edge: EdgeId,
    /// Cost in a directed query: `cost` along the line, `reverse_cost` against it
    pub directed_cost: f64,
    /// Cost in an undirected query
    pub undirected_cost: f64,
}

/// In-memory view of the street and vertex relations used for
/// nearest-node and shortest-path queries
pub struct RoutingGraph {
    pub(crate) graph: DiGraph<NodeId, Traversal>,
    index: HashMap<NodeId, NodeIndex>,
    vertices: RTree<IndexedVertex>,
    nodes: HashMap<NodeId, Node>,
}

impl RoutingGraph {
    pub fn new(nodes: Vec<Node>, edges: &[Edge]) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len() * 2);
        let mut index = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            index.insert(node.id, graph.add_node(node.id));
        }

        for edge in edges {
            let (Some(source), Some(target)) = (edge.source, edge.target) else {
                continue;
            };
            let (Some(&from), Some(&to)) = (index.get(&source), index.get(&target)) else {
                log::warn!("Edge {} references an unknown node, skipped", edge.id);
                continue;
            };
            let undirected_cost = edge.cost.min(edge.reverse_cost);
            // negative cost means the direction does not exist
            if edge.cost >= 0.0 {
                graph.add_edge(
                    from,
                    to,
                    Traversal {
                        edge: edge.id,
                        directed_cost: edge.cost,
                        undirected_cost: undirected_cost.max(0.0),
                    },
                );
            }
            if edge.reverse_cost >= 0.0 {
                graph.add_edge(
                    to,
                    from,
                    Traversal {
                        edge: edge.id,
                        directed_cost: edge.reverse_cost,
                        undirected_cost: undirected_cost.max(0.0),
                    },
                );
            }
        }

        let vertices = RTree::bulk_load(
            nodes
                .iter()
                .map(|node| IndexedVertex {
                    coords: [node.geometry.x(), node.geometry.y()],
                    id: node.id,
                })
                .collect(),
        );
        let nodes = nodes.into_iter().map(|node| (node.id, node)).collect();

        Self {
            graph,
            index,
            vertices,
            nodes,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node_index(&self, id: NodeId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    /// Nearest node with its squared distance
    pub fn nearest(&self, x: f64, y: f64) -> Option<(&Node, f64)> {
        use rstar::PointDistance;

        let query = [x, y];
        let vertex = self.vertices.nearest_neighbor(&query)?;
        let node = self.nodes.get(&vertex.id)?;
        Some((node, vertex.distance_2(&query)))
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Point};

    use super::*;

    fn node(id: NodeId, x: f64, y: f64) -> Node {
        Node {
            id,
            geometry: Point::new(x, y),
        }
    }

    #[test]
    fn both_directions_are_added() {
        let mut edge = Edge::new(4, LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]), 10.0);
        edge.source = Some(1);
        edge.target = Some(2);
        let graph = RoutingGraph::new(vec![node(1, 0.0, 0.0), node(2, 10.0, 0.0)], &[edge]);

        assert_eq!(graph.graph.edge_count(), 2);
        assert_eq!(graph.node_count(), 2);
        let (nearest, distance_2) = graph.nearest(9.0, 1.0).unwrap();
        assert_eq!(nearest.id, 2);
        assert!((distance_2 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_graph_has_no_nearest() {
        let graph = RoutingGraph::new(Vec::new(), &[]);
        assert!(graph.nearest(0.0, 0.0).is_none());
    }
}
