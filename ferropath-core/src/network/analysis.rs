//! Connectivity summary of a built network, in the spirit of
//! `pgr_analyzeGraph`.

use hashbrown::HashMap;
use itertools::Itertools;
use petgraph::unionfind::UnionFind;

use crate::NodeId;
use crate::model::Edge;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphAnalysis {
    pub nodes: usize,
    pub edges: usize,
    /// Nodes touched by exactly one edge end
    pub dead_ends: usize,
    /// Edges whose both ends are dead ends
    pub isolated_segments: usize,
    pub components: usize,
}

impl GraphAnalysis {
    /// Edges without source/target are ignored.
    pub fn from_edges(edges: &[Edge]) -> Self {
        let linked: Vec<(NodeId, NodeId)> = edges
            .iter()
            .filter_map(|edge| Some((edge.source?, edge.target?)))
            .collect();

        let mut degree: HashMap<NodeId, usize> = HashMap::new();
        for &(source, target) in &linked {
            *degree.entry(source).or_default() += 1;
            *degree.entry(target).or_default() += 1;
        }

        // dense indices for the union-find
        let index: HashMap<NodeId, usize> = degree
            .keys()
            .enumerate()
            .map(|(i, &node)| (node, i))
            .collect();
        let mut sets = UnionFind::<usize>::new(index.len());
        for &(source, target) in &linked {
            sets.union(index[&source], index[&target]);
        }
        let components = sets.into_labeling().into_iter().unique().count();

        let is_dead_end = |node: &NodeId| degree.get(node) == Some(&1);

        Self {
            nodes: degree.len(),
            edges: linked.len(),
            dead_ends: degree.values().filter(|&&d| d == 1).count(),
            isolated_segments: linked
                .iter()
                .filter(|(source, target)| is_dead_end(source) && is_dead_end(target))
                .count(),
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::LineString;

    use super::*;

    fn linked(id: i64, source: NodeId, target: NodeId) -> Edge {
        let mut edge = Edge::new(id, LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]), 1.0);
        edge.source = Some(source);
        edge.target = Some(target);
        edge
    }

    #[test]
    fn chain_and_loose_segment() {
        let edges = vec![linked(1, 1, 2), linked(2, 2, 3), linked(3, 4, 5)];
        let analysis = GraphAnalysis::from_edges(&edges);

        assert_eq!(
            analysis,
            GraphAnalysis {
                nodes: 5,
                edges: 3,
                dead_ends: 4,
                isolated_segments: 1,
                components: 2,
            }
        );
    }

    #[test]
    fn loop_has_no_dead_ends() {
        let edges = vec![linked(1, 1, 2), linked(2, 2, 3), linked(3, 3, 1)];
        let analysis = GraphAnalysis::from_edges(&edges);
        assert_eq!(analysis.dead_ends, 0);
        assert_eq!(analysis.components, 1);
    }

    #[test]
    fn unlinked_edges_are_skipped() {
        let edges = vec![Edge::new(1, LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]), 1.0)];
        assert_eq!(GraphAnalysis::from_edges(&edges), GraphAnalysis::default());
    }
}
