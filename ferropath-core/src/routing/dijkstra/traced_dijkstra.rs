use std::collections::BinaryHeap;

use hashbrown::{HashMap, hash_map::Entry};
use petgraph::{graph::NodeIndex, visit::EdgeRef};

use super::state::State;
use crate::model::PathRow;
use crate::store::{Deadline, RoutingGraph};
use crate::{EdgeId, Error, NodeId};

/// Pops between two deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Edge used to reach a node, with the cost of traversing it
#[derive(Clone, Copy)]
struct Predecessor {
    node: NodeIndex,
    edge: EdgeId,
    cost: f64,
}

/// One-to-one Dijkstra returning `pgr_dijkstra`-style rows.
///
/// Rows are numbered from 1. Each row holds a node and the edge leaving it
/// with that edge's cost; the last row holds `end` with no edge and cost 0.
/// An unknown node, an unreachable `end` or `start == end` gives no rows.
///
/// With `directed` an edge costs `cost` along its line and `reverse_cost`
/// against it, otherwise the cheaper of the two both ways.
pub(crate) fn dijkstra_path(
    graph: &RoutingGraph,
    start: NodeId,
    end: NodeId,
    directed: bool,
    deadline: Deadline,
) -> Result<Vec<PathRow>, Error> {
    if start == end {
        return Ok(Vec::new());
    }
    let (Some(source), Some(target)) = (graph.node_index(start), graph.node_index(end)) else {
        return Ok(Vec::new());
    };

    let estimated_nodes = graph.node_count().min(4096);
    let mut distances: HashMap<NodeIndex, f64> = HashMap::with_capacity(estimated_nodes);
    let mut predecessors: HashMap<NodeIndex, Predecessor> =
        HashMap::with_capacity(estimated_nodes);
    let mut heap = BinaryHeap::with_capacity(estimated_nodes / 4);

    heap.push(State {
        cost: 0.0,
        node: source,
        id: start,
    });
    distances.insert(source, 0.0);

    let mut popped = 0usize;
    while let Some(State { cost, node, .. }) = heap.pop() {
        popped += 1;
        if popped % DEADLINE_CHECK_INTERVAL == 0 {
            deadline.check()?;
        }

        if node == target {
            break;
        }

        if let Some(&best) = distances.get(&node)
            && cost > best
        {
            continue;
        }

        for edge in graph.graph.edges(node) {
            let traversal = edge.weight();
            let step = if directed {
                traversal.directed_cost
            } else {
                traversal.undirected_cost
            };
            let next = edge.target();
            let next_cost = cost + step;

            let improved = match distances.entry(next) {
                Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    true
                }
                Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        true
                    } else {
                        false
                    }
                }
            };

            if improved {
                predecessors.insert(
                    next,
                    Predecessor {
                        node,
                        edge: traversal.edge,
                        cost: step,
                    },
                );
                heap.push(State {
                    cost: next_cost,
                    node: next,
                    id: graph.graph[next],
                });
            }
        }
    }

    if !predecessors.contains_key(&target) {
        return Ok(Vec::new());
    }

    // walk back from the end node
    let mut legs = Vec::new();
    let mut current = target;
    while current != source {
        let Some(previous) = predecessors.get(&current) else {
            return Ok(Vec::new());
        };
        legs.push(*previous);
        current = previous.node;
    }
    legs.reverse();

    let mut rows: Vec<PathRow> = legs
        .iter()
        .zip(1u32..)
        .map(|(leg, seq)| PathRow {
            seq,
            path_seq: seq,
            node: graph.graph[leg.node],
            edge: Some(leg.edge),
            cost: leg.cost,
        })
        .collect();
    let last = rows.len() as u32 + 1;
    rows.push(PathRow {
        seq: last,
        path_seq: last,
        node: end,
        edge: None,
        cost: 0.0,
    });

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use geo::{LineString, Point};

    use super::*;
    use crate::model::{Edge, Node};

    fn node(id: NodeId, x: f64, y: f64) -> Node {
        Node {
            id,
            geometry: Point::new(x, y),
        }
    }

    fn edge(id: EdgeId, source: NodeId, target: NodeId, cost: f64, reverse_cost: f64) -> Edge {
        let mut edge = Edge::new(id, LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]), cost);
        edge.source = Some(source);
        edge.target = Some(target);
        edge.reverse_cost = reverse_cost;
        edge
    }

    /// 1 -a- 2 -b- 3 plus a long direct edge 1-3 and a lone node 4
    fn graph() -> RoutingGraph {
        RoutingGraph::new(
            vec![
                node(1, 0.0, 0.0),
                node(2, 0.0, 100.0),
                node(3, 0.0, 200.0),
                node(4, 900.0, 900.0),
            ],
            &[
                edge(10, 1, 2, 100.0, 100.0),
                edge(11, 2, 3, 100.0, 100.0),
                edge(12, 1, 3, 250.0, 250.0),
            ],
        )
    }

    #[test]
    fn cheapest_path_rows() {
        let rows = dijkstra_path(&graph(), 1, 3, true, Deadline::none()).unwrap();
        assert_eq!(
            rows,
            vec![
                PathRow { seq: 1, path_seq: 1, node: 1, edge: Some(10), cost: 100.0 },
                PathRow { seq: 2, path_seq: 2, node: 2, edge: Some(11), cost: 100.0 },
                PathRow { seq: 3, path_seq: 3, node: 3, edge: None, cost: 0.0 },
            ]
        );
    }

    #[test]
    fn reverse_direction_uses_reverse_cost() {
        let graph = RoutingGraph::new(
            vec![node(1, 0.0, 0.0), node(2, 10.0, 0.0)],
            &[edge(1, 1, 2, 10.0, 30.0)],
        );
        let forward = dijkstra_path(&graph, 1, 2, true, Deadline::none()).unwrap();
        let backward = dijkstra_path(&graph, 2, 1, true, Deadline::none()).unwrap();
        let undirected = dijkstra_path(&graph, 2, 1, false, Deadline::none()).unwrap();

        assert_eq!(forward[0].cost, 10.0);
        assert_eq!(backward[0].cost, 30.0);
        assert_eq!(undirected[0].cost, 10.0);
    }

    #[test]
    fn unreachable_and_trivial_paths_are_empty() {
        let graph = graph();
        assert!(dijkstra_path(&graph, 1, 4, true, Deadline::none()).unwrap().is_empty());
        assert!(dijkstra_path(&graph, 2, 2, true, Deadline::none()).unwrap().is_empty());
        assert!(dijkstra_path(&graph, 1, 99, true, Deadline::none()).unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_times_out() {
        // a long chain so the search pops more than one check interval
        let count = (DEADLINE_CHECK_INTERVAL * 2) as NodeId;
        let nodes = (1..=count).map(|id| node(id, id as f64, 0.0)).collect();
        let edges: Vec<Edge> = (1..count).map(|id| edge(id, id, id + 1, 1.0, 1.0)).collect();
        let graph = RoutingGraph::new(nodes, &edges);

        let expired = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(matches!(
            dijkstra_path(&graph, 1, count, true, expired),
            Err(Error::CollaboratorTimeout)
        ));
        assert_eq!(
            dijkstra_path(&graph, 1, count, true, Deadline::none()).unwrap().len(),
            count as usize
        );
    }
}
