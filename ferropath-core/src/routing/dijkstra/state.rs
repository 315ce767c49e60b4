use std::cmp::Ordering;

use petgraph::graph::NodeIndex;

use crate::NodeId;

#[derive(Copy, Clone, Debug)]
pub(super) struct State {
    pub(super) cost: f64,
    pub(super) node: NodeIndex,
    /// Tie-breaker between equal costs
    pub(super) id: NodeId,
}

// Min-heap by cost, then by lowest node id
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    fn state(cost: f64, id: NodeId) -> State {
        State {
            cost,
            node: NodeIndex::new(id as usize),
            id,
        }
    }

    #[test]
    fn pops_cheapest_then_lowest_id() {
        let mut heap = BinaryHeap::from(vec![state(5.0, 1), state(2.0, 9), state(2.0, 3)]);
        assert_eq!(heap.pop().map(|s| s.id), Some(3));
        assert_eq!(heap.pop().map(|s| s.id), Some(9));
        assert_eq!(heap.pop().map(|s| s.id), Some(1));
    }
}
