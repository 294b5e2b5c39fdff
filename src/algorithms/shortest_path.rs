//! Sequential Dijkstra
//!
//! Reference for the frontier relaxation in [`sssp`](super::sssp): a
//! binary-heap Dijkstra over the host CSR, returning one distance per vertex.

use crate::storage::CsrGraph;
use crate::NodeId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry, ordered so `BinaryHeap` pops the smallest cost first
#[derive(Clone, Copy)]
struct State {
    cost: f32,
    node: u32,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source shortest distances with non-negative edge weights
///
/// Unreachable vertices (and every vertex when `source` is out of range)
/// keep `f32::INFINITY`.
///
/// # Complexity
///
/// O((V + E) log V)
///
/// # Example
///
/// ```
/// use trueno_frontier::{dijkstra, CsrGraph, NodeId};
///
/// let edges = vec![
///     (NodeId(0), NodeId(1), 4.0),
///     (NodeId(0), NodeId(2), 1.0),
///     (NodeId(2), NodeId(1), 2.0),
/// ];
/// let graph = CsrGraph::from_edge_list(&edges).unwrap();
///
/// // 0→2→1 = 3.0, not 0→1 = 4.0
/// assert_eq!(dijkstra(&graph, NodeId(0)), vec![0.0, 3.0, 1.0]);
/// ```
#[must_use]
pub fn dijkstra(graph: &CsrGraph, source: NodeId) -> Vec<f32> {
    let n = graph.num_nodes();
    let mut distances = vec![f32::INFINITY; n];
    if source.0 as usize >= n {
        return distances;
    }

    let mut heap = BinaryHeap::new();
    distances[source.0 as usize] = 0.0;
    heap.push(State {
        cost: 0.0,
        node: source.0,
    });

    while let Some(State { cost, node }) = heap.pop() {
        // Stale entry
        if cost > distances[node as usize] {
            continue;
        }

        let (neighbors, weights) = graph.adjacency(NodeId(node));
        for (&neighbor, &weight) in neighbors.iter().zip(weights) {
            let next_cost = cost + weight;
            let slot = &mut distances[neighbor as usize];
            if next_cost < *slot {
                *slot = next_cost;
                heap.push(State {
                    cost: next_cost,
                    node: neighbor,
                });
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph = CsrGraph::new();
        assert!(dijkstra(&graph, NodeId(0)).is_empty());
    }

    #[test]
    fn test_chain() {
        // 0 --1.0--> 1 --2.0--> 2
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(1), NodeId(2), 2.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        assert_eq!(dijkstra(&graph, NodeId(0)), vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn test_shorter_path_via_intermediate() {
        // Direct: 0 --5.0--> 2
        // Via 1:  0 --1.0--> 1 --2.0--> 2 (total: 3.0)
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 2.0),
            (NodeId(0), NodeId(2), 5.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        assert_eq!(dijkstra(&graph, NodeId(0))[2], 3.0);
    }

    #[test]
    fn test_unreachable_node() {
        // 0 → 1, 2 → 3 (disconnected)
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(2), NodeId(3), 1.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let distances = dijkstra(&graph, NodeId(0));
        assert_eq!(&distances[..2], &[0.0, 1.0]);
        assert!(distances[2].is_infinite());
        assert!(distances[3].is_infinite());
    }

    #[test]
    fn test_cycle_in_graph() {
        // Cycle: 0 → 1 → 2 → 0, with 0 → 3
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 1.0),
            (NodeId(2), NodeId(0), 1.0),
            (NodeId(0), NodeId(3), 10.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        assert_eq!(dijkstra(&graph, NodeId(0)), vec![0.0, 1.0, 2.0, 10.0]);
    }

    #[test]
    fn test_source_out_of_bounds() {
        let graph = CsrGraph::from_edge_list(&[(NodeId(0), NodeId(1), 1.0)]).unwrap();
        assert!(dijkstra(&graph, NodeId(100)).iter().all(|d| d.is_infinite()));
    }

    #[test]
    fn test_zero_weight_edge() {
        let edges = vec![(NodeId(0), NodeId(1), 0.0), (NodeId(1), NodeId(2), 0.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        assert_eq!(dijkstra(&graph, NodeId(0))[2], 0.0);
    }
}
