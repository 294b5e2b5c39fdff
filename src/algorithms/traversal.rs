//! Sequential breadth-first search
//!
//! Reference for the frontier traversals: a single-threaded FIFO BFS over the
//! host CSR. Levels follow the frontier conventions (`UNREACHED` for vertices
//! the source cannot reach).

use super::bfs::UNREACHED;
use crate::storage::CsrGraph;
use crate::{EngineError, NodeId};
use anyhow::Result;
use std::collections::VecDeque;

/// Hop distance from `source` to every vertex
///
/// # Errors
///
/// Returns [`EngineError::VertexOutOfRange`] if `source` is not in the graph
///
/// # Example
///
/// ```
/// use trueno_frontier::{bfs_levels, CsrGraph, NodeId, UNREACHED};
///
/// let mut graph = CsrGraph::new();
/// graph.add_edge(NodeId(0), NodeId(1), 1.0).unwrap();
/// graph.add_edge(NodeId(1), NodeId(2), 1.0).unwrap();
/// graph.add_edge(NodeId(3), NodeId(0), 1.0).unwrap();
///
/// let levels = bfs_levels(&graph, NodeId(0)).unwrap();
/// assert_eq!(levels, vec![0, 1, 2, UNREACHED]);
/// ```
pub fn bfs_levels(graph: &CsrGraph, source: NodeId) -> Result<Vec<u32>> {
    let n = graph.num_nodes();
    if source.0 as usize >= n {
        return Err(EngineError::vertex_out_of_range(source.0, n).into());
    }

    let mut levels = vec![UNREACHED; n];
    let mut queue = VecDeque::new();

    levels[source.0 as usize] = 0;
    queue.push_back(source.0);

    while let Some(current) = queue.pop_front() {
        let next = levels[current as usize] + 1;
        for &neighbor in graph.outgoing_neighbors(NodeId(current))? {
            let slot = &mut levels[neighbor as usize];
            if *slot == UNREACHED {
                *slot = next;
                queue.push_back(neighbor);
            }
        }
    }

    Ok(levels)
}
