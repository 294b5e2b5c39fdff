//! Frontier Bellman-Ford on the compute engine
//!
//! Each round gathers tentative distances along the out-edges of the
//! vertices that improved last round, then settles them:
//!
//! - `edge_filter` proposes `dist(u) + w(u, v)` for every improving edge and
//!   keeps the best proposal per destination in the accumulator
//! - `vertex_filter` lowers the distance and activates what improved
//!
//! Distances are non-negative, so their `f32` bit patterns order like the
//! values. The accumulator stores `u32::MAX - bits` and combines with `max`,
//! which keeps the smallest proposal while zero still means "no proposal".

use crate::device::Device;
use crate::engine::{EdgeFilter, Engine, VertexFilter};
use crate::frontier::VertexSubset;
use crate::storage::CsrGraph;
use crate::{EngineError, NodeId};
use anyhow::Result;
use tracing::{debug, info};

fn encode(distance: f32) -> u32 {
    u32::MAX - distance.to_bits()
}

fn decode(encoded: u32) -> f32 {
    f32::from_bits(u32::MAX - encoded)
}

struct Relax;

impl EdgeFilter<f32, f32, u32> for Relax {
    fn gather(&self, source: f32, weight: f32, destination: f32) -> Option<u32> {
        let candidate = source + weight;
        (candidate < destination).then(|| encode(candidate))
    }

    fn combine(&self, current: u32, contribution: u32) -> u32 {
        current.max(contribution)
    }
}

struct Settle;

impl VertexFilter<f32, u32> for Settle {
    fn apply(&self, value: f32, accumulated: u32) -> f32 {
        if accumulated == 0 {
            value
        } else {
            value.min(decode(accumulated))
        }
    }

    fn is_active(&self, old: f32, new: f32) -> bool {
        new < old
    }
}

/// Single-source shortest distances on the engine
///
/// Unreachable vertices keep `f32::INFINITY`. An output frontier larger than
/// an eighth of the vertices is produced dense instead of sparse.
///
/// # Errors
///
/// Returns [`EngineError::VertexOutOfRange`] for an unknown `source` and
/// [`EngineError::Precondition`] for negative or non-finite weights
///
/// # Example
///
/// ```
/// use trueno_frontier::{sssp, CsrGraph, Device, NodeId};
///
/// let graph = CsrGraph::from_edge_list(&[
///     (NodeId(0), NodeId(1), 4.0),
///     (NodeId(0), NodeId(2), 1.0),
///     (NodeId(2), NodeId(1), 2.0),
/// ])
/// .unwrap();
///
/// let distances = sssp(&Device::new().unwrap(), &graph, NodeId(0)).unwrap();
/// assert_eq!(distances, vec![0.0, 3.0, 1.0]);
/// ```
pub fn sssp(device: &Device, graph: &CsrGraph, source: NodeId) -> Result<Vec<f32>> {
    let n = graph.num_nodes();
    if source.0 as usize >= n {
        return Err(EngineError::vertex_out_of_range(source.0, n).into());
    }
    let (_, _, weights) = graph.csr_components();
    if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(EngineError::precondition(
            "sssp",
            format!("edge weight {weight} is negative or not finite"),
        )
        .into());
    }

    let mut engine = Engine::<f32, f32, u32>::new(device.clone(), graph)?;
    let origin = source.0;
    engine.init_vertices(|v| if v == origin { 0.0 } else { f32::INFINITY });
    engine.init_edges(|_, weight| weight);

    let dense_threshold = n / 8;
    let mut frontier = VertexSubset::from_vertices(n, &[source.0])?;
    let mut gathered = engine.sparse_frontier()?;
    let mut rounds = 0_usize;

    while !frontier.is_empty() {
        gathered.clear();
        engine.edge_filter(&mut gathered, &frontier, &Relax)?;

        let mut next = if gathered.len() > dense_threshold {
            engine.dense_frontier()?
        } else {
            engine.sparse_frontier()?
        };
        engine.vertex_filter(&mut next, &gathered, &Settle)?;
        frontier = next;

        rounds += 1;
        debug!(round = rounds, improved = frontier.len(), dense = frontier.is_dense(), "sssp round");
    }

    let distances = engine.collect_vertices();
    info!(source = source.0, rounds, "sssp finished");
    Ok(distances)
}
