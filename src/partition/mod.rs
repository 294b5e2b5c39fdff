//! Graph partitions and the cross-partition mailbox protocol
//!
//! A [`Partition`] is one shard of a graph: CSR offsets over its local
//! vertices plus edges that name a destination partition and a vertex id
//! local to that partition. Updates along remote edges travel as
//! [`VertexMessage`]s through per-destination [`MessageBox`]es.
//!
//! # Superstep
//!
//! ```text
//! expand ──► exchange ──► scatter ──► compact
//! (local updates +   (external:   (apply inbox   (workset →
//!  outbox appends)    outbox →     messages)      next queue)
//!                     inbox)
//! ```

mod exchange;
mod mailbox;
mod superstep;

pub use exchange::{run_supersteps, Exchange, LocalExchange, SuperstepStats};
pub use mailbox::{MessageBox, VertexMessage};
pub use superstep::PartitionWorker;

use crate::device::MirroredBuffer;
use crate::storage::CsrGraph;
use crate::{EngineError, NodeId, PartitionId, VertexId};
use anyhow::Result;
use std::ops::Range;

/// Outgoing edge as stored in a partition
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Edge {
    /// Partition owning the destination vertex
    pub partition: PartitionId,
    /// Destination vertex id, local to `partition`
    pub local: VertexId,
}

/// Local shard of a graph
#[derive(Debug)]
pub struct Partition {
    id: PartitionId,
    vertex_count: usize,
    offsets: MirroredBuffer<u32>,
    edges: MirroredBuffer<Edge>,
    weights: MirroredBuffer<f32>,
    global_ids: Vec<VertexId>,
}

impl Partition {
    /// Build a partition from host arrays and cache it on the device
    ///
    /// `weights` may be empty (all edges weigh 1.0).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTopology`] if:
    /// - `offsets` is not `vertex_count + 1` long, does not start at 0, or decreases
    /// - the last offset differs from the edge count
    /// - `weights` or `global_ids` have the wrong length
    /// - a local edge points outside the partition
    pub fn new(
        id: PartitionId,
        offsets: Vec<u32>,
        edges: Vec<Edge>,
        weights: Vec<f32>,
        global_ids: Vec<VertexId>,
    ) -> Result<Self> {
        let vertex_count = global_ids.len();
        validate_topology(id, vertex_count, &offsets, &edges)?;

        let weights = if weights.is_empty() {
            vec![1.0; edges.len()]
        } else {
            weights
        };
        if weights.len() != edges.len() {
            return Err(EngineError::InvalidTopology(format!(
                "{} weights for {} edges",
                weights.len(),
                edges.len()
            ))
            .into());
        }

        Ok(Self {
            id,
            vertex_count,
            offsets: MirroredBuffer::from_slice(&offsets)?,
            edges: MirroredBuffer::from_slice(&edges)?,
            weights: MirroredBuffer::from_slice(&weights)?,
            global_ids,
        })
    }

    /// Whole graph as partition 0 (every edge local)
    ///
    /// # Errors
    ///
    /// Returns error if the graph is too large for `u32` vertex ids
    pub fn from_csr(graph: &CsrGraph) -> Result<Self> {
        let (row_offsets, col_indices, edge_weights) = graph.csr_components();
        let global_ids = (0..graph.num_nodes())
            .map(|v| to_vertex_id(v, "from_csr"))
            .collect::<Result<Vec<_>>>()?;
        let edges = col_indices
            .iter()
            .map(|&local| Edge {
                partition: 0,
                local,
            })
            .collect();

        Self::new(
            0,
            row_offsets.to_vec(),
            edges,
            edge_weights.to_vec(),
            global_ids,
        )
    }

    /// Partition identifier
    #[must_use]
    pub const fn id(&self) -> PartitionId {
        self.id
    }

    /// Number of local vertices
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of outgoing edges (local and remote)
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.capacity()
    }

    /// Edges whose destination lives in another partition
    #[must_use]
    pub fn remote_edge_count(&self) -> usize {
        self.edges
            .host()
            .iter()
            .filter(|edge| edge.partition != self.id)
            .count()
    }

    /// CSR row pointers
    #[must_use]
    pub const fn offsets(&self) -> &MirroredBuffer<u32> {
        &self.offsets
    }

    /// Edge array, grouped by source
    #[must_use]
    pub const fn edges(&self) -> &MirroredBuffer<Edge> {
        &self.edges
    }

    /// Edge weights, parallel to [`edges`](Self::edges)
    #[must_use]
    pub const fn weights(&self) -> &MirroredBuffer<f32> {
        &self.weights
    }

    /// Global id of every local vertex
    #[must_use]
    pub fn global_ids(&self) -> &[VertexId] {
        &self.global_ids
    }

    /// Out-degree of local vertex `v`, read from the host copy
    #[must_use]
    pub fn out_degree(&self, v: usize) -> usize {
        (self.offsets.get(v + 1) - self.offsets.get(v)) as usize
    }

    /// Edge index range of local vertex `v`, read from device memory
    #[inline]
    #[must_use]
    pub fn edge_range(&self, v: usize) -> Range<usize> {
        let offsets = self.offsets.device();
        offsets.load(v) as usize..offsets.load(v + 1) as usize
    }

    /// True if `edge` stays inside this partition
    #[inline]
    #[must_use]
    pub const fn is_local(&self, edge: &Edge) -> bool {
        edge.partition == self.id
    }
}

fn validate_topology(
    id: PartitionId,
    vertex_count: usize,
    offsets: &[u32],
    edges: &[Edge],
) -> Result<()> {
    let invalid = |reason: String| -> anyhow::Error { EngineError::InvalidTopology(reason).into() };

    if offsets.len() != vertex_count + 1 {
        return Err(invalid(format!(
            "{} offsets for {vertex_count} vertices",
            offsets.len()
        )));
    }
    if offsets[0] != 0 {
        return Err(invalid(format!("first offset is {}", offsets[0])));
    }
    if let Some(v) = offsets.windows(2).position(|w| w[0] > w[1]) {
        return Err(invalid(format!("offsets decrease at vertex {v}")));
    }
    if offsets[vertex_count] as usize != edges.len() {
        return Err(invalid(format!(
            "last offset {} but {} edges",
            offsets[vertex_count],
            edges.len()
        )));
    }
    if let Some(edge) = edges
        .iter()
        .find(|edge| edge.partition == id && edge.local as usize >= vertex_count)
    {
        return Err(invalid(format!(
            "local edge to vertex {} outside {vertex_count} vertices",
            edge.local
        )));
    }
    Ok(())
}

/// Contiguous range placement of global vertices onto partitions
///
/// Partition `p` owns global ids `p * chunk .. (p + 1) * chunk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlacement {
    vertex_count: usize,
    partitions: usize,
    chunk: usize,
}

impl RangePlacement {
    /// Split `vertex_count` vertices over `partitions` partitions
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Precondition`] if `partitions` is zero
    pub fn new(vertex_count: usize, partitions: usize) -> Result<Self> {
        if partitions == 0 {
            return Err(EngineError::precondition("RangePlacement::new", "zero partitions").into());
        }
        Ok(Self {
            vertex_count,
            partitions,
            chunk: vertex_count.div_ceil(partitions).max(1),
        })
    }

    /// Number of partitions
    #[must_use]
    pub const fn num_partitions(&self) -> usize {
        self.partitions
    }

    /// Total vertices across all partitions
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Global id range owned by `partition`
    #[must_use]
    pub fn range(&self, partition: PartitionId) -> Range<usize> {
        let start = (partition as usize * self.chunk).min(self.vertex_count);
        let end = (start + self.chunk).min(self.vertex_count);
        start..end
    }

    /// `(partition, local id)` of a global vertex
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VertexOutOfRange`] for ids `>= vertex_count`
    #[allow(clippy::cast_possible_truncation)] // chunk <= vertex_count <= u32::MAX
    pub fn locate(&self, global: VertexId) -> Result<(PartitionId, VertexId)> {
        let g = global as usize;
        if g >= self.vertex_count {
            return Err(EngineError::vertex_out_of_range(global, self.vertex_count).into());
        }
        Ok(((g / self.chunk) as PartitionId, (g % self.chunk) as VertexId))
    }

    /// Global id of a local vertex
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn global(&self, partition: PartitionId, local: VertexId) -> VertexId {
        (partition as usize * self.chunk + local as usize) as VertexId
    }
}

/// Split a graph into `partitions` contiguous shards
///
/// # Errors
///
/// Returns error if `partitions` is zero or a shard fails validation
pub fn partition_by_range(
    graph: &CsrGraph,
    partitions: usize,
) -> Result<(RangePlacement, Vec<Partition>)> {
    let placement = RangePlacement::new(graph.num_nodes(), partitions)?;

    let shards = (0..partitions)
        .map(|p| {
            let id = to_vertex_id(p, "partition_by_range")?;
            let range = placement.range(id);

            let mut offsets = Vec::with_capacity(range.len() + 1);
            let mut edges = Vec::new();
            let mut weights = Vec::new();
            let mut global_ids = Vec::with_capacity(range.len());
            offsets.push(0);

            for global in range {
                let global = to_vertex_id(global, "partition_by_range")?;
                let (targets, target_weights) = graph.adjacency(NodeId(global));
                for (&target, &weight) in targets.iter().zip(target_weights) {
                    let (partition, local) = placement.locate(target)?;
                    edges.push(Edge { partition, local });
                    weights.push(weight);
                }
                offsets.push(to_vertex_id(edges.len(), "partition_by_range")?);
                global_ids.push(global);
            }

            Partition::new(id, offsets, edges, weights, global_ids)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((placement, shards))
}

fn to_vertex_id(value: usize, operation: &'static str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| EngineError::precondition(operation, format!("{value} exceeds u32")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> CsrGraph {
        CsrGraph::from_edge_list(&[
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(0), NodeId(2), 1.0),
            (NodeId(1), NodeId(3), 1.0),
            (NodeId(2), NodeId(3), 1.0),
            (NodeId(3), NodeId(4), 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_csr_is_all_local() {
        let partition = Partition::from_csr(&diamond()).unwrap();
        assert_eq!(partition.id(), 0);
        assert_eq!(partition.vertex_count(), 5);
        assert_eq!(partition.edge_count(), 5);
        assert_eq!(partition.remote_edge_count(), 0);
        assert_eq!(partition.edge_range(0), 0..2);
        assert_eq!(partition.out_degree(4), 0);
    }

    #[test]
    fn test_invalid_topology_rejected() {
        let edge = Edge {
            partition: 0,
            local: 1,
        };
        // Decreasing offsets
        assert!(Partition::new(0, vec![0, 1, 0], vec![edge], vec![], vec![0, 1]).is_err());
        // Last offset != edge count
        assert!(Partition::new(0, vec![0, 0, 0], vec![edge], vec![], vec![0, 1]).is_err());
        // Local edge out of range
        let bad = Edge {
            partition: 0,
            local: 9,
        };
        assert!(Partition::new(0, vec![0, 1, 1], vec![bad], vec![], vec![0, 1]).is_err());
        // Remote edge ids are not checked locally
        let remote = Edge {
            partition: 3,
            local: 9,
        };
        assert!(Partition::new(0, vec![0, 1, 1], vec![remote], vec![], vec![0, 1]).is_ok());
    }

    #[test]
    fn test_range_placement() {
        let placement = RangePlacement::new(5, 2).unwrap();
        assert_eq!(placement.range(0), 0..3);
        assert_eq!(placement.range(1), 3..5);
        assert_eq!(placement.locate(4).unwrap(), (1, 1));
        assert_eq!(placement.global(1, 1), 4);
        assert!(placement.locate(5).is_err());
        assert!(RangePlacement::new(5, 0).is_err());
    }

    #[test]
    fn test_partition_by_range_splits_edges() {
        let (placement, shards) = partition_by_range(&diamond(), 2).unwrap();
        assert_eq!(placement.num_partitions(), 2);
        assert_eq!(shards.len(), 2);

        // Partition 0 owns 0, 1, 2; edges 1→3 and 2→3 go remote
        assert_eq!(shards[0].global_ids(), &[0, 1, 2]);
        assert_eq!(shards[0].remote_edge_count(), 2);
        assert_eq!(
            shards[0].edges().host()[2],
            Edge {
                partition: 1,
                local: 0
            }
        );

        // Partition 1 owns 3, 4; edge 3→4 stays local
        assert_eq!(shards[1].global_ids(), &[3, 4]);
        assert_eq!(shards[1].remote_edge_count(), 0);
        assert_eq!(shards[1].edge_count(), 1);
    }

    #[test]
    fn test_more_partitions_than_vertices() {
        let graph = CsrGraph::from_edge_list(&[(NodeId(0), NodeId(1), 1.0)]).unwrap();
        let (_, shards) = partition_by_range(&graph, 4).unwrap();
        let sizes: Vec<_> = shards.iter().map(Partition::vertex_count).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }
}
