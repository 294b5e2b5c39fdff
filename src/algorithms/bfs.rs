//! Level-synchronous frontier BFS
//!
//! Runs directly on the frontier kernels rather than through the engine:
//! one sparse queue holds the current level, one dense mask collects the
//! vertices discovered from it.
//!
//! ```text
//! while queue is not empty:
//!     expand   queue → mask   (unreached destinations get level + 1)
//!     clear    queue
//!     compact  mask  → queue  (mask bits cleared as consumed)
//!     level += 1
//! ```
//!
//! The level write in `expand` is unsynchronised: every worker that reaches
//! an unreached vertex in the same launch writes the same `level + 1`.

use crate::device::{Device, MirroredBuffer};
use crate::engine::{EdgeContext, IdentityMessage};
use crate::frontier::{self, VertexSubset};
use crate::partition::{partition_by_range, run_supersteps, LocalExchange, Partition, PartitionWorker};
use crate::storage::CsrGraph;
use crate::{EngineError, NodeId, VertexId};
use anyhow::Result;
use tracing::info;

/// Level of a vertex the source cannot reach
pub const UNREACHED: u32 = u32::MAX;

/// Levels and traversal statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfsResult {
    /// Hop distance per vertex (`UNREACHED` if unreachable)
    pub levels: Vec<u32>,
    /// Vertices with a finite level, source included
    pub visited_count: usize,
    /// Queue length at the start of every iteration
    pub frontier_sizes: Vec<usize>,
}

impl BfsResult {
    pub(crate) fn from_levels(levels: Vec<u32>, frontier_sizes: Vec<usize>) -> Self {
        let visited_count = levels.iter().filter(|&&level| level != UNREACHED).count();
        Self {
            levels,
            visited_count,
            frontier_sizes,
        }
    }

    /// Hop distance to `v`, `None` if unreachable or unknown
    #[must_use]
    pub fn distance(&self, v: VertexId) -> Option<u32> {
        self.levels
            .get(v as usize)
            .copied()
            .filter(|&level| level != UNREACHED)
    }

    /// True if the source reaches `v`
    #[must_use]
    pub fn is_reachable(&self, v: VertexId) -> bool {
        self.distance(v).is_some()
    }

    /// Largest finite level
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.levels
            .iter()
            .copied()
            .filter(|&level| level != UNREACHED)
            .max()
            .unwrap_or(0)
    }
}

/// BFS over one partition's local edges
///
/// Remote edges are not followed; see [`partitioned_bfs`] for sharded graphs.
///
/// # Errors
///
/// Returns [`EngineError::VertexOutOfRange`] for an unknown `source`, or a
/// kernel launch error
pub fn frontier_bfs(device: &Device, partition: &Partition, source: VertexId) -> Result<BfsResult> {
    let n = partition.vertex_count();
    if source as usize >= n {
        return Err(EngineError::vertex_out_of_range(source, n).into());
    }

    let mut levels = MirroredBuffer::<u32>::reserve(n)?;
    levels.all_to(UNREACHED);
    levels.device().store(source as usize, 0);

    let mut queue = VertexSubset::from_vertices(n, &[source])?;
    let mask = VertexSubset::dense(n)?;
    let mut frontier_sizes = Vec::new();
    let mut level = 0_u32;

    loop {
        let len = queue.queue_len_mut().persist();
        if len == 0 {
            break;
        }
        frontier_sizes.push(len);

        let next = level + 1;
        let device_levels = levels.device();
        frontier::expand(device, partition, &queue, &mask, |_, edge, _| {
            let dst = edge.local as usize;
            if device_levels.load(dst) == UNREACHED {
                device_levels.store(dst, next);
                true
            } else {
                false
            }
        })?;

        queue.clear();
        frontier::compact(device, &mask, &mut queue)?;
        level = next;
    }

    levels.persist();
    let result = BfsResult::from_levels(levels.host().to_vec(), frontier_sizes);
    info!(
        source,
        visited = result.visited_count,
        depth = result.depth(),
        "frontier BFS finished"
    );
    Ok(result)
}

/// BFS over a whole CSR graph loaded as a single partition
///
/// # Errors
///
/// Returns error if the graph cannot be loaded or `source` is unknown
///
/// # Example
///
/// ```
/// use trueno_frontier::{bfs, CsrGraph, Device, NodeId};
///
/// let graph = CsrGraph::from_edge_list(&[
///     (NodeId(0), NodeId(1), 1.0),
///     (NodeId(1), NodeId(2), 1.0),
/// ])
/// .unwrap();
///
/// let result = bfs(&Device::new().unwrap(), &graph, NodeId(0)).unwrap();
/// assert_eq!(result.levels, vec![0, 1, 2]);
/// assert_eq!(result.frontier_sizes, vec![1, 1, 1]);
/// ```
pub fn bfs(device: &Device, graph: &CsrGraph, source: NodeId) -> Result<BfsResult> {
    let partition = Partition::from_csr(graph)?;
    frontier_bfs(device, &partition, source.0)
}

/// Next level for unreached vertices
struct NextLevel;

impl EdgeContext<u32> for NextLevel {
    fn cond(&self, current: u32) -> bool {
        current == UNREACHED
    }

    fn update(&self, source: u32) -> u32 {
        source + 1
    }
}

/// BFS through the mailbox protocol over `partitions` range shards
///
/// Levels are returned in global vertex order. Each mailbox holds up to
/// `mailbox_capacity` messages per superstep.
///
/// # Errors
///
/// Returns error if `source` is unknown, `partitions` is zero, or a mailbox
/// overflows
pub fn partitioned_bfs(
    device: &Device,
    graph: &CsrGraph,
    partitions: usize,
    source: NodeId,
    mailbox_capacity: usize,
) -> Result<BfsResult> {
    let (placement, shards) = partition_by_range(graph, partitions)?;
    let (owner, local) = placement.locate(source.0)?;

    let mut workers = shards
        .into_iter()
        .map(|shard| PartitionWorker::<u32, u32>::new(shard, partitions, mailbox_capacity, UNREACHED))
        .collect::<Result<Vec<_>>>()?;

    let seed = &mut workers[owner as usize];
    seed.store(local, 0);
    seed.activate(local)?;

    let stats = run_supersteps(
        device,
        &mut workers,
        &NextLevel,
        &IdentityMessage,
        &mut LocalExchange,
        None,
    )?;

    let mut levels = vec![UNREACHED; placement.vertex_count()];
    for worker in &mut workers {
        let values = worker.collect_values();
        for (&global, level) in worker.partition().global_ids().iter().zip(values) {
            levels[global as usize] = level;
        }
    }

    let result = BfsResult::from_levels(levels, stats.frontier_sizes);
    info!(
        source = source.0,
        partitions,
        messages = stats.messages,
        visited = result.visited_count,
        "partitioned BFS finished"
    );
    Ok(result)
}
