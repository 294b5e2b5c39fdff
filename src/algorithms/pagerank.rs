//! `PageRank` by power iteration
//!
//! Based on Page et al. (1999) "The `PageRank` Citation Ranking: Bringing Order to the Web"
//!
//! - [`pagerank`]: sequential host reference
//! - [`engine_pagerank`]: the same iteration as engine kernels; dangling mass
//!   via `vertex_reduce`, rank scatter via `edge_filter`, update via
//!   `vertex_filter`

use crate::device::Device;
use crate::engine::{EdgeFilter, Engine, Reducible, VertexFilter};
use crate::frontier::VertexSubset;
use crate::storage::CsrGraph;
use anyhow::Result;
use tracing::{debug, info};

/// Damping factor for `PageRank` (Google standard)
pub const DAMPING_FACTOR: f32 = 0.85;

/// Compute `PageRank` scores for all nodes in the graph
///
/// Uses power iteration algorithm with damping factor 0.85 (Google standard).
///
/// # Arguments
///
/// * `graph` - CSR graph representation
/// * `max_iterations` - Maximum number of power iterations (typically 20-50)
/// * `tolerance` - Convergence threshold (default: 1e-6)
///
/// # Returns
///
/// Vector of `PageRank` scores (one per node, sum = 1.0)
///
/// # Algorithm
///
/// `PageRank` formula:
/// ```text
/// PR(u) = (1-d)/N + d * Σ(PR(v) / outdegree(v))
/// ```
///
/// Where:
/// - d = 0.85 (damping factor)
/// - N = total number of nodes
/// - v = nodes with edges to u
///
/// # Errors
///
/// This function does not return errors in the current implementation.
/// The Result type matches [`engine_pagerank`].
///
/// # Example
///
/// ```
/// use trueno_frontier::{pagerank, CsrGraph, NodeId};
///
/// let mut graph = CsrGraph::new();
/// graph.add_edge(NodeId(0), NodeId(1), 1.0).unwrap();
/// graph.add_edge(NodeId(1), NodeId(2), 1.0).unwrap();
/// graph.add_edge(NodeId(2), NodeId(0), 1.0).unwrap(); // Cycle
///
/// let scores = pagerank(&graph, 20, 1e-6).unwrap();
/// assert_eq!(scores.len(), 3);
/// assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5); // Sum = 1.0
/// ```
#[allow(clippy::cast_precision_loss)] // Graphs >16M nodes unlikely
#[allow(clippy::cast_possible_truncation)] // Graphs with >4B edges unlikely
pub fn pagerank(graph: &CsrGraph, max_iterations: usize, tolerance: f32) -> Result<Vec<f32>> {
    let n = graph.num_nodes();

    if n == 0 {
        return Ok(Vec::new());
    }

    let teleport = (1.0 - DAMPING_FACTOR) / n as f32;

    // Initialize: uniform distribution
    let mut ranks = vec![1.0 / n as f32; n];
    let mut new_ranks = vec![0.0; n];

    // Get CSR components for iteration
    let (row_offsets, col_indices, _edge_weights) = graph.csr_components();

    // Compute out-degrees for normalization
    let mut out_degrees = vec![0_u32; n];
    for node in 0..n {
        let start = row_offsets[node] as usize;
        let end = row_offsets[node + 1] as usize;
        out_degrees[node] = (end - start) as u32;
    }

    // Power iteration
    for iteration in 0..max_iterations {
        // Reset new ranks to teleport value
        new_ranks.fill(teleport);

        // Distribute rank from each node to its neighbors
        for node in 0..n {
            let start = row_offsets[node] as usize;
            let end = row_offsets[node + 1] as usize;

            if out_degrees[node] > 0 {
                let rank_contribution = DAMPING_FACTOR * ranks[node] / out_degrees[node] as f32;

                for &target in &col_indices[start..end] {
                    new_ranks[target as usize] += rank_contribution;
                }
            } else {
                // Dangling node: distribute rank equally to all nodes
                let dangling_contribution = DAMPING_FACTOR * ranks[node] / n as f32;
                for r in &mut new_ranks {
                    *r += dangling_contribution;
                }
            }
        }

        // Check convergence (L1 norm)
        let mut diff = 0.0;
        for i in 0..n {
            diff += (new_ranks[i] - ranks[i]).abs();
        }

        // Swap buffers
        std::mem::swap(&mut ranks, &mut new_ranks);

        if diff < tolerance {
            debug!(iterations = iteration + 1, diff, "reference PageRank converged");
            break;
        }
    }

    Ok(ranks)
}

/// Parameters of [`engine_pagerank`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    /// Probability of following an edge
    pub damping: f32,
    /// Upper bound on power iterations
    pub max_iterations: usize,
    /// A vertex stays active while its rank moves by more than this
    pub tolerance: f32,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: DAMPING_FACTOR,
            max_iterations: 20,
            tolerance: 1e-6,
        }
    }
}

/// Vertex state of [`engine_pagerank`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankValue {
    /// Current rank
    pub rank: f32,
    /// Number of out-edges
    pub out_degree: u32,
}

/// Sums the rank held by dangling vertices
impl Reducible<f32> for RankValue {
    fn reduce(&self, accumulator: &mut f32) {
        if self.out_degree == 0 {
            *accumulator += self.rank;
        }
    }
}

struct Scatter {
    damping: f32,
}

impl EdgeFilter<RankValue, (), f32> for Scatter {
    #[allow(clippy::cast_precision_loss)]
    fn gather(&self, source: RankValue, _edge: (), _destination: RankValue) -> Option<f32> {
        Some(self.damping * source.rank / source.out_degree as f32)
    }

    fn combine(&self, current: f32, contribution: f32) -> f32 {
        current + contribution
    }
}

struct Apply {
    base: f32,
    tolerance: f32,
}

impl VertexFilter<RankValue, f32> for Apply {
    fn apply(&self, value: RankValue, accumulated: f32) -> RankValue {
        RankValue {
            rank: self.base + accumulated,
            ..value
        }
    }

    fn is_active(&self, old: RankValue, new: RankValue) -> bool {
        (new.rank - old.rank).abs() > self.tolerance
    }
}

/// `PageRank` on the compute engine
///
/// Every iteration:
/// 1. `vertex_reduce` collects the rank of dangling vertices
/// 2. `edge_filter` scatters `d * rank / out_degree` from every vertex
/// 3. `vertex_filter` sets `rank = (1 - d) / N + d * dangling / N + gathered`
///
/// Stops early once no rank moved by more than `config.tolerance`.
///
/// # Errors
///
/// Returns error if the graph cannot be loaded on the engine
///
/// # Example
///
/// ```
/// use trueno_frontier::{engine_pagerank, CsrGraph, Device, NodeId, PageRankConfig};
///
/// let graph = CsrGraph::from_edge_list(&[
///     (NodeId(0), NodeId(1), 1.0),
///     (NodeId(1), NodeId(2), 1.0),
///     (NodeId(2), NodeId(0), 1.0),
/// ])
/// .unwrap();
///
/// let config = PageRankConfig::default();
/// let scores = engine_pagerank(&Device::new().unwrap(), &graph, &config).unwrap();
/// assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
/// ```
#[allow(clippy::cast_precision_loss)] // Graphs >16M nodes unlikely
#[allow(clippy::cast_possible_truncation)] // vertex ids and degrees fit in u32
pub fn engine_pagerank(
    device: &Device,
    graph: &CsrGraph,
    config: &PageRankConfig,
) -> Result<Vec<f32>> {
    let n = graph.num_nodes();
    if n == 0 {
        return Ok(Vec::new());
    }
    let nodes = n as f32;
    let damping = config.damping;

    let mut engine = Engine::<RankValue, (), f32>::new(device.clone(), graph)?;
    let degrees: Vec<u32> = (0..n)
        .map(|v| engine.partition().out_degree(v) as u32)
        .collect();
    engine.init_vertices(|v| RankValue {
        rank: 1.0 / nodes,
        out_degree: degrees[v as usize],
    });

    let sources = VertexSubset::all(n)?;
    let mut everyone = VertexSubset::all(n)?;
    everyone.to_sparse(device)?;
    let mut gathered = engine.sparse_frontier()?;
    let mut changed = engine.dense_frontier()?;

    let mut iterations = 0;
    while iterations < config.max_iterations {
        let dangling = engine.vertex_reduce();
        let base = (1.0 - damping) / nodes + damping * dangling / nodes;

        gathered.clear();
        engine.edge_filter(&mut gathered, &sources, &Scatter { damping })?;
        changed.clear();
        engine.vertex_filter(
            &mut changed,
            &everyone,
            &Apply {
                base,
                tolerance: config.tolerance,
            },
        )?;
        iterations += 1;

        let active = changed.len();
        debug!(iteration = iterations, dangling, active, "engine PageRank iteration");
        if active == 0 {
            break;
        }
    }

    let ranks: Vec<f32> = engine
        .collect_vertices()
        .into_iter()
        .map(|value| value.rank)
        .collect();
    info!(iterations, vertices = n, "engine PageRank finished");
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn test_pagerank_simple_chain() {
        // Linear chain: 0 → 1 → 2
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(1), NodeId(2), 1.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let scores = pagerank(&graph, 20, 1e-6).unwrap();

        // Verify properties
        assert_eq!(scores.len(), 3);

        // Sum should be 1.0
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "Sum = {sum}");

        // In a chain, last node gets highest score (sink node)
        assert!(
            scores[2] > scores[1],
            "Node 2 should have higher score than 1"
        );
        assert!(
            scores[1] > scores[0],
            "Node 1 should have higher score than 0"
        );
    }

    #[test]
    fn test_pagerank_cycle() {
        // Cycle: 0 → 1 → 2 → 0
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 1.0),
            (NodeId(2), NodeId(0), 1.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let scores = pagerank(&graph, 50, 1e-6).unwrap();

        // In a symmetric cycle, all nodes should have equal rank
        assert_eq!(scores.len(), 3);

        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        // All scores should be approximately 1/3
        for score in &scores {
            assert!((*score - 1.0 / 3.0).abs() < 0.01, "Score = {score}");
        }
    }

    #[test]
    fn test_pagerank_star() {
        // Star: 0 ← 1, 0 ← 2, 0 ← 3 (all point to center)
        let edges = vec![
            (NodeId(1), NodeId(0), 1.0),
            (NodeId(2), NodeId(0), 1.0),
            (NodeId(3), NodeId(0), 1.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let scores = pagerank(&graph, 20, 1e-6).unwrap();

        // Center node (0) should have highest score
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
        assert!(scores[0] > scores[3]);

        // Peripheral nodes should have similar scores
        assert!((scores[1] - scores[2]).abs() < 0.01);
        assert!((scores[2] - scores[3]).abs() < 0.01);
    }

    #[test]
    fn test_pagerank_empty_graph() {
        let graph = CsrGraph::new();
        let scores = pagerank(&graph, 20, 1e-6).unwrap();
        assert_eq!(scores.len(), 0);
    }

    #[test]
    fn test_pagerank_single_node() {
        let mut graph = CsrGraph::new();
        graph.add_edge(NodeId(0), NodeId(0), 1.0).unwrap(); // Self-loop

        let scores = pagerank(&graph, 20, 1e-6).unwrap();
        assert_eq!(scores.len(), 1);
        assert!((scores[0] - 1.0).abs() < 1e-5); // Single node gets all rank
    }

    #[test]
    fn test_pagerank_convergence() {
        // Large cycle to test convergence
        let mut edges = Vec::new();
        for i in 0..10 {
            edges.push((NodeId(i), NodeId((i + 1) % 10), 1.0));
        }
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let scores = pagerank(&graph, 100, 1e-6).unwrap();

        // Should converge to uniform distribution
        for score in &scores {
            assert!((*score - 0.1).abs() < 0.01, "Score = {score}");
        }
    }

    fn assert_close(engine: &[f32], reference: &[f32]) {
        assert_eq!(engine.len(), reference.len());
        for (v, (a, b)) in engine.iter().zip(reference).enumerate() {
            assert!((a - b).abs() < 1e-4, "vertex {v}: {a} vs {b}");
        }
    }

    #[test]
    fn test_engine_pagerank_matches_reference() {
        let device = Device::new().unwrap();
        let config = PageRankConfig {
            max_iterations: 100,
            tolerance: 1e-7,
            ..PageRankConfig::default()
        };

        let graphs = [
            // Chain with a dangling sink
            vec![(NodeId(0), NodeId(1), 1.0), (NodeId(1), NodeId(2), 1.0)],
            // Star into the center
            vec![
                (NodeId(1), NodeId(0), 1.0),
                (NodeId(2), NodeId(0), 1.0),
                (NodeId(3), NodeId(0), 1.0),
            ],
            // Cycle with a chord
            vec![
                (NodeId(0), NodeId(1), 1.0),
                (NodeId(1), NodeId(2), 1.0),
                (NodeId(2), NodeId(0), 1.0),
                (NodeId(0), NodeId(2), 1.0),
            ],
        ];
        for edges in graphs {
            let graph = CsrGraph::from_edge_list(&edges).unwrap();
            let engine = engine_pagerank(&device, &graph, &config).unwrap();
            let reference = pagerank(&graph, 100, 1e-9).unwrap();
            assert_close(&engine, &reference);

            let sum: f32 = engine.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "Sum = {sum}");
        }
    }

    #[test]
    fn test_engine_pagerank_empty_graph() {
        let device = Device::new().unwrap();
        let scores = engine_pagerank(&device, &CsrGraph::new(), &PageRankConfig::default()).unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn test_engine_pagerank_single_iteration() {
        // One step from uniform on a 2-cycle stays uniform
        let graph = CsrGraph::from_edge_list(&[
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(0), 1.0),
        ])
        .unwrap();
        let config = PageRankConfig {
            max_iterations: 1,
            ..PageRankConfig::default()
        };
        let scores = engine_pagerank(&Device::new().unwrap(), &graph, &config).unwrap();
        assert_close(&scores, &[0.5, 0.5]);
    }

    #[test]
    fn test_dangling_reduce() {
        let mut total = 0.0;
        RankValue {
            rank: 0.25,
            out_degree: 0,
        }
        .reduce(&mut total);
        RankValue {
            rank: 0.5,
            out_degree: 3,
        }
        .reduce(&mut total);
        assert_eq!(total, 0.25);
    }
}
