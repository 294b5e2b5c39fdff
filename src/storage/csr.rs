//! CSR (Compressed Sparse Row) graph representation
//!
//! Host-side ingestion format. The engine copies it into mirrored buffers once
//! at load time.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! CSR:
//!   row_offsets: [0, 2, 3, 3]  // Node 0: edges [0..2), Node 1: [2..3), Node 2: [3..3)
//!   col_indices: [1, 2, 2]      // Edge 0 → node 1, edge 1 → node 2, edge 2 → node 2
//!   edge_weights: [1.0, 1.0, 1.0]
//! ```

use anyhow::{anyhow, Result};

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Forward CSR graph with per-edge weights
///
/// # Example
///
/// ```
/// use trueno_frontier::{CsrGraph, NodeId};
///
/// let mut graph = CsrGraph::new();
/// graph.add_edge(NodeId(0), NodeId(1), 1.0).unwrap();
/// graph.add_edge(NodeId(0), NodeId(2), 1.0).unwrap();
///
/// let neighbors = graph.outgoing_neighbors(NodeId(0)).unwrap();
/// assert_eq!(neighbors, &[1, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsrGraph {
    /// node i's edges are `row_offsets[i]..row_offsets[i + 1]`
    /// Length: `num_nodes` + 1
    row_offsets: Vec<u32>,

    /// Edge targets, grouped by source
    col_indices: Vec<u32>,

    /// Edge weights, parallel to `col_indices`
    edge_weights: Vec<f32>,
}

impl CsrGraph {
    /// Create new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            row_offsets: vec![0],
            col_indices: Vec::new(),
            edge_weights: Vec::new(),
        }
    }

    /// Create graph from edge list, sized to the largest node id seen
    ///
    /// Edges keep their input order within each source.
    ///
    /// # Errors
    ///
    /// Returns error if the edge count does not fit in `u32`
    pub fn from_edge_list(edges: &[(NodeId, NodeId, f32)]) -> Result<Self> {
        let num_nodes = edges
            .iter()
            .map(|(src, dst, _)| src.0.max(dst.0) as usize + 1)
            .max()
            .unwrap_or(0);
        Self::with_vertex_count(num_nodes, edges)
    }

    /// Create graph with exactly `num_nodes` nodes (trailing nodes may be isolated)
    ///
    /// # Errors
    ///
    /// Returns error if an edge references a node `>= num_nodes` or the edge
    /// count does not fit in `u32`
    pub fn with_vertex_count(num_nodes: usize, edges: &[(NodeId, NodeId, f32)]) -> Result<Self> {
        if u32::try_from(edges.len()).is_err() {
            return Err(anyhow!("{} edges exceed the u32 edge id space", edges.len()));
        }
        if let Some((src, dst, _)) = edges
            .iter()
            .find(|(src, dst, _)| src.0 as usize >= num_nodes || dst.0 as usize >= num_nodes)
        {
            return Err(anyhow!(
                "Edge {} → {} out of bounds for {num_nodes} nodes",
                src.0,
                dst.0
            ));
        }

        // Counting sort by source: degrees, prefix sum, then placement
        let mut row_offsets = vec![0_u32; num_nodes + 1];
        for (src, _, _) in edges {
            row_offsets[src.0 as usize + 1] += 1;
        }
        for i in 0..num_nodes {
            row_offsets[i + 1] += row_offsets[i];
        }

        let mut cursor = row_offsets.clone();
        let mut col_indices = vec![0_u32; edges.len()];
        let mut edge_weights = vec![0.0_f32; edges.len()];
        for (src, dst, weight) in edges {
            let slot = &mut cursor[src.0 as usize];
            col_indices[*slot as usize] = dst.0;
            edge_weights[*slot as usize] = *weight;
            *slot += 1;
        }

        Ok(Self {
            row_offsets,
            col_indices,
            edge_weights,
        })
    }

    /// Add edge to graph (dynamic insertion)
    ///
    /// Note: For large graphs, use `from_edge_list` for better performance.
    ///
    /// # Errors
    ///
    /// Returns error if the graph already holds `u32::MAX` edges
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, weight: f32) -> Result<()> {
        if self.col_indices.len() >= u32::MAX as usize {
            return Err(anyhow!("Edge id space exhausted"));
        }

        let max_node = src.0.max(dst.0) as usize;
        if max_node >= self.num_nodes() {
            let last = *self.row_offsets.last().unwrap_or(&0);
            self.row_offsets.resize(max_node + 2, last);
        }

        let src_idx = src.0 as usize;
        let end = self.row_offsets[src_idx + 1] as usize;
        self.col_indices.insert(end, dst.0);
        self.edge_weights.insert(end, weight);

        for offset in &mut self.row_offsets[src_idx + 1..] {
            *offset += 1;
        }

        Ok(())
    }

    /// Get outgoing neighbors of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn outgoing_neighbors(&self, node: NodeId) -> Result<&[u32]> {
        let (start, end) = self.edge_range(node)?;
        Ok(&self.col_indices[start..end])
    }

    /// Outgoing targets and their weights (empty for unknown nodes)
    #[must_use]
    pub fn adjacency(&self, node: NodeId) -> (&[u32], &[f32]) {
        match self.edge_range(node) {
            Ok((start, end)) => (&self.col_indices[start..end], &self.edge_weights[start..end]),
            Err(_) => (&[], &[]),
        }
    }

    /// Out-degree of a node (0 for unknown nodes)
    #[must_use]
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.edge_range(node).map_or(0, |(start, end)| end - start)
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Get CSR components (`row_offsets`, `col_indices`, `edge_weights`)
    #[must_use]
    pub fn csr_components(&self) -> (&[u32], &[u32], &[f32]) {
        (&self.row_offsets, &self.col_indices, &self.edge_weights)
    }

    fn edge_range(&self, node: NodeId) -> Result<(usize, usize)> {
        let idx = node.0 as usize;
        if idx >= self.num_nodes() {
            return Err(anyhow!("Node ID {} out of bounds", node.0));
        }
        Ok((
            self.row_offsets[idx] as usize,
            self.row_offsets[idx + 1] as usize,
        ))
    }
}

impl Default for CsrGraph {
    fn default() -> Self {
        Self::new()
    }
}
