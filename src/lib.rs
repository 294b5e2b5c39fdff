//! trueno-frontier: vertex-centric frontier engine for graph processing
//!
//! # Overview
//!
//! trueno-frontier runs graph algorithms as sequences of bulk-synchronous
//! kernel launches over a set of active vertices, the frontier. Kernels
//! execute on an SPMD device (a rayon pool standing in for an accelerator,
//! or wgpu hardware with the `gpu` feature).
//!
//! # Quick Start
//!
//! ```
//! use trueno_frontier::{bfs, CsrGraph, Device, NodeId};
//!
//! let graph = CsrGraph::from_edge_list(&[
//!     (NodeId(0), NodeId(1), 1.0),
//!     (NodeId(0), NodeId(2), 1.0),
//!     (NodeId(1), NodeId(3), 1.0),
//!     (NodeId(2), NodeId(3), 1.0),
//!     (NodeId(3), NodeId(4), 1.0),
//! ])
//! .unwrap();
//!
//! let device = Device::new().unwrap();
//! let result = bfs(&device, &graph, NodeId(0)).unwrap();
//! assert_eq!(result.levels, vec![0, 1, 1, 2, 3]);
//! assert_eq!(result.frontier_sizes, vec![1, 2, 1, 1]);
//! ```
//!
//! # Architecture
//!
//! - **Device**: launch geometry, mirrored host/device buffers, counters
//! - **Frontier**: dense flags or sparse queue, `compact` and `expand` kernels
//! - **Engine**: `edge_filter`, `vertex_filter`, `vertex_map`, `edge_map`, `vertex_reduce`
//! - **Partition**: sharded graphs exchanging messages through mailboxes
//! - **Algorithms**: BFS, SSSP, `PageRank` plus sequential references
//! - **Storage**: CSR graphs, Parquet-backed partitions (`storage` feature)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod device;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod partition;
pub mod storage;

// Hardware backend (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

/// Vertex identifier local to a partition
pub type VertexId = u32;

/// Partition identifier
pub type PartitionId = u32;

// Re-export core types
pub use algorithms::{
    bfs, bfs_levels, dijkstra, engine_pagerank, frontier_bfs, pagerank, partitioned_bfs, sssp,
    BfsResult, PageRankConfig, RankValue, DAMPING_FACTOR, UNREACHED,
};
pub use device::{
    kernel_config, Device, DeviceConfig, DeviceCounter, DeviceMemory, DeviceValue, LaunchConfig,
    LaunchLimits, MirroredBuffer,
};
pub use engine::{
    EdgeContext, EdgeFilter, Engine, Functor, IdentityMessage, MessageContext, Reducible,
    VertexFilter,
};
pub use error::EngineError;
pub use frontier::{Representation, VertexSubset};
pub use partition::{
    partition_by_range, run_supersteps, Edge, Exchange, LocalExchange, MessageBox, Partition,
    PartitionWorker, RangePlacement, SuperstepStats, VertexMessage,
};
pub use storage::{CsrGraph, NodeId};

#[cfg(feature = "gpu")]
pub use gpu::{gpu_bfs, gpu_frontier_bfs, GpuDevice, GpuPartitionBuffers};

// Error type
pub use anyhow::{Error, Result};
