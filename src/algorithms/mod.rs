//! Graph algorithms built on the frontier engine
//!
//! - `bfs`: level-synchronous BFS on the frontier kernels, single and partitioned
//! - `sssp`: frontier Bellman-Ford on the compute engine
//! - `pagerank`: power iteration, host reference and engine variant
//! - `traversal`, `shortest_path`: sequential references used to verify the above

pub mod bfs;
pub mod pagerank;
pub mod shortest_path;
pub mod sssp;
pub mod traversal;

pub use bfs::{bfs, frontier_bfs, partitioned_bfs, BfsResult, UNREACHED};
pub use pagerank::{engine_pagerank, pagerank, PageRankConfig, RankValue, DAMPING_FACTOR};
pub use shortest_path::dijkstra;
pub use sssp::sssp;
pub use traversal::bfs_levels;
