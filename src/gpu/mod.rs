//! Hardware backend for the frontier kernels (wgpu)
//!
//! Based on Gunrock (Wang et al., ACM `ToPC` 2017): the expand and compact
//! kernels run as WGSL compute shaders over a partition uploaded to storage
//! buffers.
//!
//! # Architecture
//!
//! - `device`: adapter selection, capability checks and buffer creation
//! - `buffer`: partition topology in GPU storage buffers
//! - `bfs`: level-synchronous frontier BFS
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod bfs;
mod buffer;
mod device;

pub use bfs::{gpu_bfs, gpu_frontier_bfs};
pub use buffer::{GpuPartitionBuffers, REMOTE_TARGET};
pub use device::{GpuDevice, GpuDeviceError, FRONTIER_STORAGE_BUFFERS};
