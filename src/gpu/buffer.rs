//! Partition topology uploaded to GPU storage buffers
//!
//! Offsets are copied as-is. Edge targets are flattened to local vertex
//! ids; remote edges are written as [`REMOTE_TARGET`] and skipped by the
//! kernels.

use super::GpuDevice;
use crate::partition::Partition;
use anyhow::Result;

/// Target written for an edge that leaves the partition
pub const REMOTE_TARGET: u32 = u32::MAX;

/// GPU-resident offsets and local targets of one partition
#[derive(Debug)]
pub struct GpuPartitionBuffers {
    num_vertices: usize,
    num_edges: usize,

    /// Offsets into `targets` (size: vertices + 1)
    pub offsets: wgpu::Buffer,

    /// Local destination per edge (size: edges, at least one word)
    pub targets: wgpu::Buffer,
}

impl GpuPartitionBuffers {
    /// Upload a partition's host topology
    ///
    /// # Errors
    ///
    /// Returns error if a buffer exceeds the device limits
    pub fn from_partition(device: &GpuDevice, partition: &Partition) -> Result<Self> {
        let mut targets: Vec<u32> = partition
            .edges()
            .host()
            .iter()
            .map(|edge| {
                if partition.is_local(edge) {
                    edge.local
                } else {
                    REMOTE_TARGET
                }
            })
            .collect();
        // Zero-sized storage bindings are invalid
        if targets.is_empty() {
            targets.push(REMOTE_TARGET);
        }

        let offsets = device.upload(
            "partition offsets",
            bytemuck::cast_slice(partition.offsets().host()),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        let targets = device.upload(
            "partition targets",
            bytemuck::cast_slice(&targets),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;

        tracing::debug!(
            partition = partition.id(),
            vertices = partition.vertex_count(),
            edges = partition.edge_count(),
            "partition uploaded to GPU"
        );

        Ok(Self {
            num_vertices: partition.vertex_count(),
            num_edges: partition.edge_count(),
            offsets,
            targets,
        })
    }

    /// Vertices in the uploaded partition
    #[must_use]
    pub const fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Edges in the uploaded partition, remote ones included
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }
}
