//! Frontier BFS on wgpu compute shaders
//!
//! Same level loop as [`frontier_bfs`](crate::frontier_bfs), with the
//! expand and compact kernels in WGSL. One command buffer per level runs
//! expand, resets the queue length, runs compact and copies the new length
//! back for the host to decide whether to continue.

use super::{GpuDevice, GpuPartitionBuffers};
use crate::algorithms::{BfsResult, UNREACHED};
use crate::partition::Partition;
use crate::storage::CsrGraph;
use crate::{EngineError, NodeId, VertexId};
use anyhow::{Context, Result};
use tracing::{debug, info};

const SHADER: &str = include_str!("shaders/frontier_bfs.wgsl");
const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS: u32 = 65_535;

/// Uniform parameters shared by both kernels
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BfsParams {
    num_nodes: u32,
    queue_len: u32,
    level: u32,
    _pad: u32,
}

struct Kernels {
    layout: wgpu::BindGroupLayout,
    expand: wgpu::ComputePipeline,
    compact: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl Kernels {
    fn compile(device: &GpuDevice) -> Self {
        let module = device
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("frontier BFS shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER.into()),
            });

        let layout = device
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frontier BFS bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(1, true),  // offsets
                    storage_entry(2, true),  // targets
                    storage_entry(3, false), // levels
                    storage_entry(4, false), // mask
                    storage_entry(5, false), // queue
                    storage_entry(6, false), // queue_len
                ],
            });

        let pipeline_layout = device
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("frontier BFS pipeline layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = |entry_point: &str| {
            device
                .device()
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(entry_point),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                })
        };

        Self {
            expand: pipeline("expand"),
            compact: pipeline("compact"),
            layout,
        }
    }
}

/// Map a staging buffer and copy its words to the host
async fn read_words(device: &GpuDevice, staging: &wgpu::Buffer) -> Result<Vec<u32>> {
    let slice = staging.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device.device().poll(wgpu::Maintain::Wait);
    rx.receive()
        .await
        .context("Failed to receive map result")?
        .context("Buffer mapping failed")?;

    let data = slice.get_mapped_range();
    let words: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();

    Ok(words)
}

fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    groups: u32,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("frontier BFS pass"),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(groups, 1, 1);
}

/// BFS over an uploaded partition's local edges
///
/// # Errors
///
/// Returns [`EngineError::VertexOutOfRange`] for an unknown `source`, or an
/// error if buffer creation or readback fails
///
/// # Example
///
/// ```no_run
/// use trueno_frontier::gpu::{gpu_frontier_bfs, GpuDevice, GpuPartitionBuffers};
/// use trueno_frontier::{CsrGraph, NodeId, Partition};
///
/// # async fn example() -> anyhow::Result<()> {
/// let device = GpuDevice::new().await?;
/// let graph = CsrGraph::from_edge_list(&[
///     (NodeId(0), NodeId(1), 1.0),
///     (NodeId(1), NodeId(2), 1.0),
/// ])?;
/// let partition = Partition::from_csr(&graph)?;
///
/// let buffers = GpuPartitionBuffers::from_partition(&device, &partition)?;
/// let result = gpu_frontier_bfs(&device, &buffers, 0).await?;
/// assert_eq!(result.levels, vec![0, 1, 2]);
/// # Ok(())
/// # }
/// ```
pub async fn gpu_frontier_bfs(
    device: &GpuDevice,
    buffers: &GpuPartitionBuffers,
    source: VertexId,
) -> Result<BfsResult> {
    let n = buffers.num_vertices();
    if source as usize >= n {
        return Err(EngineError::vertex_out_of_range(source, n).into());
    }
    let num_nodes = u32::try_from(n).context("partition too large for GPU BFS")?;
    let word = std::mem::size_of::<u32>() as u64;
    let groups = num_nodes.div_ceil(WORKGROUP_SIZE).clamp(1, MAX_WORKGROUPS);

    let kernels = Kernels::compile(device);

    let mut initial_levels = vec![UNREACHED; n];
    initial_levels[source as usize] = 0;
    let mut initial_queue = vec![0_u32; n];
    initial_queue[0] = source;

    let mut params = BfsParams {
        num_nodes,
        queue_len: 1,
        level: 0,
        _pad: 0,
    };
    let params_buffer = device.upload(
        "BFS params",
        bytemuck::bytes_of(&params),
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    )?;
    let levels = device.upload(
        "BFS levels",
        bytemuck::cast_slice(&initial_levels),
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
    )?;
    let mask = device.upload(
        "BFS mask",
        bytemuck::cast_slice(&vec![0_u32; n]),
        wgpu::BufferUsages::STORAGE,
    )?;
    let queue = device.upload(
        "BFS queue",
        bytemuck::cast_slice(&initial_queue),
        wgpu::BufferUsages::STORAGE,
    )?;
    let queue_len = device.upload(
        "BFS queue length",
        bytemuck::bytes_of(&1_u32),
        wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
    )?;
    let len_staging = device.staging("BFS queue length staging", word)?;

    let bind_group = device
        .device()
        .create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frontier BFS bind group"),
            layout: &kernels.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.offsets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.targets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: levels.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: mask.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: queue.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: queue_len.as_entire_binding(),
                },
            ],
        });

    let mut frontier_sizes = Vec::new();
    while params.queue_len > 0 {
        frontier_sizes.push(params.queue_len as usize);
        device
            .queue()
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frontier BFS level"),
            });
        dispatch(&mut encoder, &kernels.expand, &bind_group, groups);
        encoder.clear_buffer(&queue_len, 0, None);
        dispatch(&mut encoder, &kernels.compact, &bind_group, groups);
        encoder.copy_buffer_to_buffer(&queue_len, 0, &len_staging, 0, word);
        device.queue().submit(Some(encoder.finish()));

        let len = read_words(device, &len_staging).await?;
        params.queue_len = len.first().copied().context("empty queue length readback")?;
        debug!(level = params.level, next = params.queue_len, "GPU BFS level");
        params.level += 1;
    }

    let levels_staging = device.staging("BFS levels staging", word * u64::from(num_nodes))?;
    let mut encoder = device
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    encoder.copy_buffer_to_buffer(&levels, 0, &levels_staging, 0, word * u64::from(num_nodes));
    device.queue().submit(Some(encoder.finish()));

    let result = BfsResult::from_levels(read_words(device, &levels_staging).await?, frontier_sizes);
    info!(
        source,
        visited = result.visited_count,
        depth = result.depth(),
        "GPU frontier BFS finished"
    );
    Ok(result)
}

/// Upload a CSR graph as one partition and run [`gpu_frontier_bfs`]
///
/// # Errors
///
/// Returns error if the graph cannot be uploaded or `source` is unknown
pub async fn gpu_bfs(device: &GpuDevice, graph: &CsrGraph, source: NodeId) -> Result<BfsResult> {
    let partition = Partition::from_csr(graph)?;
    let buffers = GpuPartitionBuffers::from_partition(device, &partition)?;
    gpu_frontier_bfs(device, &buffers, source.0).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::bfs_levels;
    use serial_test::serial;

    fn scenario() -> CsrGraph {
        CsrGraph::from_edge_list(&[
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(0), NodeId(2), 1.0),
            (NodeId(1), NodeId(3), 1.0),
            (NodeId(2), NodeId(3), 1.0),
            (NodeId(3), NodeId(4), 1.0),
        ])
        .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_gpu_scenario_levels() {
        let Some(device) = GpuDevice::try_new().await else {
            eprintln!("Skipping test_gpu_scenario_levels: GPU not available");
            return;
        };
        let result = gpu_bfs(&device, &scenario(), NodeId(0)).await.unwrap();

        assert_eq!(result.levels, vec![0, 1, 1, 2, 3]);
        assert_eq!(result.frontier_sizes, vec![1, 2, 1, 1]);
        assert_eq!(result.visited_count, 5);
    }

    #[tokio::test]
    #[serial]
    async fn test_gpu_matches_sequential_reference() {
        let Some(device) = GpuDevice::try_new().await else {
            eprintln!("Skipping test_gpu_matches_sequential_reference: GPU not available");
            return;
        };
        // Two disjoint chains plus a cross link
        let mut edges: Vec<_> = (0..300_u32)
            .map(|v| (NodeId(v), NodeId(v + 1), 1.0))
            .collect();
        edges.push((NodeId(0), NodeId(150), 1.0));
        edges.push((NodeId(500), NodeId(501), 1.0));
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = gpu_bfs(&device, &graph, NodeId(0)).await.unwrap();
        assert_eq!(result.levels, bfs_levels(&graph, NodeId(0)).unwrap());
        assert!(!result.is_reachable(500));
    }

    #[tokio::test]
    #[serial]
    async fn test_gpu_invalid_source() {
        let Some(device) = GpuDevice::try_new().await else {
            eprintln!("Skipping test_gpu_invalid_source: GPU not available");
            return;
        };
        let err = gpu_bfs(&device, &scenario(), NodeId(9)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::VertexOutOfRange { vertex: 9, .. })
        ));
    }
}
