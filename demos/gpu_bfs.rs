//! Frontier BFS on wgpu hardware
//!
//! Run with: cargo run --example gpu_bfs --features gpu

use tracing_subscriber::EnvFilter;
use trueno_frontier::gpu::{gpu_frontier_bfs, GpuDevice, GpuPartitionBuffers};
use trueno_frontier::{frontier_bfs, CsrGraph, Device, NodeId, Partition};

#[tokio::main]
async fn main() -> trueno_frontier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trueno_frontier=info")),
        )
        .init();

    println!("🦀 trueno-frontier GPU BFS\n");

    let gpu = match GpuDevice::new().await {
        Ok(gpu) => gpu,
        Err(e) => {
            println!("⚠️  GPU not available ({e}); nothing to do");
            return Ok(());
        }
    };
    println!("🖥️  Adapter: {} ({:?})", gpu.adapter_name(), gpu.backend());

    let edges: Vec<_> = (0..10_000_u32)
        .flat_map(|v| {
            [
                (NodeId(v), NodeId((v + 1) % 10_000), 1.0),
                (NodeId(v), NodeId((v * 31) % 10_000), 1.0),
            ]
        })
        .collect();
    let graph = CsrGraph::from_edge_list(&edges)?;
    let partition = Partition::from_csr(&graph)?;

    let buffers = GpuPartitionBuffers::from_partition(&gpu, &partition)?;
    let result = gpu_frontier_bfs(&gpu, &buffers, 0).await?;
    let emulated = frontier_bfs(&Device::new()?, &partition, 0)?;
    assert_eq!(result.levels, emulated.levels);

    println!(
        "📊 Visited {} vertices, depth {}, {} levels",
        result.visited_count,
        result.depth(),
        result.frontier_sizes.len()
    );

    println!("\n✨ Example complete!");
    Ok(())
}
