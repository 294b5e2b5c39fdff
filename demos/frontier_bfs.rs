//! Level-synchronous BFS on the frontier kernels
//!
//! Run with: cargo run --example frontier_bfs
//! Kernel traces: RUST_LOG=trueno_frontier=trace cargo run --example frontier_bfs

use tracing_subscriber::EnvFilter;
use trueno_frontier::{bfs, bfs_levels, CsrGraph, Device, DeviceConfig, LaunchLimits, NodeId};

fn main() -> trueno_frontier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trueno_frontier=info")),
        )
        .init();

    println!("🦀 trueno-frontier BFS\n");

    // 0 → 1 → 3 → 4, 0 → 2 → 3
    let graph = CsrGraph::from_edge_list(&[
        (NodeId(0), NodeId(1), 1.0),
        (NodeId(0), NodeId(2), 1.0),
        (NodeId(1), NodeId(3), 1.0),
        (NodeId(2), NodeId(3), 1.0),
        (NodeId(3), NodeId(4), 1.0),
    ])?;
    let device = Device::new()?;

    let result = bfs(&device, &graph, NodeId(0))?;
    println!("📊 Levels:      {:?}", result.levels);
    println!("   Queue sizes: {:?}", result.frontier_sizes);
    println!("   Visited:     {}", result.visited_count);

    // A 128x128 grid on an eight-block device: vertex-wide compact launches clamp and
    // workers stride over the remainder
    let side = 128_u32;
    let mut edges = Vec::new();
    for r in 0..side {
        for c in 0..side {
            let v = r * side + c;
            if c + 1 < side {
                edges.push((NodeId(v), NodeId(v + 1), 1.0));
            }
            if r + 1 < side {
                edges.push((NodeId(v), NodeId(v + side), 1.0));
            }
        }
    }
    let grid = CsrGraph::from_edge_list(&edges)?;
    let small = Device::with_config(
        DeviceConfig::new()
            .with_threads_per_block(32)
            .with_limits(LaunchLimits {
                max_threads_per_block: 32,
                max_blocks: 8,
            }),
    )?;

    let result = bfs(&small, &grid, NodeId(0))?;
    assert_eq!(result.levels, bfs_levels(&grid, NodeId(0))?);
    println!(
        "\n🔍 Grid {side}x{side}: depth {}, widest level {}",
        result.depth(),
        result.frontier_sizes.iter().max().copied().unwrap_or(0)
    );

    println!("\n✨ Example complete!");
    Ok(())
}
