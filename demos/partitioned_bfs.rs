//! BFS across range partitions through the mailbox protocol
//!
//! Run with: cargo run --example partitioned_bfs

use tracing_subscriber::EnvFilter;
use trueno_frontier::{bfs, partition_by_range, partitioned_bfs, CsrGraph, Device, NodeId};

#[tokio::main]
async fn main() -> trueno_frontier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trueno_frontier=info")),
        )
        .init();

    println!("🦀 trueno-frontier partitioned BFS\n");

    // Ring with chords every 7 vertices
    let n = 64_u32;
    let mut edges = Vec::new();
    for v in 0..n {
        edges.push((NodeId(v), NodeId((v + 1) % n), 1.0));
        if v % 7 == 0 {
            edges.push((NodeId(v), NodeId((v + n / 2) % n), 1.0));
        }
    }
    let graph = CsrGraph::from_edge_list(&edges)?;
    let device = Device::new()?;
    let single = bfs(&device, &graph, NodeId(0))?;

    for partitions in [1, 2, 4, 8] {
        let (_, shards) = partition_by_range(&graph, partitions)?;
        let remote: usize = shards.iter().map(|shard| shard.remote_edge_count()).sum();

        let result = partitioned_bfs(&device, &graph, partitions, NodeId(0), graph.num_edges())?;
        assert_eq!(result.levels, single.levels);
        println!(
            "📊 {partitions} partitions: {remote} remote edges, depth {}, {} supersteps",
            result.depth(),
            result.frontier_sizes.len()
        );
    }

    // Persist the shards and traverse one of them after loading
    #[cfg(feature = "storage")]
    {
        use trueno_frontier::{frontier_bfs, Partition};

        let dir = std::env::temp_dir().join("trueno_frontier_demo");
        std::fs::create_dir_all(&dir)?;
        let (_, shards) = partition_by_range(&graph, 2)?;
        for shard in &shards {
            shard.write_parquet(dir.join(format!("shard_{}", shard.id()))).await?;
        }

        let loaded = Partition::read_parquet(dir.join("shard_0")).await?;
        let local = frontier_bfs(&device, &loaded, 0)?;
        println!(
            "\n💾 Reloaded shard 0: {} vertices, {} reachable without leaving it",
            loaded.vertex_count(),
            local.visited_count
        );
    }

    println!("\n✨ Example complete!");
    Ok(())
}
