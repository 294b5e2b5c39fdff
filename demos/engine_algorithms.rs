//! SSSP and PageRank on the compute engine, checked against host references
//!
//! Run with: cargo run --example engine_algorithms

use tracing_subscriber::EnvFilter;
use trueno_frontier::{
    dijkstra, engine_pagerank, pagerank, sssp, CsrGraph, Device, NodeId, PageRankConfig,
};

fn main() -> trueno_frontier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trueno_frontier=info")),
        )
        .init();

    println!("🦀 trueno-frontier engine algorithms\n");

    let graph = CsrGraph::from_edge_list(&[
        (NodeId(0), NodeId(1), 4.0),
        (NodeId(0), NodeId(2), 1.0),
        (NodeId(2), NodeId(1), 2.0),
        (NodeId(1), NodeId(3), 1.0),
        (NodeId(2), NodeId(3), 5.0),
        (NodeId(3), NodeId(4), 3.0),
        (NodeId(4), NodeId(0), 1.0),
    ])?;
    let device = Device::new()?;

    let distances = sssp(&device, &graph, NodeId(0))?;
    assert_eq!(distances, dijkstra(&graph, NodeId(0)));
    println!("📏 Shortest distances from 0: {distances:?}");

    let config = PageRankConfig::default();
    let ranks = engine_pagerank(&device, &graph, &config)?;
    let reference = pagerank(&graph, config.max_iterations, config.tolerance)?;
    println!("\n📊 PageRank (damping {}):", config.damping);
    for (v, (rank, expected)) in ranks.iter().zip(&reference).enumerate() {
        println!("  vertex {v}: {rank:.4} (reference {expected:.4})");
    }

    println!("\n✨ Example complete!");
    Ok(())
}
