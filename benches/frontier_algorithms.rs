//! Criterion benchmarks for the frontier engine
//!
//! - Frontier kernels: compact and representation switches
//! - BFS: frontier kernels vs the sequential reference, single and partitioned
//! - Engine algorithms: SSSP and PageRank against their host references

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use trueno_frontier::{
    bfs, bfs_levels, dijkstra, engine_pagerank, frontier, pagerank, partitioned_bfs, sssp,
    CsrGraph, Device, NodeId, PageRankConfig, VertexSubset,
};

/// Generate scale-free graph (Barabási-Albert model approximation)
fn generate_scale_free_graph(
    num_nodes: usize,
    edges_per_node: usize,
) -> Vec<(NodeId, NodeId, f32)> {
    let mut edges = Vec::new();
    let mut rng_state = 12345_u64; // Simple LCG for reproducibility

    for node in 0..num_nodes {
        for _ in 0..edges_per_node {
            rng_state = rng_state.wrapping_mul(1103515245).wrapping_add(12345);
            let target = (rng_state % num_nodes as u64) as u32;

            if target != node as u32 {
                let weight = 1.0 + (rng_state >> 33) as f32 % 9.0;
                edges.push((NodeId(node as u32), NodeId(target), weight));
            }
        }
    }

    edges
}

fn graph(size: usize) -> CsrGraph {
    CsrGraph::with_vertex_count(size, &generate_scale_free_graph(size, 4)).unwrap()
}

/// Benchmark: dense → sparse compaction at different densities
fn bench_compact(c: &mut Criterion) {
    let device = Device::new().unwrap();
    let mut group = c.benchmark_group("compact");
    let n = 100_000;

    for stride in [1_u32, 8, 64] {
        group.bench_with_input(BenchmarkId::new("every_nth", stride), &stride, |b, &stride| {
            let mut dense = VertexSubset::dense(n).unwrap();
            let mut sparse = VertexSubset::sparse(n, n).unwrap();
            b.iter(|| {
                dense.clear();
                for v in (0..n as u32).step_by(stride as usize) {
                    dense.activate(v).unwrap();
                }
                sparse.clear();
                let len = frontier::compact(&device, &dense, &mut sparse).unwrap();
                black_box(len);
            });
        });
    }

    group.finish();
}

/// Benchmark: frontier BFS vs sequential BFS
fn bench_bfs(c: &mut Criterion) {
    let device = Device::new().unwrap();
    let mut group = c.benchmark_group("bfs");

    for size in [1_000, 10_000, 100_000] {
        let graph = graph(size);

        group.bench_with_input(BenchmarkId::new("sequential", size), &graph, |b, graph| {
            b.iter(|| black_box(bfs_levels(black_box(graph), NodeId(0)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("frontier", size), &graph, |b, graph| {
            b.iter(|| black_box(bfs(&device, black_box(graph), NodeId(0)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("partitioned_4", size), &graph, |b, graph| {
            b.iter(|| {
                let result =
                    partitioned_bfs(&device, black_box(graph), 4, NodeId(0), graph.num_edges())
                        .unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

/// Benchmark: engine SSSP vs Dijkstra
fn bench_sssp(c: &mut Criterion) {
    let device = Device::new().unwrap();
    let mut group = c.benchmark_group("sssp");

    for size in [1_000, 10_000] {
        let graph = graph(size);

        group.bench_with_input(BenchmarkId::new("dijkstra", size), &graph, |b, graph| {
            b.iter(|| black_box(dijkstra(black_box(graph), NodeId(0))));
        });

        group.bench_with_input(BenchmarkId::new("engine", size), &graph, |b, graph| {
            b.iter(|| black_box(sssp(&device, black_box(graph), NodeId(0)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark: engine PageRank vs host power iteration
fn bench_pagerank(c: &mut Criterion) {
    let device = Device::new().unwrap();
    let config = PageRankConfig::default();
    let mut group = c.benchmark_group("pagerank");

    for size in [1_000, 10_000] {
        let graph = graph(size);

        group.bench_with_input(BenchmarkId::new("reference", size), &graph, |b, graph| {
            b.iter(|| {
                let scores =
                    pagerank(black_box(graph), config.max_iterations, config.tolerance).unwrap();
                black_box(scores);
            });
        });

        group.bench_with_input(BenchmarkId::new("engine", size), &graph, |b, graph| {
            b.iter(|| black_box(engine_pagerank(&device, black_box(graph), &config).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compact, bench_bfs, bench_sssp, bench_pagerank);
criterion_main!(benches);
