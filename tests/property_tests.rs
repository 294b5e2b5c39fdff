//! Property-based tests for trueno-frontier
//!
//! Verifies frontier, geometry and traversal invariants on arbitrary graphs

use proptest::prelude::*;
use std::sync::OnceLock;
use trueno_frontier::device::MAX_BLOCKS;
use trueno_frontier::{
    bfs, bfs_levels, dijkstra, frontier, kernel_config, partitioned_bfs, sssp, CsrGraph, Device,
    Engine, NodeId, VertexSubset, UNREACHED,
};

fn device() -> &'static Device {
    static DEVICE: OnceLock<Device> = OnceLock::new();
    DEVICE.get_or_init(|| Device::new().unwrap())
}

// Helper: Generate a vertex count and an edge list over it
fn prop_graph(
    max_vertices: u32,
    max_edges: usize,
) -> impl Strategy<Value = (u32, Vec<(NodeId, NodeId, f32)>)> {
    (1..=max_vertices).prop_flat_map(move |n| {
        let edges = prop::collection::vec(
            (0..n, 0..n, 0.0..100.0f32)
                .prop_map(|(src, dst, weight)| (NodeId(src), NodeId(dst), weight)),
            0..=max_edges,
        );
        (Just(n), edges)
    })
}

fn build(n: u32, edges: &[(NodeId, NodeId, f32)]) -> CsrGraph {
    CsrGraph::with_vertex_count(n as usize, edges).unwrap()
}

// Property: launch geometry covers the work or reports the clamp
proptest! {
    #[test]
    fn prop_kernel_config_covers_threads(threads in 1usize..50_000_000) {
        let config = kernel_config(threads);

        prop_assert!(config.threads_per_block <= threads);
        prop_assert!(config.blocks <= MAX_BLOCKS);
        prop_assert!(config.blocks >= 1);
        if config.clamped {
            prop_assert_eq!(config.blocks, MAX_BLOCKS);
            prop_assert!(config.total_threads() < threads);
        } else {
            prop_assert!(config.total_threads() >= threads);
            prop_assert!(config.total_threads() - threads < config.threads_per_block);
        }
    }
}

// Property: dense → sparse → dense keeps exactly the flagged vertices
proptest! {
    #[test]
    fn prop_representation_round_trip(flags in prop::collection::vec(any::<bool>(), 1..300)) {
        let n = flags.len();
        let mut subset = VertexSubset::dense(n).unwrap();
        let expected: Vec<u32> = (0..n as u32).filter(|&v| flags[v as usize]).collect();
        for &v in &expected {
            subset.activate(v).unwrap();
        }

        subset.to_sparse(device()).unwrap();
        prop_assert_eq!(subset.len(), expected.len());
        let mut queued = subset.vertices();
        queued.sort_unstable();
        prop_assert_eq!(&queued, &expected);

        subset.to_dense(device()).unwrap();
        prop_assert_eq!(subset.vertices(), expected);
    }
}

// Property: compact moves every flag into the queue exactly once
proptest! {
    #[test]
    fn prop_compact_consumes_flags(flags in prop::collection::vec(any::<bool>(), 1..300)) {
        let n = flags.len();
        let mut dense = VertexSubset::dense(n).unwrap();
        for (v, &set) in flags.iter().enumerate() {
            if set {
                dense.activate(v as u32).unwrap();
            }
        }
        let expected = dense.vertices();

        let mut sparse = VertexSubset::sparse(n, n).unwrap();
        let len = frontier::compact(device(), &dense, &mut sparse).unwrap();

        prop_assert_eq!(len, expected.len());
        prop_assert!(dense.is_empty());
        let mut queued = sparse.vertices();
        queued.sort_unstable();
        prop_assert_eq!(queued, expected);
    }
}

// Property: frontier BFS agrees with the sequential reference
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bfs_matches_reference((n, edges) in prop_graph(60, 200), seed in any::<u32>()) {
        let graph = build(n, &edges);
        let source = NodeId(seed % n);

        let result = bfs(device(), &graph, source).unwrap();
        let reference = bfs_levels(&graph, source).unwrap();
        prop_assert_eq!(&result.levels, &reference);

        // Every visited vertex sits in exactly one level
        prop_assert_eq!(result.frontier_sizes.iter().sum::<usize>(), result.visited_count);
        prop_assert_eq!(result.frontier_sizes.len() as u32, result.depth() + 1);
        prop_assert_eq!(
            result.visited_count,
            reference.iter().filter(|&&l| l != UNREACHED).count()
        );
    }

    #[test]
    fn prop_partitioned_bfs_matches_single(
        (n, edges) in prop_graph(40, 120),
        partitions in 1usize..5,
        seed in any::<u32>(),
    ) {
        let graph = build(n, &edges);
        let source = NodeId(seed % n);
        let capacity = edges.len().max(1);

        let single = bfs(device(), &graph, source).unwrap();
        let sharded = partitioned_bfs(device(), &graph, partitions, source, capacity).unwrap();
        prop_assert_eq!(sharded.levels, single.levels);
        prop_assert_eq!(sharded.frontier_sizes, single.frontier_sizes);
    }

    #[test]
    fn prop_sssp_matches_dijkstra((n, edges) in prop_graph(40, 150), seed in any::<u32>()) {
        let graph = build(n, &edges);
        let source = NodeId(seed % n);

        let engine = sssp(device(), &graph, source).unwrap();
        let reference = dijkstra(&graph, source);
        for (v, (a, b)) in engine.iter().zip(&reference).enumerate() {
            if b.is_infinite() {
                prop_assert!(a.is_infinite(), "vertex {} should be unreachable", v);
            } else {
                prop_assert!((a - b).abs() <= 1e-3 * b.max(1.0), "vertex {}: {} vs {}", v, a, b);
            }
        }
    }
}

// Property: vertex_reduce folds every value; identity vertex_map changes nothing
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reduce_and_identity_map(values in prop::collection::vec(0u64..1_000_000, 1..200)) {
        let n = values.len();
        let graph = CsrGraph::with_vertex_count(n, &[]).unwrap();
        let mut engine = Engine::<u64, f32, u64>::new(device().clone(), &graph).unwrap();
        engine.init_vertices(|v| values[v as usize]);

        prop_assert_eq!(engine.vertex_reduce(), values.iter().sum::<u64>());

        let ids: Vec<u32> = (0..n as u32).collect();
        let everyone = VertexSubset::from_vertices(n, &ids).unwrap();
        engine.vertex_map(&everyone, &|value: u64| value).unwrap();
        prop_assert_eq!(engine.collect_vertices(), values);
    }
}
