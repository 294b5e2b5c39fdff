//! Mailbox protocol story tests
//!
//! Drives sharded graphs through the public superstep API: hand-run
//! phases, custom message encodings, custom exchanges and superstep limits.

use trueno_frontier::{
    bfs, partition_by_range, run_supersteps, CsrGraph, Device, DeviceValue, Edge, EdgeContext,
    EngineError, Exchange, IdentityMessage, LocalExchange, MessageContext, NodeId, Partition,
    PartitionWorker, RangePlacement, Result, UNREACHED,
};

/// Chain 0 → 1 → ... → n-1
fn chain(n: u32) -> CsrGraph {
    let edges: Vec<_> = (0..n - 1)
        .map(|v| (NodeId(v), NodeId(v + 1), 1.0))
        .collect();
    CsrGraph::from_edge_list(&edges).unwrap()
}

struct NextLevel;

impl EdgeContext<u32> for NextLevel {
    fn cond(&self, current: u32) -> bool {
        current == UNREACHED
    }

    fn update(&self, source: u32) -> u32 {
        source + 1
    }
}

/// Levels travel as `u64` with a marker in the high word
struct TaggedLevel;

const TAG: u64 = 0xA5A5_0000_0000_0000;

impl MessageContext<u32, u64> for TaggedLevel {
    fn pack(&self, value: u32) -> u64 {
        TAG | u64::from(value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn unpack(&self, wire: u64) -> u32 {
        assert_eq!(wire & TAG, TAG, "message lost its tag");
        wire as u32
    }
}

fn shard_workers<M: DeviceValue>(
    graph: &CsrGraph,
    partitions: usize,
    capacity: usize,
) -> (RangePlacement, Vec<PartitionWorker<u32, M>>) {
    let (placement, shards) = partition_by_range(graph, partitions).unwrap();
    let workers = shards
        .into_iter()
        .map(|shard| PartitionWorker::new(shard, partitions, capacity, UNREACHED).unwrap())
        .collect();
    (placement, workers)
}

fn seed<M: DeviceValue>(
    placement: &RangePlacement,
    workers: &mut [PartitionWorker<u32, M>],
    source: u32,
) {
    let (owner, local) = placement.locate(source).unwrap();
    let worker = &mut workers[owner as usize];
    worker.store(local, 0);
    worker.activate(local).unwrap();
}

fn gather(placement: &RangePlacement, workers: &mut [PartitionWorker<u32, u64>]) -> Vec<u32> {
    let mut levels = vec![UNREACHED; placement.vertex_count()];
    for worker in workers {
        let values = worker.collect_values();
        for (&global, value) in worker.partition().global_ids().iter().zip(values) {
            levels[global as usize] = value;
        }
    }
    levels
}

#[test]
fn test_hand_driven_superstep_crosses_one_boundary() {
    let device = Device::new().unwrap();
    let graph = chain(6);
    let (placement, mut workers) = shard_workers::<u32>(&graph, 2, 4);
    seed(&placement, &mut workers, 2);

    // Vertex 2 is the last vertex of partition 0; its only edge is remote
    workers[0].expand(&device, &NextLevel, &IdentityMessage).unwrap();
    assert_eq!(workers[0].pending_messages(), 1);
    let sent = workers[0].outbox_mut(1).unwrap().messages().to_vec();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].receiver, 0);
    assert_eq!(sent[0].value, 0);

    LocalExchange.exchange(workers.as_mut_slice()).unwrap();
    assert_eq!(workers[0].pending_messages(), 0);
    assert_eq!(workers[1].inbox_mut(0).unwrap().len(), 1);

    for worker in &mut workers {
        worker.scatter(&device, &NextLevel, &IdentityMessage).unwrap();
    }
    assert_eq!(workers[0].compact(&device).unwrap(), 0);
    assert_eq!(workers[1].compact(&device).unwrap(), 1);
    assert_eq!(workers[1].value(0), 1);
    assert!(workers[1].inbox_mut(0).unwrap().is_empty());
}

#[test]
fn test_custom_message_encoding_round_trips() {
    let device = Device::new().unwrap();
    let graph = chain(12);
    let (placement, mut workers) = shard_workers::<u64>(&graph, 4, 2);
    seed(&placement, &mut workers, 0);

    let stats = run_supersteps(
        &device,
        &mut workers,
        &NextLevel,
        &TaggedLevel,
        &mut LocalExchange,
        None,
    )
    .unwrap();

    let levels = gather(&placement, &mut workers);
    assert_eq!(levels, (0..12).collect::<Vec<u32>>());
    assert_eq!(levels, bfs(&device, &graph, NodeId(0)).unwrap().levels);
    // One message per partition boundary
    assert_eq!(stats.messages, 3);
    assert_eq!(stats.supersteps, 12);
}

/// Counts what passes through, then delegates
#[derive(Default)]
struct CountingExchange {
    rounds: usize,
    delivered: usize,
}

impl Exchange<u32, u64> for CountingExchange {
    fn exchange(&mut self, workers: &mut [PartitionWorker<u32, u64>]) -> Result<()> {
        self.rounds += 1;
        self.delivered += workers
            .iter()
            .map(PartitionWorker::pending_messages)
            .sum::<usize>();
        LocalExchange.exchange(workers)
    }
}

#[test]
fn test_custom_exchange_sees_every_superstep() {
    let device = Device::new().unwrap();
    let graph = chain(9);
    let (placement, mut workers) = shard_workers::<u64>(&graph, 3, 2);
    seed(&placement, &mut workers, 0);

    let mut exchange = CountingExchange::default();
    let stats = run_supersteps(
        &device,
        &mut workers,
        &NextLevel,
        &TaggedLevel,
        &mut exchange,
        None,
    )
    .unwrap();

    assert_eq!(exchange.rounds, stats.supersteps);
    assert_eq!(exchange.delivered, stats.messages);
    assert_eq!(stats.frontier_sizes, vec![1; 9]);
}

#[test]
fn test_superstep_limit_stops_early() {
    let device = Device::new().unwrap();
    let graph = chain(8);
    let (placement, mut workers) = shard_workers::<u64>(&graph, 2, 2);
    seed(&placement, &mut workers, 0);

    let stats = run_supersteps(
        &device,
        &mut workers,
        &NextLevel,
        &TaggedLevel,
        &mut LocalExchange,
        Some(3),
    )
    .unwrap();

    assert_eq!(stats.supersteps, 3);
    let levels = gather(&placement, &mut workers);
    assert_eq!(&levels[..4], &[0, 1, 2, 3]);
    assert!(levels[4..].iter().all(|&level| level == UNREACHED));
    // The frontier was still live when the loop stopped
    assert!(workers.iter().map(PartitionWorker::active_len).sum::<usize>() > 0);
}

#[test]
fn test_worker_rejects_foreign_partition_ids() {
    let (_, shards) = partition_by_range(&chain(4), 2).unwrap();
    let shard = shards.into_iter().next().unwrap();

    // Partition 0 has an edge into partition 1, which a one-partition run lacks
    let err = PartitionWorker::<u32, u32>::new(shard, 1, 4, UNREACHED).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InvalidTopology(_))
    ));
}

#[test]
fn test_remote_edge_past_peer_range_is_an_error() {
    let device = Device::new().unwrap();
    // Partition 0 points at local 9 of partition 1, which owns one vertex
    let edges = vec![Edge {
        partition: 1,
        local: 9,
    }];
    let first = Partition::new(0, vec![0, 1], edges, vec![], vec![0]).unwrap();
    let second = Partition::new(1, vec![0, 0], vec![], vec![], vec![1]).unwrap();
    let mut workers: Vec<PartitionWorker<u32, u32>> = [first, second]
        .into_iter()
        .map(|shard| PartitionWorker::new(shard, 2, 4, UNREACHED).unwrap())
        .collect();
    workers[0].store(0, 0);
    workers[0].activate(0).unwrap();

    let err = run_supersteps(
        &device,
        &mut workers,
        &NextLevel,
        &IdentityMessage,
        &mut LocalExchange,
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::VertexOutOfRange {
            vertex: 9,
            vertex_count: 1
        })
    ));
    assert_eq!(workers[1].value(0), UNREACHED);
}
