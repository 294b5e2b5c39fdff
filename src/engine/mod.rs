//! Vertex-centric compute engine
//!
//! [`Engine`] owns a partition's topology and three state buffers (vertex
//! values, per-vertex accumulators, edge values) and drives gather/apply
//! kernels over [`VertexSubset`] frontiers. The caller owns the loop:
//!
//! ```text
//! edge_filter   (gather: active out-edges → accumulators, touched → dst)
//! vertex_filter (apply: value ⊕ accumulator → value, changed → dst)
//! ```
//!
//! Every operation takes `&mut self` and returns after its kernel finished,
//! so calls on one engine never overlap.

mod context;

pub use context::{
    EdgeContext, EdgeFilter, Functor, IdentityMessage, MessageContext, Reducible, VertexFilter,
};

use crate::device::{Device, DeviceValue, MirroredBuffer};
use crate::frontier::{Representation, VertexSubset};
use crate::partition::Partition;
use crate::storage::CsrGraph;
use crate::{EngineError, VertexId};
use anyhow::Result;
use bytemuck::Pod;
use tracing::debug;

/// Gather/apply engine over one partition
///
/// - `V`: vertex value
/// - `E`: edge value
/// - `A`: accumulator, reset to all-zero bits by every `edge_filter`
///
/// # Example
///
/// ```
/// use trueno_frontier::{CsrGraph, Device, Engine, NodeId, VertexSubset};
///
/// let graph = CsrGraph::from_edge_list(&[(NodeId(0), NodeId(1), 1.0)]).unwrap();
/// let mut engine = Engine::<u32, (), u32>::new(Device::new().unwrap(), &graph).unwrap();
/// engine.init_vertices(|v| v * 10);
///
/// let all = VertexSubset::from_vertices(2, &[0, 1]).unwrap();
/// engine.vertex_map(&all, &|x: u32| x + 1).unwrap();
/// assert_eq!(engine.collect_vertices(), vec![1, 11]);
/// assert_eq!(engine.vertex_reduce(), 12);
/// ```
#[derive(Debug)]
pub struct Engine<V, E, A> {
    device: Device,
    partition: Partition,
    vertex_values: MirroredBuffer<V>,
    accumulators: MirroredBuffer<A>,
    edge_values: MirroredBuffer<E>,
}

impl<V, E, A> Engine<V, E, A>
where
    V: DeviceValue,
    E: DeviceValue,
    A: DeviceValue + Pod,
{
    /// Load a CSR graph as partition 0 and cache it on the device
    ///
    /// # Errors
    ///
    /// Returns error if the graph is malformed or allocation fails
    pub fn new(device: Device, graph: &CsrGraph) -> Result<Self> {
        Self::from_partition(device, Partition::from_csr(graph)?)
    }

    /// Engine over an existing partition
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] if the state buffers cannot be
    /// allocated
    pub fn from_partition(device: Device, partition: Partition) -> Result<Self> {
        let vertices = partition.vertex_count();
        let edges = partition.edge_count();
        debug!(vertices, edges, "engine loaded partition");
        Ok(Self {
            device,
            vertex_values: MirroredBuffer::reserve(vertices)?,
            accumulators: MirroredBuffer::reserve(vertices)?,
            edge_values: MirroredBuffer::reserve(edges)?,
            partition,
        })
    }

    /// Number of local vertices
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.partition.vertex_count()
    }

    /// Number of out-edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.partition.edge_count()
    }

    /// Topology
    #[must_use]
    pub const fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Device kernels run on
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Vertex values
    #[must_use]
    pub const fn vertex_values(&self) -> &MirroredBuffer<V> {
        &self.vertex_values
    }

    /// Mutable vertex values (call `cache` after host edits)
    pub fn vertex_values_mut(&mut self) -> &mut MirroredBuffer<V> {
        &mut self.vertex_values
    }

    /// Edge values, parallel to the partition's edge array
    #[must_use]
    pub const fn edge_values(&self) -> &MirroredBuffer<E> {
        &self.edge_values
    }

    /// Mutable edge values (call `cache` after host edits)
    pub fn edge_values_mut(&mut self) -> &mut MirroredBuffer<E> {
        &mut self.edge_values
    }

    /// Accumulators left by the last `edge_filter`
    #[must_use]
    pub const fn accumulators(&self) -> &MirroredBuffer<A> {
        &self.accumulators
    }

    /// Set every vertex value from its id and cache
    #[allow(clippy::cast_possible_truncation)] // vertex ids fit in u32
    pub fn init_vertices<F>(&mut self, f: F)
    where
        F: Fn(VertexId) -> V,
    {
        for (v, slot) in self.vertex_values.host_mut().iter_mut().enumerate() {
            *slot = f(v as VertexId);
        }
        self.vertex_values.cache();
    }

    /// Set every edge value from its index and weight and cache
    pub fn init_edges<F>(&mut self, f: F)
    where
        F: Fn(usize, f32) -> E,
    {
        let weights = self.partition.weights().host();
        for (e, slot) in self.edge_values.host_mut().iter_mut().enumerate() {
            *slot = f(e, weights[e]);
        }
        self.edge_values.cache();
    }

    /// Persist and return every vertex value
    pub fn collect_vertices(&mut self) -> Vec<V> {
        self.vertex_values.persist();
        self.vertex_values.host().to_vec()
    }

    /// Empty dense frontier sized to this engine
    ///
    /// # Errors
    ///
    /// Returns error if allocation fails
    pub fn dense_frontier(&self) -> Result<VertexSubset> {
        VertexSubset::dense(self.vertex_count())
    }

    /// Empty sparse frontier that can hold every vertex
    ///
    /// # Errors
    ///
    /// Returns error if allocation fails
    pub fn sparse_frontier(&self) -> Result<VertexSubset> {
        VertexSubset::sparse(self.vertex_count(), self.vertex_count())
    }

    fn check_frontier(&self, frontier: &VertexSubset, operation: &'static str) -> Result<()> {
        if frontier.vertex_count() == self.vertex_count() {
            Ok(())
        } else {
            Err(EngineError::precondition(
                operation,
                format!(
                    "frontier over {} vertices, engine has {}",
                    frontier.vertex_count(),
                    self.vertex_count()
                ),
            )
            .into())
        }
    }

    /// Gather over the out-edges of `src` into the accumulators
    ///
    /// Accumulators are reset first. For every local out-edge `u → v` of an
    /// active `u`, a `Some` from `f.gather` is merged into `v`'s accumulator
    /// with `f.combine` (atomically) and `v` is appended to `dst` once.
    /// `src` may be dense or sparse; `dst` must be sparse and is appended to.
    /// Remote edges are skipped.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Representation`] if `dst` is dense
    /// - [`EngineError::CapacityOverflow`] if `dst` fills up
    #[allow(clippy::cast_possible_truncation)]
    pub fn edge_filter<F>(
        &mut self,
        dst: &mut VertexSubset,
        src: &VertexSubset,
        f: &F,
    ) -> Result<()>
    where
        F: EdgeFilter<V, E, A>,
    {
        dst.require(Representation::Sparse, "edge_filter")?;
        self.check_frontier(dst, "edge_filter")?;
        self.check_frontier(src, "edge_filter")?;

        self.accumulators.all_to(A::zeroed());
        dst.begin_appends(&self.device)?;

        let values = self.vertex_values.device();
        let accumulators = self.accumulators.device();
        let edge_values = self.edge_values.device();
        let edges = self.partition.edges().device();
        let partition = &self.partition;
        let output: &VertexSubset = dst;

        let gather = |source: usize| {
            let source_value = values.load(source);
            for e in partition.edge_range(source) {
                let edge = edges.load(e);
                if !partition.is_local(&edge) {
                    continue;
                }
                let target = edge.local as usize;
                if let Some(contribution) =
                    f.gather(source_value, edge_values.load(e), values.load(target))
                {
                    accumulators.update(target, |current| f.combine(current, contribution));
                    output.push_unique(edge.local);
                }
            }
        };

        match src.representation() {
            Representation::Dense => {
                let n = self.vertex_count();
                let flags = src.workset();
                self.device.launch("edge_filter_dense", n, |t| {
                    for v in t.grid_stride(n) {
                        if flags.load(v) != 0 {
                            gather(v);
                        }
                    }
                })?;
            }
            Representation::Sparse => {
                let len = src.len();
                let queue = src.workqueue();
                self.device.launch("edge_filter_sparse", len, |t| {
                    for slot in t.grid_stride(len) {
                        gather(queue.load(slot) as usize);
                    }
                })?;
            }
        }

        let len = dst.settle(&self.device)?;
        debug!(
            source = %src.representation(),
            active = len,
            "edge_filter"
        );
        Ok(())
    }

    /// Apply accumulators to every vertex queued in `src`
    ///
    /// Stores `f.apply(value, accumulator)` and adds the vertex to `dst`
    /// (either representation) when `f.is_active(old, new)`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Representation`] if `src` is dense
    /// - [`EngineError::CapacityOverflow`] if a sparse `dst` fills up
    pub fn vertex_filter<F>(
        &mut self,
        dst: &mut VertexSubset,
        src: &VertexSubset,
        f: &F,
    ) -> Result<()>
    where
        F: VertexFilter<V, A>,
    {
        src.require(Representation::Sparse, "vertex_filter")?;
        self.check_frontier(dst, "vertex_filter")?;
        self.check_frontier(src, "vertex_filter")?;

        let len = src.len();
        let queue = src.workqueue();
        let values = self.vertex_values.device();
        let accumulators = self.accumulators.device();
        let output: &VertexSubset = dst;

        let apply = |v: VertexId| {
            let index = v as usize;
            let old = values.load(index);
            let new = f.apply(old, accumulators.load(index));
            values.store(index, new);
            f.is_active(old, new).then_some(v)
        };

        match output.representation() {
            Representation::Dense => {
                let flags = output.workset();
                self.device.launch("vertex_filter_dense", len, |t| {
                    for slot in t.grid_stride(len) {
                        if let Some(v) = apply(queue.load(slot)) {
                            flags.store(v as usize, 1);
                        }
                    }
                })?;
            }
            Representation::Sparse => {
                output.begin_appends(&self.device)?;
                self.device.launch("vertex_filter_sparse", len, |t| {
                    for slot in t.grid_stride(len) {
                        if let Some(v) = apply(queue.load(slot)) {
                            output.push_unique(v);
                        }
                    }
                })?;
                dst.settle(&self.device)?;
            }
        }

        debug!(active = len, output = %dst.representation(), "vertex_filter");
        Ok(())
    }

    /// Replace the value of every vertex queued in `src` with `f(value)`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Representation`] if `src` is dense
    pub fn vertex_map<F>(&mut self, src: &VertexSubset, f: &F) -> Result<()>
    where
        F: Functor<V>,
    {
        src.require(Representation::Sparse, "vertex_map")?;
        self.check_frontier(src, "vertex_map")?;

        let len = src.len();
        let queue = src.workqueue();
        let values = self.vertex_values.device();
        self.device.launch("vertex_map", len, |t| {
            for slot in t.grid_stride(len) {
                let v = queue.load(slot) as usize;
                values.store(v, f.call(values.load(v)));
            }
        })?;

        debug!(active = len, "vertex_map");
        Ok(())
    }

    /// Replace every out-edge value of every vertex queued in `src`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Representation`] if `src` is dense
    pub fn edge_map<F>(&mut self, src: &VertexSubset, f: &F) -> Result<()>
    where
        F: Functor<E>,
    {
        src.require(Representation::Sparse, "edge_map")?;
        self.check_frontier(src, "edge_map")?;

        let len = src.len();
        let queue = src.workqueue();
        let edge_values = self.edge_values.device();
        let partition = &self.partition;
        self.device.launch("edge_map", len, |t| {
            for slot in t.grid_stride(len) {
                for e in partition.edge_range(queue.load(slot) as usize) {
                    edge_values.store(e, f.call(edge_values.load(e)));
                }
            }
        })?;

        debug!(active = len, "edge_map");
        Ok(())
    }

    /// Sequential host-side fold over every vertex value
    ///
    /// Persists the vertex values, then folds them in vertex order starting
    /// from the all-zero accumulator, so results are deterministic.
    pub fn vertex_reduce(&mut self) -> A
    where
        V: Reducible<A>,
    {
        self.vertex_values.persist();
        let mut accumulator = A::zeroed();
        for value in self.vertex_values.host() {
            value.reduce(&mut accumulator);
        }
        accumulator
    }

    /// Release every buffer the engine owns
    pub fn release(&mut self) {
        self.vertex_values.release();
        self.accumulators.release();
        self.edge_values.release();
    }
}
