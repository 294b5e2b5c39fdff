//! Active-vertex frontier with dense and sparse representations
//!
//! A [`VertexSubset`] is either a per-vertex flag array (O(1) membership,
//! O(V) iteration) or a bounded queue of vertex ids plus a length counter
//! (O(k) iteration over exactly the k members). Two kernels bridge them:
//!
//! - [`compact`]: dense flags → sparse queue, one atomic slot claim per set flag
//! - [`expand`]: sparse queue → dense flags of the *destinations* of its
//!   out-edges, gated by a per-edge decision
//!
//! Both representations live on the device; host-side queries read device
//! memory directly.

use crate::device::{Device, DeviceCounter, DeviceMemory, MirroredBuffer};
use crate::partition::{Edge, Partition};
use crate::{EngineError, VertexId};
use anyhow::Result;
use std::fmt;
use tracing::debug;

/// Which half of a [`VertexSubset`] is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Per-vertex flag array
    Dense,
    /// Compact id queue
    Sparse,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => f.write_str("dense"),
            Self::Sparse => f.write_str("sparse"),
        }
    }
}

/// Subset of `0..vertex_count`
///
/// While sparse, the flag array is all zero between operations; kernels use
/// it as scratch for de-duplication and must clear what they mark.
///
/// # Example
///
/// ```
/// use trueno_frontier::{Device, Representation, VertexSubset};
///
/// let device = Device::new().unwrap();
/// let mut frontier = VertexSubset::dense(8).unwrap();
/// frontier.activate(3).unwrap();
/// frontier.activate(5).unwrap();
///
/// frontier.to_sparse(&device).unwrap();
/// assert_eq!(frontier.representation(), Representation::Sparse);
/// assert_eq!(frontier.len(), 2);
/// ```
#[derive(Debug)]
pub struct VertexSubset {
    representation: Representation,
    vertex_count: usize,
    workset: MirroredBuffer<u32>,
    workqueue: MirroredBuffer<VertexId>,
    queue_len: DeviceCounter,
}

impl VertexSubset {
    fn allocate(
        representation: Representation,
        vertex_count: usize,
        capacity: usize,
    ) -> Result<Self> {
        if u32::try_from(vertex_count).is_err() {
            return Err(EngineError::precondition(
                "VertexSubset::new",
                format!("{vertex_count} vertices exceed the u32 id space"),
            )
            .into());
        }
        if capacity > vertex_count {
            return Err(EngineError::precondition(
                "VertexSubset::new",
                format!("queue capacity {capacity} exceeds {vertex_count} vertices"),
            )
            .into());
        }
        Ok(Self {
            representation,
            vertex_count,
            workset: MirroredBuffer::reserve(vertex_count)?,
            workqueue: MirroredBuffer::reserve(capacity)?,
            queue_len: DeviceCounter::new(),
        })
    }

    /// Empty dense subset with a queue large enough for every vertex
    ///
    /// # Errors
    ///
    /// Returns error if allocation fails or `vertex_count` exceeds `u32`
    pub fn dense(vertex_count: usize) -> Result<Self> {
        Self::allocate(Representation::Dense, vertex_count, vertex_count)
    }

    /// Empty sparse subset holding at most `capacity` ids
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Precondition`] if `capacity > vertex_count`
    pub fn sparse(vertex_count: usize, capacity: usize) -> Result<Self> {
        Self::allocate(Representation::Sparse, vertex_count, capacity)
    }

    /// Sparse subset holding `vertices` (duplicates collapse)
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VertexOutOfRange`] for ids outside the subset
    pub fn from_vertices(vertex_count: usize, vertices: &[VertexId]) -> Result<Self> {
        let mut subset = Self::sparse(vertex_count, vertex_count)?;
        let mut seen = vec![false; vertex_count];
        let mut len = 0;
        for &v in vertices {
            let index = v as usize;
            if index >= vertex_count {
                return Err(EngineError::vertex_out_of_range(v, vertex_count).into());
            }
            if !seen[index] {
                seen[index] = true;
                subset.workqueue.set(len, v);
                len += 1;
            }
        }
        subset.workqueue.cache();
        subset.queue_len.set(len);
        subset.queue_len.cache();
        Ok(subset)
    }

    /// Dense subset with every vertex active
    ///
    /// # Errors
    ///
    /// Returns error if allocation fails
    pub fn all(vertex_count: usize) -> Result<Self> {
        let subset = Self::dense(vertex_count)?;
        subset.workset.all_to(1);
        Ok(subset)
    }

    /// Active representation
    #[must_use]
    pub const fn representation(&self) -> Representation {
        self.representation
    }

    /// True if the flag array is authoritative
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.representation == Representation::Dense
    }

    /// Size of the universe `0..vertex_count`
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Queue capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.workqueue.capacity()
    }

    /// Number of active vertices
    ///
    /// Sparse: the device queue length. Dense: a scan of the flags.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.representation {
            Representation::Sparse => self.queue_len.load(),
            Representation::Dense => (0..self.vertex_count)
                .filter(|&v| self.workset.device().load(v) != 0)
                .count(),
        }
    }

    /// True if no vertex is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership test (O(k) when sparse)
    #[must_use]
    pub fn contains(&self, v: VertexId) -> bool {
        let index = v as usize;
        if index >= self.vertex_count {
            return false;
        }
        match self.representation {
            Representation::Dense => self.workset.device().load(index) != 0,
            Representation::Sparse => {
                (0..self.len()).any(|slot| self.workqueue.device().load(slot) == v)
            }
        }
    }

    /// Active ids: ascending when dense, queue order when sparse
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // vertex_count fits in u32
    pub fn vertices(&self) -> Vec<VertexId> {
        match self.representation {
            Representation::Dense => (0..self.vertex_count)
                .filter(|&v| self.workset.device().load(v) != 0)
                .map(|v| v as VertexId)
                .collect(),
            Representation::Sparse => (0..self.len())
                .map(|slot| self.workqueue.device().load(slot))
                .collect(),
        }
    }

    /// Deactivate every vertex
    pub fn clear(&mut self) {
        match self.representation {
            Representation::Dense => self.workset.all_to(0),
            Representation::Sparse => self.queue_len.reset(),
        }
    }

    /// Activate one vertex from the host
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VertexOutOfRange`] for ids outside the subset
    /// and [`EngineError::CapacityOverflow`] if a sparse queue is full
    pub fn activate(&mut self, v: VertexId) -> Result<()> {
        let index = v as usize;
        if index >= self.vertex_count {
            return Err(EngineError::vertex_out_of_range(v, self.vertex_count).into());
        }
        match self.representation {
            Representation::Dense => self.workset.device().store(index, 1),
            Representation::Sparse => {
                if self.contains(v) {
                    return Ok(());
                }
                let slot = self
                    .queue_len
                    .claim(self.capacity())
                    .ok_or_else(|| self.overflow_error())?;
                self.workqueue.device().store(slot, v);
                self.queue_len.persist();
            }
        }
        Ok(())
    }

    /// Fail unless the subset holds `expected`
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Representation`] naming `operation`
    pub fn require(&self, expected: Representation, operation: &'static str) -> Result<()> {
        if self.representation == expected {
            Ok(())
        } else {
            Err(EngineError::Representation {
                operation,
                expected,
                found: self.representation,
            }
            .into())
        }
    }

    /// Switch to the sparse representation in place
    ///
    /// On overflow the subset is restored to dense and the error returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityOverflow`] if the queue is too small
    pub fn to_sparse(&mut self, device: &Device) -> Result<()> {
        if self.representation == Representation::Sparse {
            return Ok(());
        }
        self.queue_len.reset();
        let capacity = self.capacity();
        compact_flags(
            device,
            self.workset.device(),
            self.workqueue.device(),
            &self.queue_len,
            capacity,
        )?;
        self.queue_len.persist();

        if self.queue_len.overflowed() {
            // Re-mark what was queued so no member is lost
            mark_queued(device, &self.workqueue, &self.queue_len, self.workset.device())?;
            self.queue_len.reset();
            return Err(self.overflow_error());
        }
        self.representation = Representation::Sparse;
        Ok(())
    }

    /// Switch to the dense representation in place
    ///
    /// # Errors
    ///
    /// Returns error if the kernel launch is rejected
    pub fn to_dense(&mut self, device: &Device) -> Result<()> {
        if self.representation == Representation::Dense {
            return Ok(());
        }
        mark_queued(device, &self.workqueue, &self.queue_len, self.workset.device())?;
        self.queue_len.reset();
        self.representation = Representation::Dense;
        Ok(())
    }

    /// Flag array on the device
    #[must_use]
    pub fn workset(&self) -> &DeviceMemory<u32> {
        self.workset.device()
    }

    /// Queue on the device
    #[must_use]
    pub fn workqueue(&self) -> &DeviceMemory<VertexId> {
        self.workqueue.device()
    }

    /// Queue length counter
    #[must_use]
    pub const fn queue_len(&self) -> &DeviceCounter {
        &self.queue_len
    }

    /// Mutable queue length counter, for host-side reset and persist
    pub fn queue_len_mut(&mut self) -> &mut DeviceCounter {
        &mut self.queue_len
    }

    /// Release both buffers; the subset is empty afterwards
    pub fn release(&mut self) {
        self.workset.release();
        self.workqueue.release();
        self.queue_len.reset();
        self.vertex_count = 0;
    }

    /// Start a pass of [`push_unique`](Self::push_unique) appends
    ///
    /// Flags the vertices already queued so a pass never queues them twice.
    ///
    /// # Errors
    ///
    /// Returns error if the marking launch fails
    pub(crate) fn begin_appends(&self, device: &Device) -> Result<()> {
        mark_queued_with(
            device,
            self.workqueue.device(),
            self.queue_len.load(),
            self.workset.device(),
            1,
        )
    }

    /// Kernel-side append to a sparse subset, once per vertex per pass
    ///
    /// Marks `v` in the scratch flags. [`begin_appends`](Self::begin_appends)
    /// must run before the launch and [`settle`](Self::settle) after it.
    #[inline]
    pub(crate) fn push_unique(&self, v: VertexId) {
        if self.workset.device().swap(v as usize, 1) == 0 {
            if let Some(slot) = self.queue_len.claim(self.capacity()) {
                self.workqueue.device().store(slot, v);
            }
        }
    }

    /// Finish a pass of [`push_unique`](Self::push_unique) appends
    ///
    /// Clears the scratch flags and persists the queue length.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityOverflow`] if an append was dropped
    pub(crate) fn settle(&mut self, device: &Device) -> Result<usize> {
        if self.queue_len.overflowed() {
            self.workset.all_to(0);
        } else {
            let flags = self.workset.device();
            mark_queued_with(device, self.workqueue.device(), self.queue_len.load(), flags, 0)?;
        }
        let len = self.queue_len.persist();
        if self.queue_len.overflowed() {
            return Err(self.overflow_error());
        }
        Ok(len)
    }

    pub(crate) fn overflow_error(&self) -> anyhow::Error {
        EngineError::CapacityOverflow {
            buffer: "frontier queue",
            capacity: self.capacity(),
        }
        .into()
    }
}

#[allow(clippy::cast_possible_truncation)] // flag arrays are indexed by u32 ids
fn compact_flags(
    device: &Device,
    flags: &DeviceMemory<u32>,
    queue: &DeviceMemory<VertexId>,
    queue_len: &DeviceCounter,
    capacity: usize,
) -> Result<()> {
    let n = flags.len();
    device.launch("compact", n, |t| {
        for v in t.grid_stride(n) {
            if flags.load(v) == 0 {
                continue;
            }
            if let Some(slot) = queue_len.claim(capacity) {
                queue.store(slot, v as VertexId);
                flags.store(v, 0);
            }
        }
    })?;
    Ok(())
}

fn mark_queued(
    device: &Device,
    queue: &MirroredBuffer<VertexId>,
    queue_len: &DeviceCounter,
    flags: &DeviceMemory<u32>,
) -> Result<()> {
    mark_queued_with(device, queue.device(), queue_len.load(), flags, 1)
}

fn mark_queued_with(
    device: &Device,
    queue: &DeviceMemory<VertexId>,
    len: usize,
    flags: &DeviceMemory<u32>,
    flag: u32,
) -> Result<()> {
    device.launch("mark_queued", len, |t| {
        for slot in t.grid_stride(len) {
            flags.store(queue.load(slot) as usize, flag);
        }
    })?;
    Ok(())
}

fn check_universe(a: &VertexSubset, b: &VertexSubset, operation: &'static str) -> Result<()> {
    if a.vertex_count == b.vertex_count {
        Ok(())
    } else {
        Err(EngineError::precondition(
            operation,
            format!(
                "frontiers over {} and {} vertices",
                a.vertex_count, b.vertex_count
            ),
        )
        .into())
    }
}

/// Dense → sparse: append every flagged vertex of `src` to `dst`
///
/// Consumed flags are cleared. Slot order is unspecified but each flagged
/// vertex lands in exactly one slot. `dst` is appended to, so clear it first
/// for a fresh queue; flagged vertices it already holds are consumed without
/// a second slot. Returns the new queue length.
///
/// # Errors
///
/// - [`EngineError::Representation`] unless `src` is dense and `dst` sparse
/// - [`EngineError::CapacityOverflow`] if `dst` fills up; the flags that did
///   not fit stay set in `src`, and `dst` reports overflow until cleared
pub fn compact(device: &Device, src: &VertexSubset, dst: &mut VertexSubset) -> Result<usize> {
    src.require(Representation::Dense, "compact")?;
    dst.require(Representation::Sparse, "compact")?;
    check_universe(src, dst, "compact")?;

    // Already queued
    mark_queued_with(
        device,
        dst.workqueue.device(),
        dst.queue_len.load(),
        src.workset.device(),
        0,
    )?;

    let capacity = dst.capacity();
    compact_flags(
        device,
        src.workset.device(),
        dst.workqueue.device(),
        &dst.queue_len,
        capacity,
    )?;
    let len = dst.queue_len.persist();

    if dst.queue_len.overflowed() {
        return Err(dst.overflow_error());
    }
    debug!(len, "compacted frontier");
    Ok(len)
}

/// Sparse → dense over out-edges: flag local destinations `decide` accepts
///
/// `decide(source, edge, edge_index)` runs once per local out-edge of every
/// queued vertex, possibly concurrently for the same destination. Remote
/// edges are skipped. Flags in `dst` are only ever set.
///
/// # Errors
///
/// Returns [`EngineError::Representation`] unless `src` is sparse and `dst`
/// dense, or a precondition error if either does not match the partition
pub fn expand<F>(
    device: &Device,
    partition: &Partition,
    src: &VertexSubset,
    dst: &VertexSubset,
    decide: F,
) -> Result<()>
where
    F: Fn(VertexId, &Edge, usize) -> bool + Sync,
{
    src.require(Representation::Sparse, "expand")?;
    dst.require(Representation::Dense, "expand")?;
    check_universe(src, dst, "expand")?;
    if src.vertex_count != partition.vertex_count() {
        return Err(EngineError::precondition(
            "expand",
            format!(
                "frontier over {} vertices, partition has {}",
                src.vertex_count,
                partition.vertex_count()
            ),
        )
        .into());
    }

    let len = src.len();
    let queue = src.workqueue.device();
    let flags = dst.workset.device();
    let edges = partition.edges().device();
    device.launch("expand", len, |t| {
        for slot in t.grid_stride(len) {
            let source = queue.load(slot);
            for e in partition.edge_range(source as usize) {
                let edge = edges.load(e);
                if partition.is_local(&edge) && decide(source, &edge, e) {
                    flags.store(edge.local as usize, 1);
                }
            }
        }
    })?;
    Ok(())
}
