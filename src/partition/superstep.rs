//! Per-partition superstep phases

use super::mailbox::{MessageBox, VertexMessage};
use super::Partition;
use crate::device::{Device, DeviceValue, MirroredBuffer};
use crate::engine::{EdgeContext, MessageContext};
use crate::frontier::{self, VertexSubset};
use crate::{EngineError, PartitionId, VertexId};
use anyhow::Result;
use tracing::debug;

/// One partition's state in the mailbox protocol
///
/// Holds the local vertex values, the active queue, the dense workset the
/// next queue is compacted from, and one outbox and one inbox per peer
/// partition. A superstep is [`expand`](Self::expand), an external
/// exchange, [`scatter`](Self::scatter), then [`compact`](Self::compact).
#[derive(Debug)]
pub struct PartitionWorker<V, M> {
    partition: Partition,
    values: MirroredBuffer<V>,
    active: VertexSubset,
    workset: VertexSubset,
    outboxes: Vec<MessageBox<VertexMessage<M>>>,
    inboxes: Vec<MessageBox<VertexMessage<M>>>,
}

impl<V, M> PartitionWorker<V, M>
where
    V: DeviceValue,
    M: DeviceValue,
{
    /// Worker for `partition` among `num_partitions` peers
    ///
    /// Every vertex starts at `initial`; each mailbox holds up to
    /// `mailbox_capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTopology`] if an edge names a partition
    /// `>= num_partitions`, or an allocation error
    pub fn new(
        partition: Partition,
        num_partitions: usize,
        mailbox_capacity: usize,
        initial: V,
    ) -> Result<Self> {
        if partition.id() as usize >= num_partitions {
            return Err(EngineError::InvalidTopology(format!(
                "partition {} of {num_partitions}",
                partition.id()
            ))
            .into());
        }
        if let Some(edge) = partition
            .edges()
            .host()
            .iter()
            .find(|edge| edge.partition as usize >= num_partitions)
        {
            return Err(EngineError::InvalidTopology(format!(
                "edge into partition {} of {num_partitions}",
                edge.partition
            ))
            .into());
        }

        let n = partition.vertex_count();
        let values = MirroredBuffer::from_slice(&vec![initial; n])?;

        // No mailbox to self
        let mailboxes = || {
            (0..num_partitions)
                .map(|peer| {
                    let capacity = if peer == partition.id() as usize {
                        0
                    } else {
                        mailbox_capacity
                    };
                    MessageBox::with_capacity(capacity)
                })
                .collect::<Result<Vec<_>>>()
        };

        Ok(Self {
            values,
            active: VertexSubset::sparse(n, n)?,
            workset: VertexSubset::dense(n)?,
            outboxes: mailboxes()?,
            inboxes: mailboxes()?,
            partition,
        })
    }

    /// Local topology
    #[must_use]
    pub const fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Vertices queued for the next expand
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Active queue
    #[must_use]
    pub const fn active(&self) -> &VertexSubset {
        &self.active
    }

    /// Queue a local vertex for the next expand
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VertexOutOfRange`] for unknown ids
    pub fn activate(&mut self, local: VertexId) -> Result<()> {
        self.active.activate(local)
    }

    /// Value of a local vertex (device copy)
    #[must_use]
    pub fn value(&self, local: VertexId) -> V {
        self.values.device().load(local as usize)
    }

    /// Overwrite a local vertex value on the device
    pub fn store(&self, local: VertexId, value: V) {
        self.values.device().store(local as usize, value);
    }

    /// Persist and return every local value
    pub fn collect_values(&mut self) -> Vec<V> {
        self.values.persist();
        self.values.host().to_vec()
    }

    /// Outbox addressed to `peer`
    pub fn outbox_mut(&mut self, peer: PartitionId) -> Option<&mut MessageBox<VertexMessage<M>>> {
        self.outboxes.get_mut(peer as usize)
    }

    /// Inbox filled by `peer`
    pub fn inbox_mut(&mut self, peer: PartitionId) -> Option<&mut MessageBox<VertexMessage<M>>> {
        self.inboxes.get_mut(peer as usize)
    }

    /// Messages waiting in all outboxes
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.outboxes.iter().map(MessageBox::len).sum()
    }

    /// Phase 1: push every active vertex along its out-edges
    ///
    /// Local destinations are updated in place and marked in the workset;
    /// remote destinations receive a packed message in the matching outbox.
    /// Local writes race when several sources reach one destination, so
    /// `ctx.update` must return the same value for every racer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityOverflow`] if an outbox fills up
    pub fn expand<C, X>(&mut self, device: &Device, ctx: &C, messages: &X) -> Result<()>
    where
        C: EdgeContext<V>,
        X: MessageContext<V, M>,
    {
        let len = self.active.len();
        let queue = self.active.workqueue();
        let flags = self.workset.workset();
        let values = self.values.device();
        let edges = self.partition.edges().device();
        let partition = &self.partition;
        let outboxes = &self.outboxes;

        device.launch("partition_expand", len, |t| {
            for slot in t.grid_stride(len) {
                let source = queue.load(slot) as usize;
                let source_value = values.load(source);
                for e in partition.edge_range(source) {
                    let edge = edges.load(e);
                    if partition.is_local(&edge) {
                        let dst = edge.local as usize;
                        if ctx.cond(values.load(dst)) {
                            values.store(dst, ctx.update(source_value));
                            flags.store(dst, 1);
                        }
                    } else {
                        outboxes[edge.partition as usize].push(VertexMessage {
                            receiver: edge.local,
                            value: messages.pack(source_value),
                        });
                    }
                }
            }
        })?;

        for outbox in &self.outboxes {
            outbox.check_overflow()?;
        }
        debug!(
            partition = self.partition.id(),
            active = len,
            outgoing = self.pending_messages(),
            "expand"
        );
        Ok(())
    }

    /// Phase 3: apply every inbox message like a local edge update
    ///
    /// Inboxes are empty afterwards.
    ///
    /// # Errors
    ///
    /// - [`EngineError::VertexOutOfRange`] if a message names a receiver this
    ///   partition does not own; nothing is applied and the inboxes are kept
    /// - error if the kernel launch is rejected
    pub fn scatter<C, X>(&mut self, device: &Device, ctx: &C, messages: &X) -> Result<()>
    where
        C: EdgeContext<V>,
        X: MessageContext<V, M>,
    {
        let n = self.partition.vertex_count();
        for inbox in &self.inboxes {
            let stray = (0..inbox.len())
                .map(|slot| inbox.get(slot).receiver)
                .find(|&receiver| receiver as usize >= n);
            if let Some(receiver) = stray {
                return Err(EngineError::vertex_out_of_range(receiver, n).into());
            }
        }

        let flags = self.workset.workset();
        let values = self.values.device();
        let mut received = 0;

        for inbox in &self.inboxes {
            let len = inbox.len();
            received += len;
            device.launch("partition_scatter", len, |t| {
                for slot in t.grid_stride(len) {
                    let message = inbox.get(slot);
                    let dst = message.receiver as usize;
                    if ctx.cond(values.load(dst)) {
                        values.store(dst, ctx.update(messages.unpack(message.value)));
                        flags.store(dst, 1);
                    }
                }
            })?;
        }
        for inbox in &mut self.inboxes {
            inbox.clear();
        }

        debug!(partition = self.partition.id(), received, "scatter");
        Ok(())
    }

    /// Phase 4: the workset becomes the next active queue
    ///
    /// Returns the new queue length.
    ///
    /// # Errors
    ///
    /// Returns error if the kernel launch is rejected
    pub fn compact(&mut self, device: &Device) -> Result<usize> {
        self.active.clear();
        let len = frontier::compact(device, &self.workset, &mut self.active)?;
        debug!(partition = self.partition.id(), len, "compact");
        Ok(len)
    }

    /// Release every buffer the worker owns
    pub fn release(&mut self) {
        self.values.release();
        self.active.release();
        self.workset.release();
        for mailbox in self.outboxes.iter_mut().chain(self.inboxes.iter_mut()) {
            mailbox.release();
        }
    }
}
