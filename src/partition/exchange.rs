//! Mailbox transport and the superstep driver

use super::superstep::PartitionWorker;
use crate::device::{Device, DeviceValue};
use crate::engine::{EdgeContext, MessageContext};
use crate::PartitionId;
use anyhow::{anyhow, Result};
use tracing::{debug, info};

/// Moves every outbox into the matching inbox of its destination
///
/// Runs between expand and scatter; when it returns, every message sent
/// this superstep must be visible in an inbox and every outbox empty.
pub trait Exchange<V, M> {
    /// Transport all pending messages
    ///
    /// # Errors
    ///
    /// Returns error if a message cannot be delivered
    fn exchange(&mut self, workers: &mut [PartitionWorker<V, M>]) -> Result<()>;
}

/// In-process exchange through host memory
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExchange;

impl<V, M> Exchange<V, M> for LocalExchange
where
    V: DeviceValue,
    M: DeviceValue,
{
    #[allow(clippy::cast_possible_truncation)] // partition counts fit in u32
    fn exchange(&mut self, workers: &mut [PartitionWorker<V, M>]) -> Result<()> {
        let count = workers.len();
        for sender in 0..count {
            for receiver in (0..count).filter(|&r| r != sender) {
                let (from, to) = (sender as PartitionId, receiver as PartitionId);

                let outbox = workers[sender]
                    .outbox_mut(to)
                    .ok_or_else(|| anyhow!("partition {from} has no outbox for {to}"))?;
                let messages = outbox.messages().to_vec();
                outbox.clear();

                workers[receiver]
                    .inbox_mut(from)
                    .ok_or_else(|| anyhow!("partition {to} has no inbox for {from}"))?
                    .load_from(&messages)?;
            }
        }
        Ok(())
    }
}

/// Outcome of [`run_supersteps`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuperstepStats {
    /// Supersteps executed
    pub supersteps: usize,
    /// Active vertices summed over partitions at the start of each superstep
    pub frontier_sizes: Vec<usize>,
    /// Messages sent across partitions
    pub messages: usize,
}

/// Run supersteps until every partition's queue is empty
///
/// Workers must be ordered by partition id. `max_supersteps` bounds the
/// loop for algorithms that may not converge.
///
/// # Errors
///
/// Propagates the first phase or exchange failure
pub fn run_supersteps<V, M, C, X, T>(
    device: &Device,
    workers: &mut [PartitionWorker<V, M>],
    ctx: &C,
    messages: &X,
    exchange: &mut T,
    max_supersteps: Option<usize>,
) -> Result<SuperstepStats>
where
    V: DeviceValue,
    M: DeviceValue,
    C: EdgeContext<V>,
    X: MessageContext<V, M>,
    T: Exchange<V, M>,
{
    let mut stats = SuperstepStats::default();
    let mut active: usize = workers.iter().map(PartitionWorker::active_len).sum();

    while active > 0 {
        if max_supersteps.is_some_and(|limit| stats.supersteps >= limit) {
            debug!(supersteps = stats.supersteps, active, "superstep limit reached");
            break;
        }
        stats.frontier_sizes.push(active);

        for worker in workers.iter_mut() {
            worker.expand(device, ctx, messages)?;
        }
        let sent: usize = workers.iter().map(PartitionWorker::pending_messages).sum();
        stats.messages += sent;

        exchange.exchange(workers)?;

        for worker in workers.iter_mut() {
            worker.scatter(device, ctx, messages)?;
        }

        active = 0;
        for worker in workers.iter_mut() {
            active += worker.compact(device)?;
        }
        stats.supersteps += 1;
        debug!(superstep = stats.supersteps, sent, active, "superstep finished");
    }

    info!(
        supersteps = stats.supersteps,
        messages = stats.messages,
        "superstep loop finished"
    );
    Ok(stats)
}
