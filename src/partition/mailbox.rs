//! Cross-partition message boxes

use crate::device::{DeviceCounter, DeviceValue, MirroredBuffer};
use crate::{EngineError, VertexId};
use anyhow::Result;

/// Update addressed to a vertex of another partition
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexMessage<M> {
    /// Receiver id, local to the destination partition
    pub receiver: VertexId,
    /// Packed value
    pub value: M,
}

/// Fixed-capacity append buffer with an atomic length
///
/// One box exists per ordered partition pair: the sender's outbox is
/// exchanged into the receiver's inbox between supersteps.
#[derive(Debug)]
pub struct MessageBox<T> {
    buffer: MirroredBuffer<T>,
    len: DeviceCounter,
}

impl<T: DeviceValue> MessageBox<T> {
    /// Empty box holding at most `capacity` messages
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] if the buffer cannot be allocated
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            buffer: MirroredBuffer::reserve(capacity)?,
            len: DeviceCounter::new(),
        })
    }

    /// Provisioned capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Messages currently held (device counter)
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load()
    }

    /// True if the box holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append from a kernel
    ///
    /// Returns `false` and raises the overflow flag when the box is full; the
    /// length never exceeds the capacity.
    #[inline]
    pub fn push(&self, message: T) -> bool {
        match self.len.claim(self.buffer.capacity()) {
            Some(slot) => {
                self.buffer.device().store(slot, message);
                true
            }
            None => false,
        }
    }

    /// Message in `slot`, read from device memory
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> T {
        self.buffer.device().load(slot)
    }

    /// Drop every message and clear the overflow flag
    pub fn clear(&mut self) {
        self.len.reset();
    }

    /// Persist the box and return its messages
    pub fn messages(&mut self) -> &[T] {
        let len = self.len.persist();
        self.buffer.persist();
        &self.buffer.host()[..len]
    }

    /// Replace the contents with `messages` (host → device)
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityOverflow`] if `messages` does not fit
    pub fn load_from(&mut self, messages: &[T]) -> Result<()> {
        if messages.len() > self.capacity() {
            return Err(EngineError::CapacityOverflow {
                buffer: "mailbox",
                capacity: self.capacity(),
            }
            .into());
        }
        self.buffer.host_mut()[..messages.len()].copy_from_slice(messages);
        self.buffer.cache();
        self.len.reset();
        self.len.set(messages.len());
        self.len.cache();
        Ok(())
    }

    /// Fail if a push was rejected since the last clear
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CapacityOverflow`]
    pub fn check_overflow(&self) -> Result<()> {
        if self.len.overflowed() {
            return Err(EngineError::CapacityOverflow {
                buffer: "mailbox",
                capacity: self.capacity(),
            }
            .into());
        }
        Ok(())
    }

    /// Release the buffer
    pub fn release(&mut self) {
        self.buffer.release();
        self.len.reset();
    }
}
