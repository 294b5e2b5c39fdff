//! Mirrored host/device memory
//!
//! Every buffer exists twice: a plain host `Vec<T>` and a device array that
//! parallel workers read and write concurrently. The copies diverge freely;
//! [`MirroredBuffer::cache`] and [`MirroredBuffer::persist`] synchronise them
//! explicitly, one direction at a time.

use crate::EngineError;
use anyhow::Result;
use crossbeam_utils::atomic::AtomicCell;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Element types that can live in device memory
pub trait DeviceValue: Copy + Default + Send + Sync + 'static {}

impl<T: Copy + Default + Send + Sync + 'static> DeviceValue for T {}

/// Cell payload compared by bit pattern, so CAS works for floats too
#[derive(Clone, Copy, Default)]
#[repr(transparent)]
struct Word<T>(T);

impl<T: bytemuck::Pod> PartialEq for Word<T> {
    fn eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(&self.0) == bytemuck::bytes_of(&other.0)
    }
}

impl<T: bytemuck::Pod> Eq for Word<T> {}

/// Accelerator-side array
///
/// Shared references are enough to write: kernels borrow several buffers at
/// once and mutate them from many workers.
pub struct DeviceMemory<T> {
    cells: Box<[AtomicCell<Word<T>>]>,
}

impl<T: DeviceValue> DeviceMemory<T> {
    fn allocate(len: usize, value: T) -> Result<Self> {
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| allocation_error::<T>(len))?;
        cells.extend((0..len).map(|_| AtomicCell::new(Word(value))));
        Ok(Self {
            cells: cells.into_boxed_slice(),
        })
    }

    fn empty() -> Self {
        Self {
            cells: Box::default(),
        }
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if the array holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read one element
    #[inline]
    #[must_use]
    pub fn load(&self, index: usize) -> T {
        self.cells[index].load().0
    }

    /// Write one element
    #[inline]
    pub fn store(&self, index: usize, value: T) {
        self.cells[index].store(Word(value));
    }

    /// Write one element, returning the previous value
    #[inline]
    pub fn swap(&self, index: usize, value: T) -> T {
        self.cells[index].swap(Word(value)).0
    }

    /// Set every element to `value`
    pub fn fill(&self, value: T) {
        for cell in &*self.cells {
            cell.store(Word(value));
        }
    }

    /// Copy the whole array out
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.cells.iter().map(|cell| cell.load().0).collect()
    }
}

impl<T: DeviceValue + bytemuck::Pod> DeviceMemory<T> {
    /// Atomic read-modify-write, returning the stored result
    ///
    /// Retries until no other worker raced in between, so every contribution
    /// is applied exactly once.
    #[inline]
    pub fn update<F>(&self, index: usize, f: F) -> T
    where
        F: Fn(T) -> T,
    {
        let cell = &self.cells[index];
        let mut current = cell.load();
        loop {
            let next = Word(f(current.0));
            match cell.compare_exchange(current, next) {
                Ok(_) => return next.0,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T> fmt::Debug for DeviceMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("len", &self.cells.len())
            .finish()
    }
}

/// Fixed-capacity array mirrored in host and device memory
///
/// Ownership is singular: the buffer is neither `Clone` nor shared, and
/// [`release`](Self::release) (or `Drop`) frees both copies.
///
/// # Example
///
/// ```
/// use trueno_frontier::MirroredBuffer;
///
/// let mut buffer = MirroredBuffer::<u32>::reserve(4).unwrap();
/// buffer.set(2, 7);
/// buffer.cache();
/// assert_eq!(buffer.device().load(2), 7);
///
/// buffer.device().store(0, 3);
/// buffer.persist();
/// assert_eq!(buffer[0], 3);
/// ```
pub struct MirroredBuffer<T> {
    host: Vec<T>,
    device: DeviceMemory<T>,
}

impl<T: DeviceValue> MirroredBuffer<T> {
    /// Allocate `capacity` default-initialised elements on host and device
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] if either copy cannot be allocated
    pub fn reserve(capacity: usize) -> Result<Self> {
        let mut host = Vec::new();
        host.try_reserve_exact(capacity)
            .map_err(|_| allocation_error::<T>(capacity))?;
        host.resize(capacity, T::default());

        let device = DeviceMemory::allocate(capacity, T::default())?;

        Ok(Self { host, device })
    }

    /// Allocate and fill from `values`, synchronised on both sides
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] if allocation fails
    pub fn from_slice(values: &[T]) -> Result<Self> {
        let mut buffer = Self::reserve(values.len())?;
        buffer.host.copy_from_slice(values);
        buffer.cache();
        Ok(buffer)
    }

    /// Number of elements
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.host.len()
    }

    /// True if the buffer holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Read element `index` of the host copy
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> T {
        debug_assert!(
            index < self.capacity(),
            "mirrored buffer index {index} out of bounds for capacity {}",
            self.capacity()
        );
        self.host[index]
    }

    /// Write element `index` of the host copy
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        debug_assert!(
            index < self.capacity(),
            "mirrored buffer index {index} out of bounds for capacity {}",
            self.capacity()
        );
        self.host[index] = value;
    }

    /// Host copy
    #[must_use]
    pub fn host(&self) -> &[T] {
        &self.host
    }

    /// Mutable host copy
    pub fn host_mut(&mut self) -> &mut [T] {
        &mut self.host
    }

    /// Device copy
    #[must_use]
    pub const fn device(&self) -> &DeviceMemory<T> {
        &self.device
    }

    /// Fill the device copy without a host round-trip
    pub fn all_to(&self, value: T) {
        self.device.fill(value);
    }

    /// Copy host to device
    pub fn cache(&mut self) {
        for (index, value) in self.host.iter().enumerate() {
            self.device.store(index, *value);
        }
    }

    /// Copy device to host
    pub fn persist(&mut self) {
        for (index, slot) in self.host.iter_mut().enumerate() {
            *slot = self.device.load(index);
        }
    }

    /// Release host and device storage
    ///
    /// The buffer has zero capacity afterwards; releasing twice is a no-op.
    pub fn release(&mut self) {
        self.host = Vec::new();
        self.device = DeviceMemory::empty();
    }
}

impl<T: DeviceValue> Index<usize> for MirroredBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        debug_assert!(
            index < self.capacity(),
            "mirrored buffer index {index} out of bounds for capacity {}",
            self.capacity()
        );
        &self.host[index]
    }
}

impl<T: DeviceValue> IndexMut<usize> for MirroredBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(
            index < self.capacity(),
            "mirrored buffer index {index} out of bounds for capacity {}",
            self.capacity()
        );
        &mut self.host[index]
    }
}

impl<T> fmt::Debug for MirroredBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirroredBuffer")
            .field("capacity", &self.host.len())
            .finish()
    }
}

/// Scalar counter mirrored in host and device memory
///
/// Kernels append through [`claim`](Self::claim); the host reads the result
/// back with [`persist`](Self::persist).
#[derive(Debug, Default)]
pub struct DeviceCounter {
    host: usize,
    device: AtomicUsize,
    overflowed: AtomicBool,
}

impl DeviceCounter {
    /// Counter at zero on both sides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host copy
    #[must_use]
    pub const fn get(&self) -> usize {
        self.host
    }

    /// Overwrite the host copy
    pub fn set(&mut self, value: usize) {
        self.host = value;
    }

    /// Device copy, read directly
    #[must_use]
    pub fn load(&self) -> usize {
        self.device.load(Ordering::Acquire)
    }

    /// Copy host to device
    pub fn cache(&mut self) {
        self.device.store(self.host, Ordering::Release);
    }

    /// Copy device to host, returning the value
    pub fn persist(&mut self) -> usize {
        self.host = self.device.load(Ordering::Acquire);
        self.host
    }

    /// Zero both copies and clear the overflow flag
    pub fn reset(&mut self) {
        self.host = 0;
        self.device.store(0, Ordering::Release);
        self.overflowed.store(false, Ordering::Release);
    }

    /// Claim the next free slot below `capacity`
    ///
    /// Every successful claim is unique. The counter never exceeds `capacity`;
    /// a claim past it returns `None` and raises the overflow flag.
    #[inline]
    pub fn claim(&self, capacity: usize) -> Option<usize> {
        let claimed = self
            .device
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            });
        if let Ok(slot) = claimed {
            Some(slot)
        } else {
            self.overflowed.store(true, Ordering::Release);
            None
        }
    }

    /// Whether a claim failed since the last reset
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }
}

fn allocation_error<T>(count: usize) -> EngineError {
    EngineError::Allocation {
        count,
        bytes: count.saturating_mul(std::mem::size_of::<T>()),
    }
}
