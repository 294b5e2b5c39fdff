//! SPMD accelerator model
//!
//! A kernel launch spawns `blocks x threads_per_block` lightweight workers
//! that all run the same closure over different indices. The default device
//! executes the grid on a dedicated rayon pool, one block per task, and
//! returns only after every worker finished: each launch is followed by an
//! implicit device-wide synchronisation.
//!
//! # Architecture
//!
//! - `geometry`: launch geometry (`kernel_config`) and hardware limits
//! - `memory`: mirrored host/device buffers and device counters

mod geometry;
mod memory;

pub use geometry::{
    kernel_config, kernel_config_with, LaunchConfig, LaunchLimits, DEFAULT_THREADS_PER_BLOCK,
    MAX_BLOCKS, MAX_THREADS_PER_BLOCK,
};
pub use memory::{DeviceCounter, DeviceMemory, DeviceValue, MirroredBuffer};

use crate::EngineError;
use anyhow::Result;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{trace, warn};

/// Position of one worker inside a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadIndex {
    /// Block index within the grid
    pub block: usize,
    /// Thread index within the block
    pub thread: usize,
    /// Threads per block
    pub block_dim: usize,
    /// Blocks in the grid
    pub grid_dim: usize,
}

impl ThreadIndex {
    /// Flat worker id (`threadIdx.x + blockDim.x * blockIdx.x`)
    #[must_use]
    pub const fn global(&self) -> usize {
        self.thread + self.block_dim * self.block
    }

    /// Total workers in the grid
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.block_dim * self.grid_dim
    }

    /// Indices `< n` owned by this worker under a grid-stride loop
    pub fn grid_stride(self, n: usize) -> impl Iterator<Item = usize> {
        (self.global()..n).step_by(self.stride().max(1))
    }
}

/// Device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Block size used by every launch (shrunk for small launches)
    pub threads_per_block: usize,
    /// Hardware limits
    pub limits: LaunchLimits,
    /// Worker threads backing the grid (`None` = one per core)
    pub worker_threads: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            threads_per_block: DEFAULT_THREADS_PER_BLOCK,
            limits: LaunchLimits::default(),
            worker_threads: None,
        }
    }
}

impl DeviceConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block size
    #[must_use]
    pub const fn with_threads_per_block(mut self, threads_per_block: usize) -> Self {
        self.threads_per_block = threads_per_block;
        self
    }

    /// Set the hardware limits
    #[must_use]
    pub const fn with_limits(mut self, limits: LaunchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Pin the number of worker threads
    #[must_use]
    pub const fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Check the configuration against its own limits
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLaunch`] for an unusable block size or
    /// zero worker threads
    pub fn validate(&self) -> Result<()> {
        kernel_config_with(1, self.threads_per_block, &self.limits)?;
        if self.worker_threads == Some(0) {
            return Err(EngineError::InvalidLaunch("zero worker threads".to_string()).into());
        }
        Ok(())
    }
}

/// SPMD accelerator backed by a rayon thread pool
///
/// Cloning is cheap; clones share the pool.
///
/// # Example
///
/// ```
/// use trueno_frontier::{Device, MirroredBuffer};
///
/// let device = Device::new().unwrap();
/// let squares = MirroredBuffer::<u64>::reserve(1000).unwrap();
/// device
///     .launch("squares", 1000, |t| {
///         for i in t.grid_stride(1000) {
///             squares.device().store(i, (i * i) as u64);
///         }
///     })
///     .unwrap();
/// assert_eq!(squares.device().load(31), 961);
/// ```
#[derive(Debug, Clone)]
pub struct Device {
    config: DeviceConfig,
    pool: Arc<rayon::ThreadPool>,
}

impl Device {
    /// Device with the default configuration
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Device`] if the worker pool cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(DeviceConfig::default())
    }

    /// Device with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker pool
    /// cannot be created
    pub fn with_config(config: DeviceConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("trueno-frontier-worker-{index}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| EngineError::Device(e.to_string()))?;

        Ok(Self {
            config,
            pool: Arc::new(pool),
        })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Geometry a launch of `threads` workers would use
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLaunch`] for an unusable block size
    pub fn geometry(&self, threads: usize) -> Result<LaunchConfig> {
        kernel_config_with(threads, self.config.threads_per_block, &self.config.limits)
    }

    /// Launch `kernel` over `threads` logical workers and wait for it
    ///
    /// Zero threads launches nothing. When the grid is clamped the kernel
    /// must cover the remainder with [`ThreadIndex::grid_stride`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLaunch`] for an unusable block size
    pub fn launch<K>(&self, name: &'static str, threads: usize, kernel: K) -> Result<LaunchConfig>
    where
        K: Fn(ThreadIndex) + Sync,
    {
        let config = self.geometry(threads)?;
        if config.is_empty() {
            trace!(kernel = name, "empty launch skipped");
            return Ok(config);
        }
        if config.clamped {
            warn!(
                kernel = name,
                threads,
                blocks = config.blocks,
                "grid clamped to the block limit; workers stride over the remainder"
            );
        }
        trace!(
            kernel = name,
            threads,
            blocks = config.blocks,
            threads_per_block = config.threads_per_block,
            "launch"
        );

        let (grid_dim, block_dim) = config.as_pair();
        self.pool.install(|| {
            (0..grid_dim).into_par_iter().for_each(|block| {
                for thread in 0..block_dim {
                    kernel(ThreadIndex {
                        block,
                        thread,
                        block_dim,
                        grid_dim,
                    });
                }
            });
        });

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_launch_covers_every_index_once() {
        let device = Device::new().unwrap();
        let hits = MirroredBuffer::<u32>::reserve(1000).unwrap();
        device
            .launch("hits", 1000, |t| {
                for i in t.grid_stride(1000) {
                    hits.device().update(i, |v| v + 1);
                }
            })
            .unwrap();
        assert!(hits.device().snapshot().iter().all(|&v| v == 1));
    }

    #[test]
    fn test_clamped_grid_still_covers_all_work() {
        let limits = LaunchLimits {
            max_threads_per_block: 8,
            max_blocks: 3,
        };
        let config = DeviceConfig::new()
            .with_threads_per_block(8)
            .with_limits(limits)
            .with_worker_threads(2);
        let device = Device::with_config(config).unwrap();

        let count = AtomicUsize::new(0);
        let launched = device
            .launch("count", 100, |t| {
                for _ in t.grid_stride(100) {
                    count.fetch_add(1, Ordering::Relaxed);
                }
            })
            .unwrap();

        assert!(launched.clamped);
        assert_eq!(launched.total_threads(), 24);
        assert_eq!(count.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_empty_launch_runs_nothing() {
        let device = Device::new().unwrap();
        let ran = AtomicUsize::new(0);
        let config = device
            .launch("noop", 0, |_| {
                ran.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert!(config.is_empty());
        assert_eq!(ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_thread_index_math() {
        let t = ThreadIndex {
            block: 2,
            thread: 3,
            block_dim: 4,
            grid_dim: 5,
        };
        assert_eq!(t.global(), 11);
        assert_eq!(t.stride(), 20);
        assert_eq!(t.grid_stride(60).collect::<Vec<_>>(), vec![11, 31, 51]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DeviceConfig::new().with_threads_per_block(4096);
        assert!(Device::with_config(config).is_err());

        let config = DeviceConfig::new().with_worker_threads(0);
        assert!(config.validate().is_err());
    }
}
