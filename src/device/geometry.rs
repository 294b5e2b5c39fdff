//! Kernel launch geometry
//!
//! Maps a required worker count onto a one-dimensional grid of thread blocks.
//!
//! # Scaling boundary
//!
//! The block count is clamped to [`MAX_BLOCKS`]. Once `threads` exceeds
//! `max_blocks * threads_per_block` the grid no longer has one worker per
//! logical unit; every kernel in this crate iterates with
//! [`ThreadIndex::grid_stride`](super::ThreadIndex::grid_stride) so the
//! surplus is folded onto existing workers instead of being dropped.

use crate::EngineError;
use anyhow::Result;

/// Default threads per block
pub const DEFAULT_THREADS_PER_BLOCK: usize = 256;

/// Architecture limit on threads per block (sm3.5 class hardware)
pub const MAX_THREADS_PER_BLOCK: usize = 1024;

/// Architecture limit on blocks per grid dimension
pub const MAX_BLOCKS: usize = 65535;

/// Hardware limits the geometry is computed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchLimits {
    /// Upper bound for `threads_per_block`
    pub max_threads_per_block: usize,
    /// Upper bound for the block count
    pub max_blocks: usize,
}

impl Default for LaunchLimits {
    fn default() -> Self {
        Self {
            max_threads_per_block: MAX_THREADS_PER_BLOCK,
            max_blocks: MAX_BLOCKS,
        }
    }
}

/// Grid shape for one kernel launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Number of thread blocks
    pub blocks: usize,
    /// Threads in each block
    pub threads_per_block: usize,
    /// Whether the block count hit the limit
    pub clamped: bool,
}

impl LaunchConfig {
    /// Geometry of a launch that does nothing
    pub const EMPTY: Self = Self {
        blocks: 0,
        threads_per_block: 0,
        clamped: false,
    };

    /// True when no worker will run
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.blocks == 0
    }

    /// Total workers spawned
    #[must_use]
    pub const fn total_threads(&self) -> usize {
        self.blocks * self.threads_per_block
    }

    /// `(blocks, threads_per_block)` pair
    #[must_use]
    pub const fn as_pair(&self) -> (usize, usize) {
        (self.blocks, self.threads_per_block)
    }
}

/// Geometry for `threads` workers with the default block size and limits
#[must_use]
pub fn kernel_config(threads: usize) -> LaunchConfig {
    // The default block size is always within the default limits.
    shape(threads, DEFAULT_THREADS_PER_BLOCK, LaunchLimits::default().max_blocks)
}

/// Geometry for `threads` workers with an explicit block-size hint
///
/// # Errors
///
/// Returns [`EngineError::InvalidLaunch`] if the hint is zero or above
/// `limits.max_threads_per_block`.
pub fn kernel_config_with(
    threads: usize,
    threads_per_block: usize,
    limits: &LaunchLimits,
) -> Result<LaunchConfig> {
    if threads_per_block == 0 || threads_per_block > limits.max_threads_per_block {
        return Err(EngineError::InvalidLaunch(format!(
            "{threads_per_block} threads per block (limit {})",
            limits.max_threads_per_block
        ))
        .into());
    }
    if limits.max_blocks == 0 {
        return Err(EngineError::InvalidLaunch("max_blocks is zero".to_string()).into());
    }
    Ok(shape(threads, threads_per_block, limits.max_blocks))
}

fn shape(threads: usize, threads_per_block: usize, max_blocks: usize) -> LaunchConfig {
    if threads == 0 {
        return LaunchConfig::EMPTY;
    }

    let threads_per_block = threads_per_block.min(threads);
    let blocks = threads.div_ceil(threads_per_block);

    LaunchConfig {
        blocks: blocks.min(max_blocks),
        threads_per_block,
        clamped: blocks > max_blocks,
    }
}
