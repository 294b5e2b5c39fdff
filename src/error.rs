//! Engine error taxonomy
//!
//! Public APIs return `anyhow::Result`; every failure the engine raises on its
//! own is an [`EngineError`], so callers can `downcast_ref` to branch on kind.

use crate::frontier::Representation;
use thiserror::Error;

/// Errors raised by the frontier engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A frontier was passed in the wrong representation
    #[error("precondition violated in {operation}: expected a {expected} frontier, found {found}")]
    Representation {
        /// Operation that checked the precondition
        operation: &'static str,
        /// Representation the operation requires
        expected: Representation,
        /// Representation it was given
        found: Representation,
    },

    /// Any other caller contract violation
    #[error("precondition violated in {operation}: {reason}")]
    Precondition {
        /// Operation that checked the precondition
        operation: &'static str,
        /// What was wrong
        reason: String,
    },

    /// A queue or mailbox ran out of provisioned slots
    #[error("{buffer} overflowed its capacity of {capacity} entries")]
    CapacityOverflow {
        /// Buffer that overflowed
        buffer: &'static str,
        /// Provisioned capacity
        capacity: usize,
    },

    /// Vertex identifier outside `0..vertex_count`
    #[error("vertex {vertex} out of range for {vertex_count} vertices")]
    VertexOutOfRange {
        /// Offending vertex id
        vertex: u64,
        /// Number of vertices in scope
        vertex_count: usize,
    },

    /// Host or device allocation failed
    #[error("failed to allocate {count} elements ({bytes} bytes)")]
    Allocation {
        /// Requested element count
        count: usize,
        /// Requested size in bytes
        bytes: usize,
    },

    /// Launch geometry the device cannot honour
    #[error("invalid kernel launch: {0}")]
    InvalidLaunch(String),

    /// Malformed CSR or partition topology
    #[error("invalid graph topology: {0}")]
    InvalidTopology(String),

    /// Accelerator runtime failure
    #[error("device error: {0}")]
    Device(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::Precondition`]
    pub(crate) fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Precondition {
            operation,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EngineError::VertexOutOfRange`]
    pub(crate) fn vertex_out_of_range(vertex: u32, vertex_count: usize) -> Self {
        Self::VertexOutOfRange {
            vertex: u64::from(vertex),
            vertex_count,
        }
    }
}
