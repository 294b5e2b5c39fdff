//! Graph storage layer
//!
//! CSR ingestion for the engine and, with the `storage` feature, Parquet
//! persistence of partitions.

pub mod csr;
#[cfg(feature = "storage")]
pub mod parquet;

pub use csr::{CsrGraph, NodeId};
