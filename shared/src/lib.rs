//! Shared types and utilities for rocpctl
//!
//! This crate contains the plain data structures used across the sampler
//! core, the run orchestrator and the CLI: agent descriptors, counter
//! identifiers, raw records and the serialized run report.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{agent::*, counter::*, report::*};
