//! Command implementations

pub mod agents;
pub mod counters;
pub mod sample;
