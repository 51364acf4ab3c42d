//! Data types shared across crates

pub mod agent;
pub mod counter;
pub mod report;
