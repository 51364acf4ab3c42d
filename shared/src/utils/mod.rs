//! Utility functions and helpers

pub mod time;

use anyhow::{bail, Result};
use std::time::Duration;

/// Parse a sampling window (e.g. "500us", "10ms", "2s", "1m").
///
/// A bare number is taken as microseconds, matching the `-d` flag of the
/// original command line tool.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        bail!("empty duration");
    }

    if let Some(num_str) = s.strip_suffix("us") {
        let micros: u64 = num_str.trim().parse()?;
        Ok(Duration::from_micros(micros))
    } else if let Some(num_str) = s.strip_suffix("ms") {
        let millis: u64 = num_str.trim().parse()?;
        Ok(Duration::from_millis(millis))
    } else if let Some(num_str) = s.strip_suffix('s') {
        let secs: u64 = num_str.trim().parse()?;
        Ok(Duration::from_secs(secs))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let mins: u64 = num_str.trim().parse()?;
        Ok(Duration::from_secs(mins * 60))
    } else {
        let micros: u64 = s.parse()?;
        Ok(Duration::from_micros(micros))
    }
}
