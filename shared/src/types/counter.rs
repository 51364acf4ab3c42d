//! Counter, dimension and record types
//!
//! These mirror what the profiling layer reports about hardware counters.
//! Ids are opaque and only meaningful for the device that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device-scoped counter identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterId(pub u64);

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Dimension identifier (scoped to a counter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionId(pub u64);

/// A named axis over which a counter is replicated (e.g. per compute unit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: DimensionId,

    /// Axis name, e.g. "XCC", "SE", "CU"
    pub name: String,

    /// Number of instances along this axis
    pub instance_size: u64,
}

/// A hardware counter with its dimensional decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: CounterId,
    pub name: String,
    pub dimensions: Vec<Dimension>,
}

impl Counter {
    /// Number of records one sampling pass produces for this counter
    pub fn record_count(&self) -> usize {
        record_count(&self.dimensions)
    }
}

/// Product of all dimension sizes, 1 for a dimensionless counter.
///
/// A zero-sized dimension is reported by some firmware for axes that are
/// not populated; it is treated as a single instance so the count never
/// drops to zero. Returns `None` when the product does not fit a `usize`.
pub fn checked_record_count(dimensions: &[Dimension]) -> Option<usize> {
    dimensions.iter().try_fold(1usize, |count, d| {
        let size = usize::try_from(d.instance_size.max(1)).ok()?;
        count.checked_mul(size)
    })
}

/// Like [`checked_record_count`], saturating at `usize::MAX`
pub fn record_count(dimensions: &[Dimension]) -> usize {
    checked_record_count(dimensions).unwrap_or(usize::MAX)
}

/// One raw sampled value
///
/// `instance` is the profiling layer's record id. It encodes the record's
/// position along every dimension of `counter` and is decoded on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub instance: u64,
    pub counter: CounterId,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(id: u64, name: &str, size: u64) -> Dimension {
        Dimension {
            id: DimensionId(id),
            name: name.to_string(),
            instance_size: size,
        }
    }

    #[test]
    fn test_record_count_dimensionless() {
        assert_eq!(record_count(&[]), 1);
    }

    #[test]
    fn test_record_count_product() {
        let dims = vec![dim(0, "XCC", 8), dim(1, "SE", 4), dim(2, "CU", 10)];
        assert_eq!(record_count(&dims), 320);
    }

    #[test]
    fn test_record_count_zero_sized_dimension() {
        let dims = vec![dim(0, "XCC", 0), dim(1, "SE", 4)];
        assert_eq!(record_count(&dims), 4);
    }

    #[test]
    fn test_record_count_overflow() {
        let dims = vec![dim(0, "XCC", u64::MAX), dim(1, "SE", 4)];
        assert_eq!(checked_record_count(&dims), None);
        assert_eq!(record_count(&dims), usize::MAX);
        assert_eq!(checked_record_count(&dims[1..]), Some(4));
    }

    #[test]
    fn test_counter_record_count() {
        let counter = Counter {
            id: CounterId(3),
            name: "SQ_WAVES".to_string(),
            dimensions: vec![dim(0, "XCC", 2)],
        };
        assert_eq!(counter.record_count(), 2);
    }

    #[test]
    fn test_counter_id_display() {
        assert_eq!(CounterId(255).to_string(), "0xff");
    }
}
