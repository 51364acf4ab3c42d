//! Capability contract of the vendor profiling layer
//!
//! Everything the sampler needs from the device side goes through
//! [`Backend`]. Implementations must be thread-safe: one backend instance is
//! shared by the engines of every agent.

use rocpctl_shared::{AgentId, AgentInfo, CounterId, Dimension, DimensionId, Record};
use std::fmt;

/// Raw hardware configuration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId(pub u64);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config-{}", self.0)
    }
}

/// Per-agent sampling context handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Non-success status reported by the profiling layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {code})")]
pub struct BackendError {
    pub code: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result of trying to materialize a configuration for a set of counters
#[derive(Debug)]
pub enum ConfigureOutcome {
    /// The hardware accepted the set
    Configured(ConfigId),

    /// The set does not fit the hardware's counter resources
    CapacityExceeded,

    /// Any other status
    Failed(BackendError),
}

/// Vendor profiling layer
pub trait Backend: Send + Sync {
    /// Enumerate every agent on the system, GPU or not
    fn agents(&self) -> Result<Vec<AgentInfo>, BackendError>;

    /// Counters the agent's firmware exposes
    fn supported_counters(&self, agent: AgentId) -> Result<Vec<CounterId>, BackendError>;

    /// Human-readable counter name
    fn counter_name(&self, counter: CounterId) -> Result<String, BackendError>;

    /// Dimensional decomposition of a counter, in reporting order
    fn counter_dimensions(&self, counter: CounterId) -> Result<Vec<Dimension>, BackendError>;

    /// Position of `record` along `dimension`
    fn dimension_position(
        &self,
        record: &Record,
        dimension: DimensionId,
    ) -> Result<usize, BackendError>;

    /// Feasibility oracle: attempt a real allocation for exactly `counters`
    fn try_configure(&self, agent: AgentId, counters: &[CounterId]) -> ConfigureOutcome;

    /// Release a configuration returned by [`Backend::try_configure`]
    fn destroy_config(&self, config: ConfigId);

    /// Create the agent's sampling context
    fn create_context(&self, agent: AgentId) -> Result<ContextId, BackendError>;

    /// Tear down a context created by [`Backend::create_context`]
    fn destroy_context(&self, context: ContextId);

    /// Make `config` the configuration armed on the next start
    fn bind_config(&self, context: ContextId, config: ConfigId) -> Result<(), BackendError>;

    fn start_context(&self, context: ContextId) -> Result<(), BackendError>;

    fn stop_context(&self, context: ContextId) -> Result<(), BackendError>;

    /// Read accumulated records into `buffer`, returning how many were written.
    ///
    /// The count may be lower than `buffer.len()`.
    fn read_records(
        &self,
        context: ContextId,
        buffer: &mut [Record],
    ) -> Result<usize, BackendError>;

    /// True when values are generated in-process rather than read from hardware
    fn simulated(&self) -> bool {
        false
    }
}
