//! Agent (device) descriptors
//!
//! An agent is one device exposed by the profiling layer. Only GPU agents
//! are sampled; CPU agents show up in enumeration and are filtered out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque device handle assigned by the profiling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Device class reported during enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentKind {
    Cpu,
    Gpu,
}

/// Everything the orchestrator needs to know about one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Stable identifier used for every backend call
    pub id: AgentId,

    /// Device class
    pub kind: AgentKind,

    /// Marketing or architecture name (e.g. "gfx942")
    pub name: String,

    /// KFD gpu id, reported verbatim
    pub gpu_id: u64,

    /// DRM render node minor number
    pub drm_render_minor: u32,

    /// Logical node index
    pub logical_node_id: u32,
}

impl AgentInfo {
    /// Check whether this agent is a compute accelerator
    pub fn is_gpu(&self) -> bool {
        self.kind == AgentKind::Gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_gpu() {
        let mut agent = AgentInfo {
            id: AgentId(1),
            kind: AgentKind::Gpu,
            name: "gfx942".to_string(),
            gpu_id: 1234,
            drm_render_minor: 128,
            logical_node_id: 1,
        };
        assert!(agent.is_gpu());

        agent.kind = AgentKind::Cpu;
        assert!(!agent.is_gpu());
    }

    #[test]
    fn test_agent_id_display() {
        assert_eq!(AgentId(7).to_string(), "agent-7");
    }
}
