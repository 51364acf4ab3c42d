//! Error types for the sampler

use crate::backend::BackendError;
use rocpctl_shared::{AgentId, CounterId};
use std::fmt;

/// Step of the sampling protocol that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStage {
    Bind,
    Start,
    Read,
    Stop,
}

impl fmt::Display for SamplingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SamplingStage::Bind => "bind profile",
            SamplingStage::Start => "start context",
            SamplingStage::Read => "read records",
            SamplingStage::Stop => "stop context",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// Counter or dimension enumeration failed
    #[error("counter catalog query failed on {agent}: {source}")]
    Catalog {
        agent: AgentId,
        #[source]
        source: BackendError,
    },

    /// A counter's record count, or a profile's total, overflows `usize`
    #[error("record count of counter {counter} on {agent} overflows")]
    RecordCount { agent: AgentId, counter: CounterId },

    /// The counter set does not fit one hardware profile.
    ///
    /// The packer consumes this as a control-flow signal, so it never reaches
    /// callers of [`crate::CounterSampler::sample`]. Only the single-profile
    /// path returns it.
    #[error("counter set exceeds hardware capacity")]
    CapacityExceeded,

    /// Materializing a profile failed with a non-capacity status
    #[error("could not create profile on {agent}: {source}")]
    Configuration {
        agent: AgentId,
        #[source]
        source: BackendError,
    },

    /// A step of the acquire/wait/read/release sequence failed
    #[error("sampling failed on {agent} ({stage}): {source}")]
    Sampling {
        agent: AgentId,
        stage: SamplingStage,
        #[source]
        source: BackendError,
    },

    #[error("no GPU agents found")]
    NoAgents,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SamplerError {
    pub(crate) fn sampling(agent: AgentId, stage: SamplingStage, source: BackendError) -> Self {
        SamplerError::Sampling {
            agent,
            stage,
            source,
        }
    }
}
