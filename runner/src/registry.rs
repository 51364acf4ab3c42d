//! One sampling engine per GPU agent

use rocpctl_sampler::{Backend, CounterSampler, SamplerError, MAX_COUNTERS_PER_PROFILE};
use rocpctl_shared::AgentInfo;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A GPU agent and the engine that owns its context.
///
/// The mutex serializes sampling calls on the context.
#[derive(Clone)]
pub struct AgentSampler {
    pub info: AgentInfo,
    pub sampler: Arc<Mutex<CounterSampler>>,
}

pub struct SamplerRegistry {
    backend: Arc<dyn Backend>,
    samplers: Vec<AgentSampler>,
}

impl SamplerRegistry {
    /// Create an engine for every GPU agent, in enumeration order
    pub fn discover(backend: Arc<dyn Backend>) -> Result<Self, SamplerError> {
        Self::discover_with(backend, MAX_COUNTERS_PER_PROFILE)
    }

    /// Like [`SamplerRegistry::discover`] with a custom per-profile counter limit
    pub fn discover_with(
        backend: Arc<dyn Backend>,
        max_counters_per_profile: usize,
    ) -> Result<Self, SamplerError> {
        let gpus: Vec<AgentInfo> = backend
            .agents()?
            .into_iter()
            .filter(AgentInfo::is_gpu)
            .collect();

        if gpus.is_empty() {
            return Err(SamplerError::NoAgents);
        }

        // Engines built so far are torn down in reverse if a later one fails.
        let mut registry = Self {
            backend: backend.clone(),
            samplers: Vec::with_capacity(gpus.len()),
        };

        for info in gpus {
            debug!("Creating sampler for {} ({})", info.id, info.name);
            let sampler = CounterSampler::new(backend.clone(), info.id)?
                .with_max_per_profile(max_counters_per_profile);
            registry.samplers.push(AgentSampler {
                info,
                sampler: Arc::new(Mutex::new(sampler)),
            });
        }

        info!("Discovered {} GPU agents", registry.samplers.len());
        Ok(registry)
    }

    pub fn samplers(&self) -> &[AgentSampler] {
        &self.samplers
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentInfo> {
        self.samplers.iter().map(|s| &s.info)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

impl Drop for SamplerRegistry {
    fn drop(&mut self) {
        while let Some(entry) = self.samplers.pop() {
            debug!("Releasing sampler for {}", entry.info.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocpctl_sampler::sim::SimulatedBackend;
    use rocpctl_shared::AgentId;

    fn registry(sim: &Arc<SimulatedBackend>) -> Result<SamplerRegistry, SamplerError> {
        let backend: Arc<dyn Backend> = sim.clone();
        SamplerRegistry::discover(backend)
    }

    #[test]
    fn test_discovers_gpus_in_order() {
        let sim = Arc::new(
            SimulatedBackend::builder()
                .gpu(AgentId(4))
                .cpu(AgentId(0))
                .gpu(AgentId(2))
                .build(),
        );

        let registry = registry(&sim).unwrap();
        let ids: Vec<_> = registry.agents().map(|a| a.id).collect();
        assert_eq!(ids, vec![AgentId(4), AgentId(2)]);
        assert_eq!(sim.live_contexts(), 2);

        drop(registry);
        assert_eq!(sim.live_contexts(), 0);
    }

    #[test]
    fn test_no_gpu_agents() {
        let sim = Arc::new(SimulatedBackend::builder().cpu(AgentId(0)).build());
        assert!(matches!(registry(&sim), Err(SamplerError::NoAgents)));
    }

    #[test]
    fn test_enumeration_failure() {
        let sim = Arc::new(
            SimulatedBackend::builder()
                .gpu(AgentId(1))
                .fail_enumeration()
                .build(),
        );
        assert!(matches!(registry(&sim), Err(SamplerError::Backend(_))));
    }
}
