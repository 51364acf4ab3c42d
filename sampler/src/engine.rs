//! Per-agent sampling engine
//!
//! A [`CounterSampler`] owns the single hardware context of one agent. Each
//! sampling call resolves the requested counters to a cached profile set and
//! executes its profiles one after another: bind, start, wait, read, stop,
//! then decode and aggregate the records by counter name.

use crate::backend::{Backend, ConfigureOutcome, ContextId};
use crate::cache::{CacheStats, ProfileCache};
use crate::catalog::CounterCatalog;
use crate::error::{SamplerError, SamplingStage};
use crate::handle::ConfigHandle;
use crate::packer::{Packer, MAX_COUNTERS_PER_PROFILE};
use crate::profile::{Profile, ProfileSet};
use crate::Result;
use rocpctl_shared::{AgentId, Counter, Record};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Aggregated result of one [`CounterSampler::sample`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleOutput {
    /// Counter name to value summed over all of its dimensions
    pub values: BTreeMap<String, f64>,

    /// Requested names the agent does not expose
    pub unsupported: Vec<String>,

    /// Supported names that could not be placed in any profile
    pub unpackable: Vec<String>,

    /// Number of profiles executed
    pub profiles: usize,
}

pub struct CounterSampler {
    backend: Arc<dyn Backend>,
    agent: AgentId,
    context: ContextId,
    catalog: CounterCatalog,
    cache: ProfileCache,
    max_per_profile: usize,
}

impl CounterSampler {
    /// Create the sampling context for `agent`
    pub fn new(backend: Arc<dyn Backend>, agent: AgentId) -> Result<Self> {
        let context = backend.create_context(agent)?;
        debug!("Created {} for {}", context, agent);

        Ok(Self {
            catalog: CounterCatalog::new(backend.clone(), agent),
            backend,
            agent,
            context,
            cache: ProfileCache::new(),
            max_per_profile: MAX_COUNTERS_PER_PROFILE,
        })
    }

    /// Override the static per-profile counter limit used when packing
    pub fn with_max_per_profile(mut self, max_per_profile: usize) -> Self {
        self.max_per_profile = max_per_profile;
        self
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Every counter the agent exposes, sorted by name
    pub fn supported_counters(&mut self) -> Result<Vec<Counter>> {
        self.catalog.describe()
    }

    /// Position of `record` along each dimension of its counter
    pub fn record_dimensions(&mut self, record: &Record) -> Result<HashMap<String, usize>> {
        self.catalog.record_dimensions(record)
    }

    /// Packed profiles for `counters`, built on first request and cached
    /// under the sorted name list afterwards
    pub fn profile_set(&mut self, counters: &[String]) -> Result<Arc<ProfileSet>> {
        let packer = Packer::new(self.backend.clone(), self.agent)
            .with_max_per_profile(self.max_per_profile);
        let catalog = &mut self.catalog;

        self.cache
            .get_or_create_set(counters, |key| packer.pack(catalog, key))
    }

    /// Sample `counters` over a window of `duration` per profile
    pub fn sample(&mut self, counters: &[String], duration: Duration) -> Result<SampleOutput> {
        let set = self.profile_set(counters)?;
        let values = self.sample_profile_set(&set, duration)?;

        Ok(SampleOutput {
            values,
            unsupported: set.unsupported.clone(),
            unpackable: set.unpackable.clone(),
            profiles: set.len(),
        })
    }

    /// Execute every profile of `set` in order and aggregate the records.
    ///
    /// The first failing profile aborts the call; values gathered from
    /// earlier profiles are discarded.
    pub fn sample_profile_set(
        &mut self,
        set: &ProfileSet,
        duration: Duration,
    ) -> Result<BTreeMap<String, f64>> {
        let mut values = BTreeMap::new();

        for (index, profile) in set.profiles.iter().enumerate() {
            trace!(
                "Sampling profile {}/{} on {}",
                index + 1,
                set.len(),
                self.agent
            );
            let records = self.run_profile(profile, duration)?;

            for record in &records {
                let name = self.catalog.decode_name(record);
                *values.entry(name.to_string()).or_insert(0.0) += record.value;
            }
        }

        Ok(values)
    }

    /// Sample `counters` as a single profile and return the raw records.
    ///
    /// Unsupported names are skipped. The profile is cached under the exact
    /// list as given, so a reordered list builds a new one.
    pub fn sample_records(
        &mut self,
        counters: &[String],
        duration: Duration,
    ) -> Result<Vec<Record>> {
        let backend = self.backend.clone();
        let agent = self.agent;
        let catalog = &mut self.catalog;

        let profile = self.cache.get_or_create_single(counters, |names| {
            single_profile(backend, agent, catalog, names)
        })?;

        self.run_profile(&profile, duration)
    }

    fn run_profile(&self, profile: &Profile, duration: Duration) -> Result<Vec<Record>> {
        let agent = self.agent;

        self.backend
            .bind_config(self.context, profile.config.id())
            .map_err(|e| SamplerError::sampling(agent, SamplingStage::Bind, e))?;
        self.backend
            .start_context(self.context)
            .map_err(|e| SamplerError::sampling(agent, SamplingStage::Start, e))?;

        std::thread::sleep(duration);

        let mut records = vec![Record::default(); profile.expected_size];
        let read = self.backend.read_records(self.context, &mut records);
        let stopped = self.backend.stop_context(self.context);

        let count = match read {
            Ok(count) => count,
            Err(e) => {
                if let Err(stop_err) = stopped {
                    warn!("Failed to stop {} after read error: {}", self.context, stop_err);
                }
                return Err(SamplerError::sampling(agent, SamplingStage::Read, e));
            }
        };
        stopped.map_err(|e| SamplerError::sampling(agent, SamplingStage::Stop, e))?;

        if count < profile.expected_size {
            debug!(
                "Short read on {}: {} of {} records",
                agent, count, profile.expected_size
            );
        }
        records.truncate(count);
        Ok(records)
    }
}

fn single_profile(
    backend: Arc<dyn Backend>,
    agent: AgentId,
    catalog: &mut CounterCatalog,
    names: &[String],
) -> Result<Profile> {
    let mut ids = Vec::with_capacity(names.len());
    let mut counters = Vec::with_capacity(names.len());
    let mut expected_size = 0;

    for name in names {
        match catalog.lookup(name)? {
            Some(id) => {
                expected_size = catalog
                    .record_count(id)?
                    .checked_add(expected_size)
                    .ok_or(SamplerError::RecordCount { agent, counter: id })?;
                ids.push(id);
                counters.push(name.clone());
            }
            None => debug!("Counter {} not supported on {}, skipping", name, agent),
        }
    }

    match backend.try_configure(agent, &ids) {
        ConfigureOutcome::Configured(config) => Ok(Profile {
            config: ConfigHandle::new(config, backend),
            counters,
            expected_size,
        }),
        ConfigureOutcome::CapacityExceeded => Err(SamplerError::CapacityExceeded),
        ConfigureOutcome::Failed(source) => Err(SamplerError::Configuration { agent, source }),
    }
}

impl Drop for CounterSampler {
    fn drop(&mut self) {
        let stats = self.cache.stats();
        debug!(
            "Tearing down sampler for {} ({} cached entries, {} hits, {} misses)",
            self.agent,
            self.cache.len(),
            stats.hits,
            stats.misses
        );
        self.cache.clear();
        self.backend.destroy_context(self.context);
    }
}
