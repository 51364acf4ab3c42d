//! Greedy counter-to-profile packing
//!
//! Hardware capacity is not additive over counters, so feasibility of a
//! candidate profile is decided by asking the backend to build it. Each
//! round grows one profile first-fit over the remaining names; names that
//! do not fit are retried in the next round.

use crate::backend::{Backend, ConfigureOutcome};
use crate::catalog::CounterCatalog;
use crate::handle::ConfigHandle;
use crate::profile::{Profile, ProfileSet};
use crate::Result;
use rocpctl_shared::{AgentId, CounterId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Static per-profile counter limit, independent of what the backend accepts
pub const MAX_COUNTERS_PER_PROFILE: usize = 10;

pub struct Packer {
    backend: Arc<dyn Backend>,
    agent: AgentId,
    max_per_profile: usize,
}

impl Packer {
    pub fn new(backend: Arc<dyn Backend>, agent: AgentId) -> Self {
        Self {
            backend,
            agent,
            max_per_profile: MAX_COUNTERS_PER_PROFILE,
        }
    }

    /// Override the static per-profile limit
    pub fn with_max_per_profile(mut self, max_per_profile: usize) -> Self {
        self.max_per_profile = max_per_profile;
        self
    }

    /// Partition `counters` into profiles.
    ///
    /// Only a failed catalog enumeration is an error. Unsupported names end
    /// up in [`ProfileSet::unsupported`]; names no configuration could ever
    /// be built for end up in [`ProfileSet::unpackable`].
    pub fn pack(&self, catalog: &mut CounterCatalog, counters: &[String]) -> Result<ProfileSet> {
        catalog.list_supported()?;

        let mut seen = HashSet::new();
        let mut remaining: Vec<String> = counters
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();
        let requested = remaining.len();

        let mut set = ProfileSet::default();

        while !remaining.is_empty() {
            let mut current: Vec<String> = Vec::new();
            let mut current_ids: Vec<CounterId> = Vec::new();
            let mut current_size: usize = 0;
            let mut last_valid: Option<ConfigHandle> = None;
            let mut failed = Vec::new();

            for name in std::mem::take(&mut remaining) {
                let Some(id) = catalog.lookup(&name)? else {
                    debug!("Counter {} not supported on {}", name, self.agent);
                    set.unsupported.push(name);
                    continue;
                };

                if current.len() >= self.max_per_profile {
                    failed.push(name);
                    continue;
                }

                let size = match catalog.record_count(id) {
                    Ok(size) => size,
                    Err(e) => {
                        debug!("Could not size counter {}: {}", name, e);
                        failed.push(name);
                        continue;
                    }
                };
                let Some(total) = current_size.checked_add(size) else {
                    debug!("Counter {} would overflow the profile's record count", name);
                    failed.push(name);
                    continue;
                };

                current_ids.push(id);
                match self.backend.try_configure(self.agent, &current_ids) {
                    ConfigureOutcome::Configured(config) => {
                        // Replacing the previous candidate releases it.
                        last_valid = Some(ConfigHandle::new(config, self.backend.clone()));
                        current.push(name);
                        current_size = total;
                    }
                    ConfigureOutcome::CapacityExceeded => {
                        trace!("Counter {} exceeds hardware limit, deferring", name);
                        current_ids.pop();
                        failed.push(name);
                    }
                    ConfigureOutcome::Failed(e) => {
                        debug!("Error creating counter config with {}: {}", name, e);
                        current_ids.pop();
                        failed.push(name);
                    }
                }
            }

            let Some(config) = last_valid else {
                if !failed.is_empty() {
                    warn!(
                        "Failed to create profile for {} remaining counters on {}: {}",
                        failed.len(),
                        self.agent,
                        failed.join(", ")
                    );
                    set.unpackable = failed;
                }
                break;
            };

            trace!(
                "Profile {}: {} counters, {} records",
                set.profiles.len() + 1,
                current.len(),
                current_size
            );
            set.profiles.push(Profile {
                config,
                counters: current,
                expected_size: current_size,
            });

            remaining = failed;
        }

        if requested > 0 {
            debug!(
                "Created {} profiles from {} counters on {} (compression: {:.1}%)",
                set.profiles.len(),
                requested,
                self.agent,
                100.0 * set.profiles.len() as f64 / requested as f64
            );
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplerError;
    use crate::sim::SimulatedBackend;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn pack_with(
        sim: SimulatedBackend,
        counters: &[String],
        max_per_profile: usize,
    ) -> (Arc<SimulatedBackend>, Result<ProfileSet>) {
        let sim = Arc::new(sim);
        let backend: Arc<dyn Backend> = sim.clone();
        let mut catalog = CounterCatalog::new(backend.clone(), AgentId(1));
        let packer = Packer::new(backend, AgentId(1)).with_max_per_profile(max_per_profile);
        let set = packer.pack(&mut catalog, counters);
        (sim, set)
    }

    fn profile_names(set: &ProfileSet) -> Vec<Vec<&str>> {
        set.profiles
            .iter()
            .map(|p| p.counters.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_static_cap_splits_profiles() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 12)
            .build();
        let requested: Vec<String> = (0..12).map(|i| format!("C_{}", i)).collect();

        let (_sim, set) = pack_with(sim, &requested, 10);
        let set = set.unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.profiles[0].counters.len(), 10);
        assert_eq!(set.profiles[1].counters, names(&["C_10", "C_11"]));
    }

    #[test]
    fn test_hardware_limit_first_fit() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 7)
            .hw_limit(3)
            .build();
        let requested: Vec<String> = (0..7).map(|i| format!("C_{}", i)).collect();

        let (_sim, set) = pack_with(sim, &requested, 10);
        let set = set.unwrap();

        assert_eq!(
            profile_names(&set),
            vec![
                vec!["C_0", "C_1", "C_2"],
                vec!["C_3", "C_4", "C_5"],
                vec!["C_6"]
            ]
        );
        assert!(set.unpackable.is_empty());
    }

    #[test]
    fn test_unsupported_names_dropped() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counter("SQ_WAVES", &[("XCC", 8)])
            .build();

        let (_sim, set) = pack_with(sim, &names(&["SQ_WAVES", "NOT_A_REAL_COUNTER"]), 10);
        let set = set.unwrap();

        assert_eq!(profile_names(&set), vec![vec!["SQ_WAVES"]]);
        assert_eq!(set.unsupported, names(&["NOT_A_REAL_COUNTER"]));
        assert!(set.unpackable.is_empty());
    }

    #[test]
    fn test_expected_size_is_sum_of_record_counts() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counter("GRBM_COUNT", &[])
            .counter("SQ_WAVES", &[("XCC", 8), ("SE", 4)])
            .counter("TCC_HIT", &[("TCC_CHANNEL", 16)])
            .build();

        let (_sim, set) = pack_with(sim, &names(&["GRBM_COUNT", "SQ_WAVES", "TCC_HIT"]), 10);
        let set = set.unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.profiles[0].expected_size, 1 + 32 + 16);
        assert_eq!(set.expected_records(), 49);
    }

    #[test]
    fn test_rejected_counter_is_unpackable() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counter("A", &[])
            .counter("BAD", &[])
            .counter("B", &[])
            .reject("BAD")
            .build();

        let (_sim, set) = pack_with(sim, &names(&["A", "BAD", "B"]), 10);
        let set = set.unwrap();

        assert_eq!(profile_names(&set), vec![vec!["A", "B"]]);
        assert_eq!(set.unpackable, names(&["BAD"]));
    }

    #[test]
    fn test_oversized_counter_is_unpackable() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counter("A", &[])
            .counter("HUGE", &[("XCC", u64::MAX), ("SE", 4)])
            .counter("B", &[])
            .build();

        let (sim, set) = pack_with(sim, &names(&["A", "HUGE", "B"]), 10);
        let set = set.unwrap();

        assert_eq!(profile_names(&set), vec![vec!["A", "B"]]);
        assert_eq!(set.profiles[0].expected_size, 2);
        assert_eq!(set.unpackable, names(&["HUGE"]));
        assert_eq!(sim.live_configs(), 1);
    }

    #[test]
    fn test_cap_respected() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 25)
            .hw_limit(6)
            .build();
        let requested: Vec<String> = (0..25).map(|i| format!("C_{}", i)).collect();

        let (_sim, set) = pack_with(sim, &requested, 4);
        let set = set.unwrap();

        assert!(set.profiles.iter().all(|p| p.counters.len() <= 4));
        assert_eq!(set.len(), 7);
        assert_eq!(set.counter_names().count(), 25);
    }

    #[test]
    fn test_only_kept_configs_stay_alive() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 5)
            .hw_limit(2)
            .build();
        let requested: Vec<String> = (0..5).map(|i| format!("C_{}", i)).collect();

        let (sim, set) = pack_with(sim, &requested, 10);
        let set = set.unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(sim.live_configs(), 3);
        assert!(sim.configs_created() > 3);

        drop(set);
        assert_eq!(sim.live_configs(), 0);
        assert_eq!(sim.configs_created(), sim.configs_destroyed());
    }

    #[test]
    fn test_duplicates_packed_once() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counter("A", &[])
            .counter("B", &[])
            .build();

        let (_sim, set) = pack_with(sim, &names(&["A", "B", "A"]), 10);
        assert_eq!(profile_names(&set.unwrap()), vec![vec!["A", "B"]]);
    }

    #[test]
    fn test_empty_request() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 2)
            .build();

        let (sim, set) = pack_with(sim, &[], 10);
        assert!(set.unwrap().is_empty());
        assert_eq!(sim.configs_created(), 0);
    }

    #[test]
    fn test_catalog_failure_is_reported() {
        let sim = SimulatedBackend::builder()
            .gpu(AgentId(1))
            .counters("C", 2)
            .fail_catalog(AgentId(1))
            .build();

        let (_sim, set) = pack_with(sim, &names(&["C_0"]), 10);
        assert!(matches!(set, Err(SamplerError::Catalog { .. })));
    }
}
