//! Memoization of packed profile sets and single profiles
//!
//! Creating hardware configurations is expensive, so the result of packing
//! a counter list is kept for the lifetime of the owning engine. There is no
//! eviction: callers request a small, fixed number of distinct lists.

use crate::profile::{Profile, ProfileSet};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ProfileCache {
    /// Keyed by the sorted, de-duplicated counter list
    sets: HashMap<Vec<String>, Arc<ProfileSet>>,

    /// Keyed by the exact counter list as requested
    singles: HashMap<Vec<String>, Arc<Profile>>,

    stats: CacheStats,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a profile set: request order and repeats do not matter
    pub fn set_key(counters: &[String]) -> Vec<String> {
        let mut key = counters.to_vec();
        key.sort();
        key.dedup();
        key
    }

    /// Return the cached set for `counters`, packing it with `factory` on a miss.
    ///
    /// The factory receives the sorted key. A failed factory leaves no entry.
    pub fn get_or_create_set<F>(
        &mut self,
        counters: &[String],
        factory: F,
    ) -> Result<Arc<ProfileSet>>
    where
        F: FnOnce(&[String]) -> Result<ProfileSet>,
    {
        let key = Self::set_key(counters);
        if let Some(set) = self.sets.get(&key) {
            self.stats.hits += 1;
            return Ok(set.clone());
        }

        self.stats.misses += 1;
        let set = Arc::new(factory(&key)?);
        self.sets.insert(key, set.clone());
        Ok(set)
    }

    /// Return the cached single profile for exactly `counters`
    pub fn get_or_create_single<F>(
        &mut self,
        counters: &[String],
        factory: F,
    ) -> Result<Arc<Profile>>
    where
        F: FnOnce(&[String]) -> Result<Profile>,
    {
        if let Some(profile) = self.singles.get(counters) {
            self.stats.hits += 1;
            return Ok(profile.clone());
        }

        self.stats.misses += 1;
        let profile = Arc::new(factory(counters)?);
        self.singles.insert(counters.to_vec(), profile.clone());
        Ok(profile)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of cached entries across both caches
    pub fn len(&self) -> usize {
        self.sets.len() + self.singles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, releasing configurations nobody else holds
    pub fn clear(&mut self) {
        self.sets.clear();
        self.singles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, ConfigureOutcome};
    use crate::error::SamplerError;
    use crate::handle::ConfigHandle;
    use crate::sim::SimulatedBackend;
    use rocpctl_shared::AgentId;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn profile(sim: &Arc<SimulatedBackend>, counters: &[String]) -> Profile {
        let refs: Vec<&str> = counters.iter().map(String::as_str).collect();
        let ids = sim.counter_ids(AgentId(1), &refs);
        let config = match sim.try_configure(AgentId(1), &ids) {
            ConfigureOutcome::Configured(id) => id,
            other => panic!("unexpected outcome: {:?}", other),
        };
        let backend: Arc<dyn Backend> = sim.clone();
        Profile {
            config: ConfigHandle::new(config, backend),
            counters: counters.to_vec(),
            expected_size: counters.len(),
        }
    }

    fn sim() -> Arc<SimulatedBackend> {
        Arc::new(
            SimulatedBackend::builder()
                .gpu(AgentId(1))
                .counter("A", &[])
                .counter("B", &[])
                .build(),
        )
    }

    #[test]
    fn test_set_key_sorted_and_deduplicated() {
        assert_eq!(
            ProfileCache::set_key(&names(&["B", "A", "B"])),
            names(&["A", "B"])
        );
    }

    #[test]
    fn test_set_factory_runs_once_per_key() {
        let mut cache = ProfileCache::new();
        let mut calls = 0;

        let first = cache
            .get_or_create_set(&names(&["B", "A"]), |key| {
                calls += 1;
                assert_eq!(key, names(&["A", "B"]).as_slice());
                Ok(ProfileSet::default())
            })
            .unwrap();
        let second = cache
            .get_or_create_set(&names(&["A", "B"]), |_| panic!("factory called on a hit"))
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_failed_factory_not_cached() {
        let mut cache = ProfileCache::new();

        let result = cache.get_or_create_set(&names(&["A"]), |_| Err(SamplerError::NoAgents));
        assert!(result.is_err());
        assert!(cache.is_empty());

        cache
            .get_or_create_set(&names(&["A"]), |_| Ok(ProfileSet::default()))
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_single_key_is_order_sensitive() {
        let sim = sim();
        let mut cache = ProfileCache::new();

        let ab = cache
            .get_or_create_single(&names(&["A", "B"]), |c| Ok(profile(&sim, c)))
            .unwrap();
        let ba = cache
            .get_or_create_single(&names(&["B", "A"]), |c| Ok(profile(&sim, c)))
            .unwrap();
        let ab_again = cache
            .get_or_create_single(&names(&["A", "B"]), |_| panic!("factory called on a hit"))
            .unwrap();

        assert!(!Arc::ptr_eq(&ab, &ba));
        assert!(Arc::ptr_eq(&ab, &ab_again));
        assert_eq!(sim.live_configs(), 2);
    }

    #[test]
    fn test_clear_releases_configs() {
        let sim = sim();
        let mut cache = ProfileCache::new();

        cache
            .get_or_create_single(&names(&["A"]), |c| Ok(profile(&sim, c)))
            .unwrap();
        cache
            .get_or_create_set(&names(&["B"]), |c| {
                Ok(ProfileSet {
                    profiles: vec![profile(&sim, c)],
                    ..Default::default()
                })
            })
            .unwrap();
        assert_eq!(sim.live_configs(), 2);

        cache.clear();
        assert_eq!(sim.live_configs(), 0);
        assert_eq!(sim.configs_destroyed(), 2);
    }
}
