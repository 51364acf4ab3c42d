//! Counter catalog accessor
//!
//! Query layer over the backend's counter enumeration. Results that are
//! expensive to obtain (supported set, dimensions, id to name) are cached for
//! the lifetime of the owning engine.

use crate::backend::Backend;
use crate::error::SamplerError;
use crate::Result;
use rocpctl_shared::{checked_record_count, AgentId, Counter, CounterId, Dimension, Record};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name reported for records whose counter id cannot be resolved
pub const UNKNOWN_COUNTER: &str = "UNKNOWN_COUNTER";

pub struct CounterCatalog {
    backend: Arc<dyn Backend>,
    agent: AgentId,

    /// name -> id, filled on first successful enumeration
    supported: Option<HashMap<String, CounterId>>,
    dimensions: HashMap<CounterId, Arc<[Dimension]>>,
    names: HashMap<CounterId, String>,
}

impl CounterCatalog {
    pub fn new(backend: Arc<dyn Backend>, agent: AgentId) -> Self {
        Self {
            backend,
            agent,
            supported: None,
            dimensions: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    fn catalog_error(&self, source: crate::BackendError) -> SamplerError {
        SamplerError::Catalog {
            agent: self.agent,
            source,
        }
    }

    /// Every counter the device exposes, keyed by name
    pub fn list_supported(&mut self) -> Result<&HashMap<String, CounterId>> {
        if self.supported.is_none() {
            let ids = self
                .backend
                .supported_counters(self.agent)
                .map_err(|e| self.catalog_error(e))?;

            let mut by_name = HashMap::with_capacity(ids.len());
            for id in ids {
                let name = self
                    .backend
                    .counter_name(id)
                    .map_err(|e| self.catalog_error(e))?;
                self.names.insert(id, name.clone());
                by_name.insert(name, id);
            }

            debug!("{} exposes {} counters", self.agent, by_name.len());
            self.supported = Some(by_name);
        }

        Ok(self.supported.get_or_insert_with(HashMap::new))
    }

    /// Resolve a counter name, `None` when the device does not expose it
    pub fn lookup(&mut self, name: &str) -> Result<Option<CounterId>> {
        Ok(self.list_supported()?.get(name).copied())
    }

    /// Dimensional decomposition of a counter (cached)
    pub fn dimensions(&mut self, counter: CounterId) -> Result<Arc<[Dimension]>> {
        if let Some(dims) = self.dimensions.get(&counter) {
            return Ok(dims.clone());
        }

        let dims: Arc<[Dimension]> = self
            .backend
            .counter_dimensions(counter)
            .map_err(|e| self.catalog_error(e))?
            .into();
        self.dimensions.insert(counter, dims.clone());
        Ok(dims)
    }

    /// Records one sampling pass produces for `counter`, at least 1
    pub fn record_count(&mut self, counter: CounterId) -> Result<usize> {
        let dims = self.dimensions(counter)?;
        checked_record_count(&dims).ok_or(SamplerError::RecordCount {
            agent: self.agent,
            counter,
        })
    }

    /// Name of the counter a record belongs to.
    ///
    /// Never fails: an unresolvable id yields [`UNKNOWN_COUNTER`].
    pub fn decode_name(&mut self, record: &Record) -> &str {
        if !self.names.contains_key(&record.counter) {
            match self.backend.counter_name(record.counter) {
                Ok(name) => {
                    self.names.insert(record.counter, name);
                }
                Err(e) => {
                    debug!(
                        "Failed to query counter info for {} on {}: {}",
                        record.counter, self.agent, e
                    );
                    return UNKNOWN_COUNTER;
                }
            }
        }

        self.names
            .get(&record.counter)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_COUNTER)
    }

    /// Position of a record along each of its counter's dimensions
    pub fn record_dimensions(&mut self, record: &Record) -> Result<HashMap<String, usize>> {
        let dims = self.dimensions(record.counter)?;
        let mut out = HashMap::with_capacity(dims.len());

        for dim in dims.iter() {
            let position = self
                .backend
                .dimension_position(record, dim.id)
                .map_err(|e| self.catalog_error(e))?;
            out.insert(dim.name.clone(), position);
        }

        Ok(out)
    }

    /// Full description of every supported counter, sorted by name
    pub fn describe(&mut self) -> Result<Vec<Counter>> {
        let mut supported: Vec<(String, CounterId)> = self
            .list_supported()?
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        supported.sort();

        supported
            .into_iter()
            .map(|(name, id)| {
                Ok(Counter {
                    id,
                    name,
                    dimensions: self.dimensions(id)?.to_vec(),
                })
            })
            .collect()
    }
}
