//! In-process simulated device
//!
//! `SimulatedBackend` implements [`Backend`] without hardware. It models a
//! configurable counter catalog, a per-configuration counter limit, counters
//! that never configure, short reads and injected bind/start/read/stop
//! failures, and
//! keeps enough bookkeeping for tests to check resource handling.

use crate::backend::{Backend, BackendError, ConfigId, ConfigureOutcome, ContextId};
use rocpctl_shared::{
    record_count, AgentId, AgentInfo, AgentKind, CounterId, Dimension, DimensionId, Record,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const STATUS_ERROR: i32 = 1;
pub const STATUS_INVALID_ARGUMENT: i32 = 7;
pub const STATUS_CONTEXT_ERROR: i32 = 12;
pub const STATUS_NOT_AVAILABLE: i32 = 21;

/// Counter table of a simulated MI300-class device: name and dimensions.
const MI300_COUNTERS: &[(&str, &[(&str, u64)])] = &[
    ("GRBM_GUI_ACTIVE", &[]),
    ("GRBM_COUNT", &[]),
    ("GPU_UTIL", &[]),
    ("SQ_WAVES", &[("XCC", 8), ("SE", 4)]),
    ("SQ_INSTS_VALU", &[("XCC", 8), ("SE", 4)]),
    ("SQ_BUSY_CYCLES", &[("XCC", 8)]),
    ("FETCH_SIZE", &[]),
    ("WRITE_SIZE", &[]),
    ("TCC_HIT", &[("XCC", 8), ("TCC_CHANNEL", 16)]),
    ("TCC_MISS", &[("XCC", 8), ("TCC_CHANNEL", 16)]),
    ("TOTAL_16_OPS", &[]),
    ("TOTAL_32_OPS", &[]),
    ("TOTAL_64_OPS", &[]),
    ("CPC_CPC_STAT_BUSY", &[("XCC", 8)]),
    ("CPC_CPC_STAT_IDLE", &[("XCC", 8)]),
    ("CPC_CPC_STAT_STALL", &[("XCC", 8)]),
    ("CPC_CPC_TCIU_BUSY", &[("XCC", 8)]),
    ("CPC_CPC_TCIU_IDLE", &[("XCC", 8)]),
    ("CPC_CPC_UTCL2IU_BUSY", &[("XCC", 8)]),
    ("CPC_CPC_UTCL2IU_IDLE", &[("XCC", 8)]),
    ("CPC_CPC_UTCL2IU_STALL", &[("XCC", 8)]),
    ("CPC_ME1_BUSY_FOR_PACKET_DECODE", &[("XCC", 8)]),
    ("CPC_ME1_DC0_SPI_BUSY", &[("XCC", 8)]),
    ("CPC_UTCL1_STALL_ON_TRANSLATION", &[("XCC", 8)]),
    ("CPC_ALWAYS_COUNT", &[("XCC", 8)]),
    ("CPC_ADC_VALID_CHUNK_NOT_AVAIL", &[("XCC", 8)]),
    ("CPC_ADC_DISPATCH_ALLOC_DONE", &[("XCC", 8)]),
    ("CPC_ADC_VALID_CHUNK_END", &[("XCC", 8)]),
    ("CPC_SYNC_FIFO_FULL_LEVEL", &[("XCC", 8)]),
    ("CPC_SYNC_FIFO_FULL", &[("XCC", 8)]),
    ("CPC_GD_BUSY", &[("XCC", 8)]),
    ("CPC_TG_SEND", &[("XCC", 8)]),
    ("CPC_WALK_NEXT_CHUNK", &[("XCC", 8)]),
    ("CPC_STALLED_BY_SE0_SPI", &[("XCC", 8)]),
    ("CPC_STALLED_BY_SE1_SPI", &[("XCC", 8)]),
    ("CPC_STALLED_BY_SE2_SPI", &[("XCC", 8)]),
    ("CPC_STALLED_BY_SE3_SPI", &[("XCC", 8)]),
    ("CPC_LTE_ALL", &[("XCC", 8)]),
    ("CPC_SYNC_WRREQ_FIFO_BUSY", &[("XCC", 8)]),
    ("CPC_CANE_BUSY", &[("XCC", 8)]),
    ("CPC_CANE_STALL", &[("XCC", 8)]),
    ("CPF_CMP_UTCL1_STALL_ON_TRANSLATION", &[("XCC", 8)]),
    ("CPF_CPF_STAT_BUSY", &[("XCC", 8)]),
    ("CPF_CPF_STAT_IDLE", &[("XCC", 8)]),
    ("CPF_CPF_STAT_STALL", &[("XCC", 8)]),
    ("CPF_CPF_TCIU_BUSY", &[("XCC", 8)]),
    ("CPF_CPF_TCIU_IDLE", &[("XCC", 8)]),
    ("CPF_CPF_TCIU_STALL", &[("XCC", 8)]),
];

#[derive(Debug, Clone)]
struct SimCounter {
    id: CounterId,
    name: String,
    dimensions: Vec<Dimension>,
    value: f64,
}

#[derive(Debug, Default)]
struct SimContext {
    agent: Option<AgentId>,
    bound: Option<ConfigId>,
    active: bool,
}

#[derive(Debug, Default)]
struct SimState {
    next_config: u64,
    next_context: u64,
    configs: HashMap<ConfigId, Vec<CounterId>>,
    configs_created: usize,
    configs_destroyed: usize,
    contexts: HashMap<ContextId, SimContext>,
    starts: usize,
    supported_queries: usize,
    dimension_queries: usize,
    name_queries: usize,
    bind_failures: HashMap<AgentId, usize>,
    start_failures: HashMap<AgentId, usize>,
    read_failures: HashMap<AgentId, usize>,
    stop_failures: HashMap<AgentId, usize>,
}

/// Builder for [`SimulatedBackend`]
#[derive(Debug)]
pub struct SimulatedBackendBuilder {
    agents: Vec<AgentInfo>,
    counters: Vec<SimCounter>,
    hw_limit: usize,
    rejected: HashSet<String>,
    max_records: Option<usize>,
    catalog_failures: HashSet<AgentId>,
    fail_enumeration: bool,
    bind_failures: HashMap<AgentId, usize>,
    start_failures: HashMap<AgentId, usize>,
    read_failures: HashMap<AgentId, usize>,
    stop_failures: HashMap<AgentId, usize>,
}

impl SimulatedBackendBuilder {
    /// Add an agent with an explicit descriptor
    pub fn agent(mut self, agent: AgentInfo) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add a GPU agent with generated addressing fields
    pub fn gpu(self, id: AgentId) -> Self {
        let index = self.agents.iter().filter(|a| a.is_gpu()).count() as u32;
        self.agent(AgentInfo {
            id,
            kind: AgentKind::Gpu,
            name: "gfx942".to_string(),
            gpu_id: 10_000 + id.0,
            drm_render_minor: 128 + index,
            logical_node_id: index + 1,
        })
    }

    /// Add a CPU agent (never sampled)
    pub fn cpu(self, id: AgentId) -> Self {
        self.agent(AgentInfo {
            id,
            kind: AgentKind::Cpu,
            name: "cpu".to_string(),
            gpu_id: 0,
            drm_render_minor: 0,
            logical_node_id: 0,
        })
    }

    /// Add a counter whose records each read 1.0
    pub fn counter(self, name: &str, dimensions: &[(&str, u64)]) -> Self {
        self.counter_with_value(name, dimensions, 1.0)
    }

    /// Add a counter whose records each read `value`
    pub fn counter_with_value(
        mut self,
        name: &str,
        dimensions: &[(&str, u64)],
        value: f64,
    ) -> Self {
        let id = CounterId(0x100 + self.counters.len() as u64);
        let dimensions = dimensions
            .iter()
            .enumerate()
            .map(|(i, (dim_name, size))| Dimension {
                id: DimensionId(i as u64),
                name: dim_name.to_string(),
                instance_size: *size,
            })
            .collect();
        self.counters.push(SimCounter {
            id,
            name: name.to_string(),
            dimensions,
            value,
        });
        self
    }

    /// Add `n` dimensionless counters named `{prefix}_{i}`
    pub fn counters(mut self, prefix: &str, n: usize) -> Self {
        for i in 0..n {
            self = self.counter(&format!("{}_{}", prefix, i), &[]);
        }
        self
    }

    /// Maximum number of counters one configuration may hold
    pub fn hw_limit(mut self, limit: usize) -> Self {
        self.hw_limit = limit;
        self
    }

    /// Make configuring `name` fail with a non-capacity status, alone or not
    pub fn reject(mut self, name: &str) -> Self {
        self.rejected.insert(name.to_string());
        self
    }

    /// Return at most `n` records per read
    pub fn max_records(mut self, n: usize) -> Self {
        self.max_records = Some(n);
        self
    }

    /// Make counter enumeration fail for `agent`
    pub fn fail_catalog(mut self, agent: AgentId) -> Self {
        self.catalog_failures.insert(agent);
        self
    }

    /// Make agent enumeration fail
    pub fn fail_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Fail the next `times` profile binds on `agent`
    pub fn fail_binds(mut self, agent: AgentId, times: usize) -> Self {
        self.bind_failures.insert(agent, times);
        self
    }

    /// Fail the next `times` context starts on `agent`
    pub fn fail_starts(mut self, agent: AgentId, times: usize) -> Self {
        self.start_failures.insert(agent, times);
        self
    }

    /// Fail the next `times` record reads on `agent`
    pub fn fail_reads(mut self, agent: AgentId, times: usize) -> Self {
        self.read_failures.insert(agent, times);
        self
    }

    /// Fail the next `times` context stops on `agent`.
    ///
    /// The context still ends up stopped; only the status is an error.
    pub fn fail_stops(mut self, agent: AgentId, times: usize) -> Self {
        self.stop_failures.insert(agent, times);
        self
    }

    pub fn build(self) -> SimulatedBackend {
        SimulatedBackend {
            agents: self.agents,
            counters: self.counters,
            hw_limit: self.hw_limit,
            rejected: self.rejected,
            max_records: self.max_records,
            catalog_failures: self.catalog_failures,
            fail_enumeration: self.fail_enumeration,
            state: Mutex::new(SimState {
                next_config: 1,
                next_context: 1,
                bind_failures: self.bind_failures,
                start_failures: self.start_failures,
                read_failures: self.read_failures,
                stop_failures: self.stop_failures,
                ..Default::default()
            }),
        }
    }
}

/// Simulated profiling layer
#[derive(Debug)]
pub struct SimulatedBackend {
    agents: Vec<AgentInfo>,
    counters: Vec<SimCounter>,
    hw_limit: usize,
    rejected: HashSet<String>,
    max_records: Option<usize>,
    catalog_failures: HashSet<AgentId>,
    fail_enumeration: bool,
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn builder() -> SimulatedBackendBuilder {
        SimulatedBackendBuilder {
            agents: Vec::new(),
            counters: Vec::new(),
            hw_limit: usize::MAX,
            rejected: HashSet::new(),
            max_records: None,
            catalog_failures: HashSet::new(),
            fail_enumeration: false,
            bind_failures: HashMap::new(),
            start_failures: HashMap::new(),
            read_failures: HashMap::new(),
            stop_failures: HashMap::new(),
        }
    }

    /// A host with one CPU agent and `gpus` MI300-class GPU agents.
    ///
    /// Each configuration holds at most 7 counters, so the default counter
    /// list needs several profiles.
    pub fn mi300(gpus: usize) -> Self {
        let mut builder = Self::builder().cpu(AgentId(0)).hw_limit(7);
        for i in 0..gpus {
            builder = builder.gpu(AgentId(i as u64 + 1));
        }
        for (i, (name, dims)) in MI300_COUNTERS.iter().enumerate() {
            builder = builder.counter_with_value(name, dims, (i as f64 + 1.0) * 10.0);
        }
        builder.build()
    }

    /// Resolve names to ids, skipping unknown names
    pub fn counter_ids(&self, _agent: AgentId, names: &[&str]) -> Vec<CounterId> {
        names
            .iter()
            .filter_map(|name| self.counters.iter().find(|c| c.name == *name))
            .map(|c| c.id)
            .collect()
    }

    /// Configurations created and not yet destroyed
    pub fn live_configs(&self) -> usize {
        self.state().configs.len()
    }

    pub fn configs_created(&self) -> usize {
        self.state().configs_created
    }

    pub fn configs_destroyed(&self) -> usize {
        self.state().configs_destroyed
    }

    /// Contexts created and not yet destroyed
    pub fn live_contexts(&self) -> usize {
        self.state().contexts.len()
    }

    /// Number of contexts currently started
    pub fn active_contexts(&self) -> usize {
        self.state().contexts.values().filter(|c| c.active).count()
    }

    /// Total successful context starts
    pub fn starts(&self) -> usize {
        self.state().starts
    }

    pub fn supported_queries(&self) -> usize {
        self.state().supported_queries
    }

    pub fn dimension_queries(&self) -> usize {
        self.state().dimension_queries
    }

    pub fn name_queries(&self) -> usize {
        self.state().name_queries
    }

    /// Fail the next `times` record reads on `agent`
    pub fn inject_read_failures(&self, agent: AgentId, times: usize) {
        self.state().read_failures.insert(agent, times);
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counter(&self, id: CounterId) -> Option<&SimCounter> {
        self.counters.iter().find(|c| c.id == id)
    }

    fn take_failure(failures: &mut HashMap<AgentId, usize>, agent: AgentId) -> bool {
        match failures.get_mut(&agent) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

fn context_error(message: &str) -> BackendError {
    BackendError::new(STATUS_CONTEXT_ERROR, message)
}

impl Backend for SimulatedBackend {
    fn agents(&self) -> Result<Vec<AgentInfo>, BackendError> {
        if self.fail_enumeration {
            return Err(BackendError::new(STATUS_ERROR, "agent enumeration failed"));
        }
        Ok(self.agents.clone())
    }

    fn supported_counters(&self, agent: AgentId) -> Result<Vec<CounterId>, BackendError> {
        self.state().supported_queries += 1;

        if self.catalog_failures.contains(&agent) {
            return Err(BackendError::new(STATUS_ERROR, "could not fetch supported counters"));
        }
        match self.agents.iter().find(|a| a.id == agent) {
            Some(a) if a.is_gpu() => Ok(self.counters.iter().map(|c| c.id).collect()),
            Some(_) => Ok(Vec::new()),
            None => Err(BackendError::new(STATUS_INVALID_ARGUMENT, "unknown agent")),
        }
    }

    fn counter_name(&self, counter: CounterId) -> Result<String, BackendError> {
        self.state().name_queries += 1;
        self.counter(counter)
            .map(|c| c.name.clone())
            .ok_or_else(|| BackendError::new(STATUS_INVALID_ARGUMENT, "unknown counter id"))
    }

    fn counter_dimensions(&self, counter: CounterId) -> Result<Vec<Dimension>, BackendError> {
        self.state().dimension_queries += 1;
        self.counter(counter)
            .map(|c| c.dimensions.clone())
            .ok_or_else(|| BackendError::new(STATUS_INVALID_ARGUMENT, "unknown counter id"))
    }

    fn dimension_position(
        &self,
        record: &Record,
        dimension: DimensionId,
    ) -> Result<usize, BackendError> {
        let counter = self
            .counter(record.counter)
            .ok_or_else(|| BackendError::new(STATUS_INVALID_ARGUMENT, "unknown counter id"))?;
        let index = counter
            .dimensions
            .iter()
            .position(|d| d.id == dimension)
            .ok_or_else(|| BackendError::new(STATUS_INVALID_ARGUMENT, "unknown dimension"))?;

        // Row-major: the last dimension varies fastest.
        let stride = record_count(&counter.dimensions[index + 1..]) as u64;
        let size = counter.dimensions[index].instance_size.max(1);
        Ok(((record.instance / stride) % size) as usize)
    }

    fn try_configure(&self, agent: AgentId, counters: &[CounterId]) -> ConfigureOutcome {
        if !self.agents.iter().any(|a| a.id == agent && a.is_gpu()) {
            return ConfigureOutcome::Failed(BackendError::new(
                STATUS_INVALID_ARGUMENT,
                "unknown agent",
            ));
        }
        for id in counters {
            match self.counter(*id) {
                None => {
                    return ConfigureOutcome::Failed(BackendError::new(
                        STATUS_INVALID_ARGUMENT,
                        "unknown counter id",
                    ))
                }
                Some(c) if self.rejected.contains(&c.name) => {
                    return ConfigureOutcome::Failed(BackendError::new(
                        STATUS_NOT_AVAILABLE,
                        format!("{} cannot be collected", c.name),
                    ))
                }
                Some(_) => {}
            }
        }
        if counters.len() > self.hw_limit {
            return ConfigureOutcome::CapacityExceeded;
        }

        let mut state = self.state();
        let id = ConfigId(state.next_config);
        state.next_config += 1;
        state.configs_created += 1;
        state.configs.insert(id, counters.to_vec());
        ConfigureOutcome::Configured(id)
    }

    fn destroy_config(&self, config: ConfigId) {
        let mut state = self.state();
        if state.configs.remove(&config).is_some() {
            state.configs_destroyed += 1;
        }
    }

    fn create_context(&self, agent: AgentId) -> Result<ContextId, BackendError> {
        if !self.agents.iter().any(|a| a.id == agent) {
            return Err(BackendError::new(STATUS_INVALID_ARGUMENT, "unknown agent"));
        }
        let mut state = self.state();
        let id = ContextId(state.next_context);
        state.next_context += 1;
        state.contexts.insert(
            id,
            SimContext {
                agent: Some(agent),
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn destroy_context(&self, context: ContextId) {
        self.state().contexts.remove(&context);
    }

    fn bind_config(&self, context: ContextId, config: ConfigId) -> Result<(), BackendError> {
        let mut state = self.state();
        let state = &mut *state;
        if !state.configs.contains_key(&config) {
            return Err(BackendError::new(STATUS_INVALID_ARGUMENT, "unknown configuration"));
        }
        let ctx = state
            .contexts
            .get_mut(&context)
            .ok_or_else(|| context_error("unknown context"))?;
        if ctx.active {
            return Err(context_error("cannot rebind an active context"));
        }
        if let Some(agent) = ctx.agent {
            if Self::take_failure(&mut state.bind_failures, agent) {
                return Err(context_error("injected bind failure"));
            }
        }
        ctx.bound = Some(config);
        Ok(())
    }

    fn start_context(&self, context: ContextId) -> Result<(), BackendError> {
        let mut state = self.state();
        let state = &mut *state;
        let ctx = state
            .contexts
            .get_mut(&context)
            .ok_or_else(|| context_error("unknown context"))?;
        if ctx.active {
            return Err(context_error("context already active"));
        }
        if let Some(agent) = ctx.agent {
            if Self::take_failure(&mut state.start_failures, agent) {
                return Err(context_error("injected start failure"));
            }
        }
        ctx.active = true;
        state.starts += 1;
        Ok(())
    }

    fn stop_context(&self, context: ContextId) -> Result<(), BackendError> {
        let mut state = self.state();
        let state = &mut *state;
        let ctx = state
            .contexts
            .get_mut(&context)
            .ok_or_else(|| context_error("unknown context"))?;
        ctx.active = false;
        if let Some(agent) = ctx.agent {
            if Self::take_failure(&mut state.stop_failures, agent) {
                return Err(context_error("injected stop failure"));
            }
        }
        Ok(())
    }

    fn read_records(
        &self,
        context: ContextId,
        buffer: &mut [Record],
    ) -> Result<usize, BackendError> {
        let mut state = self.state();
        let state = &mut *state;
        let ctx = state
            .contexts
            .get(&context)
            .ok_or_else(|| context_error("unknown context"))?;
        if !ctx.active {
            return Err(context_error("context not started"));
        }
        if let Some(agent) = ctx.agent {
            if Self::take_failure(&mut state.read_failures, agent) {
                return Err(BackendError::new(STATUS_ERROR, "injected read failure"));
            }
        }
        let config = ctx
            .bound
            .ok_or_else(|| context_error("no profile bound to context"))?;
        let counters = state
            .configs
            .get(&config)
            .ok_or_else(|| BackendError::new(STATUS_INVALID_ARGUMENT, "unknown configuration"))?;

        let limit = self
            .max_records
            .map_or(buffer.len(), |max| max.min(buffer.len()));
        let mut written = 0;
        'fill: for id in counters {
            let Some(counter) = self.counter(*id) else {
                continue;
            };
            for instance in 0..record_count(&counter.dimensions) {
                if written == limit {
                    break 'fill;
                }
                buffer[written] = Record {
                    instance: instance as u64,
                    counter: counter.id,
                    value: counter.value,
                };
                written += 1;
            }
        }
        Ok(written)
    }

    fn simulated(&self) -> bool {
        true
    }
}
