//! Backend selection shared by every command

use clap::{Args, ValueEnum};
use rocpctl_sampler::sim::SimulatedBackend;
use rocpctl_sampler::Backend;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process simulated MI300-class device
    Sim,
}

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Profiling backend
    #[arg(long, value_enum, default_value = "sim", env = "ROCPCTL_BACKEND")]
    pub backend: BackendKind,

    /// Number of GPUs exposed by the simulated backend
    #[arg(long, default_value = "1", env = "ROCPCTL_SIM_GPUS")]
    pub sim_gpus: usize,
}

impl BackendArgs {
    pub fn connect(&self) -> Arc<dyn Backend> {
        let backend: Arc<dyn Backend> = match self.backend {
            BackendKind::Sim => Arc::new(SimulatedBackend::mi300(self.sim_gpus)),
        };
        if backend.simulated() {
            warn!("Using the simulated backend: agents and counter values are not from hardware");
        }
        backend
    }
}
