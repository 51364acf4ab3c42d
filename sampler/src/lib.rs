//! GPU counter sampling core
//!
//! Packs an arbitrary set of requested hardware counters into as few
//! hardware profiles as the device allows, caches the resulting
//! configurations per requested set, and drives the sequential
//! bind/start/wait/read/stop protocol that turns each profile into
//! aggregated counter values.
//!
//! The vendor profiling layer is reached only through the [`Backend`]
//! trait. [`sim::SimulatedBackend`] implements it in-process.

pub mod backend;
pub mod cache;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod handle;
pub mod packer;
pub mod profile;
pub mod sim;

pub use backend::{Backend, BackendError, ConfigId, ConfigureOutcome, ContextId};
pub use cache::{CacheStats, ProfileCache};
pub use catalog::{CounterCatalog, UNKNOWN_COUNTER};
pub use engine::{CounterSampler, SampleOutput};
pub use error::{SamplerError, SamplingStage};
pub use handle::ConfigHandle;
pub use packer::{Packer, MAX_COUNTERS_PER_PROFILE};
pub use profile::{Profile, ProfileSet};

/// Result alias used throughout the sampler
pub type Result<T, E = SamplerError> = std::result::Result<T, E>;
