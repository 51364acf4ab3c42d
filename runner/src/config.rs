//! Configuration for a sampling run
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `ROCPCTL_*` environment variables. Command line flags are
//! applied on top by the caller.

use crate::defaults::default_counters;
use anyhow::{bail, Context, Result};
use rocpctl_sampler::MAX_COUNTERS_PER_PROFILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by [`RunConfig::load`]
pub const ENV_PREFIX: &str = "ROCPCTL";

/// Longest accepted sampling window
pub const MAX_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Sampling window per profile, in microseconds
    pub duration_us: u64,

    /// Counters to sample; empty selects the default list
    pub counters: Vec<String>,

    /// Sample agents concurrently
    pub parallel: bool,

    /// Attempts per agent, including the first one
    pub retries: u32,

    /// Delay before the first retry, in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,

    /// Static per-profile counter limit used by the packer
    pub max_counters_per_profile: usize,

    /// Restore PTL power-state settings after the run
    pub ptl_guard: bool,

    /// DRM class directory scanned by the PTL guard
    pub drm_root: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_us: 1000,
            counters: Vec::new(),
            parallel: true,
            retries: 3,
            retry_delay_ms: 10,
            max_counters_per_profile: MAX_COUNTERS_PER_PROFILE,
            ptl_guard: true,
            drm_root: PathBuf::from(crate::ptl::DRM_ROOT),
        }
    }
}

impl RunConfig {
    /// Load defaults, the optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            builder = builder
                .add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("counters"),
        );

        builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Counters to request, falling back to the default list
    pub fn counter_list(&self) -> Vec<String> {
        if self.counters.is_empty() {
            default_counters()
        } else {
            self.counters.clone()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.duration_us == 0 {
            bail!("Duration must be greater than 0");
        }

        if self.duration() > MAX_WINDOW {
            bail!("Duration too long (max {}s)", MAX_WINDOW.as_secs());
        }

        if self.retries == 0 {
            bail!("Retries must be at least 1");
        }

        if self.max_counters_per_profile == 0 {
            bail!("Counters per profile must be greater than 0");
        }

        Ok(())
    }
}
