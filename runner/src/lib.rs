//! Run orchestration for rocpctl
//!
//! Discovers GPU agents, samples each of them with retry, and assembles the
//! per-agent results into one [`RunReport`]. A failing agent is reported as
//! such and never prevents the others from being sampled.

pub mod config;
pub mod defaults;
pub mod metrics;
pub mod output;
pub mod ptl;
pub mod registry;
pub mod retry;

pub use config::RunConfig;
pub use defaults::DEFAULT_COUNTERS;
pub use registry::{AgentSampler, SamplerRegistry};

use anyhow::Context;
use retry::retry_with_backoff;
use rocpctl_sampler::{CacheStats, SampleOutput, SamplerError};
use rocpctl_shared::{GpuReport, RunReport};
use std::sync::{Arc, PoisonError};
use tracing::{debug, error, info, warn};

/// Sample every agent of `registry` and build the report.
///
/// Agents appear in the report in discovery order.
pub async fn run_sample(registry: &SamplerRegistry, config: &RunConfig) -> RunReport {
    let counters: Arc<[String]> = config.counter_list().into();

    let mut report = RunReport::new(config.duration_us);
    report.host = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned());
    report.simulated = registry.backend().simulated();

    info!(
        "Sampling {} counters on {} agents ({}us window)",
        counters.len(),
        registry.len(),
        config.duration_us
    );

    if config.parallel {
        let tasks: Vec<_> = registry
            .samplers()
            .iter()
            .map(|entry| {
                let entry = entry.clone();
                let counters = counters.clone();
                let config = config.clone();
                tokio::spawn(async move { sample_agent(&entry, &counters, &config).await })
            })
            .collect();

        for (entry, task) in registry.samplers().iter().zip(tasks) {
            let section = match task.await {
                Ok(section) => section,
                Err(e) => {
                    error!("Sampling task for {} failed: {}", entry.info.id, e);
                    GpuReport::failure(&entry.info, format!("sampling task failed: {}", e))
                }
            };
            report.gpu_metrics.push(section);
        }
    } else {
        for entry in registry.samplers() {
            report
                .gpu_metrics
                .push(sample_agent(entry, &counters, config).await);
        }
    }

    if report.failed_count() > 0 {
        warn!(
            "{} of {} agents failed",
            report.failed_count(),
            report.gpu_metrics.len()
        );
    }

    report
}

/// Sample one agent with retry and turn the outcome into its report section
async fn sample_agent(
    entry: &AgentSampler,
    counters: &Arc<[String]>,
    config: &RunConfig,
) -> GpuReport {
    let timer = metrics::SAMPLE_DURATION.start_timer();
    let operation = format!("Sampling {}", entry.info.id);
    let window = config.duration();

    let result = retry_with_backoff(&operation, config.retries, config.retry_delay(), || {
        let sampler = entry.sampler.clone();
        let counters = counters.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                let mut sampler = sampler.lock().unwrap_or_else(PoisonError::into_inner);
                let output = sampler.sample(&counters, window)?;
                Ok::<(SampleOutput, CacheStats), SamplerError>((output, sampler.cache_stats()))
            })
            .await
            .context("sampling task panicked")?
            .map_err(anyhow::Error::from)
        }
    })
    .await;

    timer.observe_duration();

    match result {
        Ok((output, stats)) => {
            metrics::SAMPLES_TOTAL.with_label_values(&["ok"]).inc();
            metrics::PROFILES_EXECUTED.inc_by(output.profiles as f64);
            metrics::DROPPED_COUNTERS.inc_by(output.unpackable.len() as f64);
            metrics::record_cache_stats(entry.info.id, stats);

            if !output.unpackable.is_empty() {
                warn!(
                    "{}: {} counters could not be scheduled: {}",
                    entry.info.id,
                    output.unpackable.len(),
                    output.unpackable.join(", ")
                );
            }
            debug!(
                "{}: {} values from {} profiles",
                entry.info.id,
                output.values.len(),
                output.profiles
            );

            GpuReport::success(
                &entry.info,
                &output.values,
                output.unpackable,
                output.unsupported,
            )
        }
        Err(e) => {
            metrics::SAMPLES_TOTAL.with_label_values(&["error"]).inc();
            error!("Giving up on {}: {}", entry.info.id, e);
            GpuReport::failure(&entry.info, e.to_string())
        }
    }
}
