//! Sample command implementation

use crate::backend::BackendArgs;
use crate::output;
use anyhow::{bail, Context, Result};
use clap::Args;
use rocpctl_runner::ptl::PtlStateGuard;
use rocpctl_runner::{metrics, output::write_report, run_sample, RunConfig, SamplerRegistry};
use rocpctl_shared::utils::parse_duration;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Counters to sample (default: the built-in baseline list)
    pub counters: Vec<String>,

    /// Sampling window per profile (e.g. "1000", "500us", "10ms"; bare numbers are microseconds)
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Write the JSON report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "ROCPCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sample agents one after another
    #[arg(long)]
    pub sequential: bool,

    /// Attempts per agent
    #[arg(long)]
    pub retries: Option<u32>,

    /// Do not snapshot and restore PTL power states
    #[arg(long)]
    pub no_ptl_guard: bool,

    /// Write Prometheus metrics in text format after the run
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    #[command(flatten)]
    pub backend: BackendArgs,
}

impl SampleArgs {
    /// Load the layered configuration and apply command line overrides
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::load(self.config.as_deref())?;

        if let Some(duration) = &self.duration {
            let window = parse_duration(duration).context("Failed to parse duration")?;
            config.duration_us =
                u64::try_from(window.as_micros()).context("Duration out of range")?;
        }
        if !self.counters.is_empty() {
            config.counters = self.counters.clone();
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if self.no_ptl_guard {
            config.ptl_guard = false;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn run(args: SampleArgs) -> Result<()> {
    let config = args.run_config()?;
    let backend = args.backend.connect();

    // A simulated device has no power states to protect.
    let _ptl_guard = if config.ptl_guard && !backend.simulated() {
        if !nix::unistd::Uid::effective().is_root() {
            warn!("Not running as root; PTL states may not be restorable");
        }
        let guard = PtlStateGuard::capture(&config.drm_root);
        if !guard.states().is_empty() {
            output::info(&format!("Saved PTL state of {} card(s)", guard.states().len()));
        }
        Some(guard)
    } else {
        None
    };

    let registry = SamplerRegistry::discover_with(backend, config.max_counters_per_profile)
        .context("Failed to discover GPU agents")?;

    let report = run_sample(&registry, &config).await;
    drop(registry);

    write_report(&report, args.output.as_deref())?;
    if let Some(path) = &args.output {
        output::success(&format!("Report written to {}", path.display()));
    }

    if let Some(path) = &args.metrics {
        metrics::write_metrics(path)?;
        info!("Metrics written to {}", path.display());
    }

    output::run_summary(&report);

    if report.all_failed() {
        bail!("Sampling failed on all {} GPU(s)", report.gpu_metrics.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SampleArgs,
    }

    fn parse(args: &[&str]) -> SampleArgs {
        let mut argv = vec!["rocpctl"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "-d",
            "2ms",
            "--sequential",
            "--retries",
            "5",
            "--no-ptl-guard",
            "SQ_WAVES",
        ]);
        let config = args.run_config().unwrap();

        assert_eq!(config.duration_us, 2000);
        assert_eq!(config.counters, vec!["SQ_WAVES"]);
        assert!(!config.parallel);
        assert_eq!(config.retries, 5);
        assert!(!config.ptl_guard);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        assert!(parse(&["-d", "0"]).run_config().is_err());
        assert!(parse(&["-d", "2m"]).run_config().is_err());
        assert!(parse(&["-d", "soon"]).run_config().is_err());
    }

    #[tokio::test]
    async fn test_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.json");
        let metrics_path = dir.path().join("metrics.prom");

        let args = parse(&[
            "-d",
            "100us",
            "--no-ptl-guard",
            "--sim-gpus",
            "2",
            "--output",
            report_path.to_str().unwrap(),
            "--metrics",
            metrics_path.to_str().unwrap(),
            "SQ_WAVES",
            "NOT_A_REAL_COUNTER",
        ]);
        run(args).await.unwrap();

        let text = std::fs::read_to_string(report_path).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["GpuMetrics"].as_array().unwrap().len(), 2);
        assert_eq!(report["Simulated"], true);
        assert_eq!(report["GpuMetrics"][0]["Metrics"][0]["Field"], "SQ_WAVES");
        assert_eq!(
            report["GpuMetrics"][0]["UnsupportedCounters"][0],
            "NOT_A_REAL_COUNTER"
        );
        assert!(metrics_path.exists());
    }
}
