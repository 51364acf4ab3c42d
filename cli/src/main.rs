//! rocpctl: sample GPU hardware counters
//!
//! Commands:
//! - sample: sample counters on every GPU and print a JSON report
//! - counters: list the counters an agent exposes
//! - agents: list the agents the profiling layer reports

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod backend;
mod commands;
mod output;

#[derive(Parser)]
#[command(name = "rocpctl")]
#[command(about = "rocpctl - GPU hardware counter sampler", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "ROCPCTL_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample counters on every GPU agent
    Sample(commands::sample::SampleArgs),

    /// List the counters an agent supports
    Counters(commands::counters::CountersArgs),

    /// List the agents reported by the profiling layer
    Agents(commands::agents::AgentsArgs),
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Sample(args) => commands::sample::run(args).await,
        Commands::Counters(args) => commands::counters::run(args),
        Commands::Agents(args) => commands::agents::run(args),
    };

    result.map_err(|e| eyre!("{:#}", e))
}

/// Logs go to stderr; stdout carries the report.
fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
}
