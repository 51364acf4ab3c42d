//! Counters command implementation

use crate::backend::BackendArgs;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use rocpctl_runner::SamplerRegistry;
use rocpctl_shared::{AgentId, Counter};
use std::sync::PoisonError;

#[derive(Args, Debug)]
pub struct CountersArgs {
    /// Agent to query (default: the first GPU)
    #[arg(short, long)]
    pub agent: Option<u64>,

    /// Print the counter list as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

pub fn run(args: CountersArgs) -> Result<()> {
    let registry =
        SamplerRegistry::discover(args.backend.connect()).context("Failed to discover GPU agents")?;

    let entry = match args.agent {
        Some(id) => registry
            .samplers()
            .iter()
            .find(|s| s.info.id == AgentId(id))
            .with_context(|| format!("No GPU agent with id {}", id))?,
        None => registry
            .samplers()
            .first()
            .context("No GPU agents found")?,
    };

    let counters = entry
        .sampler
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .supported_counters()
        .with_context(|| format!("Failed to list counters of {}", entry.info.id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&counters)?);
    } else {
        output::info(&format!(
            "{} counters on {}",
            counters.len(),
            output::describe_agent(&entry.info)
        ));
        for counter in &counters {
            println!("{}", format_counter(counter));
        }
    }

    Ok(())
}

fn format_counter(counter: &Counter) -> String {
    let dims: Vec<String> = counter
        .dimensions
        .iter()
        .map(|d| format!("{}[{}]", d.name, d.instance_size))
        .collect();
    let dims = if dims.is_empty() {
        "-".to_string()
    } else {
        dims.join(" x ")
    };

    format!(
        "{:<40} {:>6} records  {}",
        counter.name.bold(),
        counter.record_count(),
        dims.dimmed()
    )
}
