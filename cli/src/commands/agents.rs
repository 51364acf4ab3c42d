//! Agents command implementation

use crate::backend::BackendArgs;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct AgentsArgs {
    /// Print the agent list as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub backend: BackendArgs,
}

pub fn run(args: AgentsArgs) -> Result<()> {
    let agents = args
        .backend
        .connect()
        .agents()
        .context("Failed to enumerate agents")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    let gpus = agents.iter().filter(|a| a.is_gpu()).count();
    output::info(&format!("{} agents ({} GPU)", agents.len(), gpus));
    for agent in &agents {
        println!("{}", output::describe_agent(agent));
    }

    if gpus == 0 {
        output::warning("No GPU agents found");
    }

    Ok(())
}
