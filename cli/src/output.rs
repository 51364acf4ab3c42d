//! Status messages for CLI commands
//!
//! Everything here goes to stderr so it never mixes with a report on stdout.

use colored::Colorize;
use rocpctl_shared::{AgentInfo, RunReport};

pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// One status line per failed agent, then an overall line
pub fn run_summary(report: &RunReport) {
    for gpu in report.gpu_metrics.iter().filter(|g| !g.is_ok()) {
        error(&format!(
            "GPU {} (renderD{}): {}",
            gpu.gpu_id,
            gpu.drm_render_id,
            gpu.error.as_deref().unwrap_or("unknown error")
        ));
    }

    let total = report.gpu_metrics.len();
    let failed = report.failed_count();
    let dropped: usize = report
        .gpu_metrics
        .iter()
        .map(|g| g.dropped_counters.len())
        .sum();

    if failed == 0 {
        success(&format!("Sampled {} GPU(s)", total));
    } else {
        warning(&format!("{} of {} GPU(s) failed", failed, total));
    }
    if dropped > 0 {
        warning(&format!("{} counter(s) could not be scheduled", dropped));
    }
}

/// Short human-readable description of an agent
pub fn describe_agent(agent: &AgentInfo) -> String {
    if agent.is_gpu() {
        format!(
            "{} {} gpu_id={} renderD{} node={}",
            agent.id.to_string().bold(),
            agent.name,
            agent.gpu_id,
            agent.drm_render_minor,
            agent.logical_node_id
        )
    } else {
        format!("{} {} (cpu)", agent.id.to_string().bold(), agent.name)
    }
}
