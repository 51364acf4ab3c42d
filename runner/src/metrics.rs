//! Prometheus metrics for sampling runs

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_gauge_vec, Counter,
    CounterVec, Encoder, Histogram, IntGaugeVec, TextEncoder,
};
use rocpctl_sampler::CacheStats;
use rocpctl_shared::AgentId;
use std::path::Path;

// ── Sampling ─────────────────────────────────────────────────────────────────

pub static SAMPLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("rocpctl_samples_total", "Per-agent sampling runs", &["status"])
        .expect("register rocpctl_samples_total")
});

pub static PROFILES_EXECUTED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "rocpctl_profiles_executed_total",
        "Profiles armed and read back"
    )
    .expect("register rocpctl_profiles_executed_total")
});

pub static DROPPED_COUNTERS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "rocpctl_dropped_counters_total",
        "Supported counters no profile could be built for"
    )
    .expect("register rocpctl_dropped_counters_total")
});

pub static SAMPLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rocpctl_sample_duration_seconds",
        "Wall time to sample one agent, retries included",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .expect("register rocpctl_sample_duration_seconds")
});

// ── Profile cache ────────────────────────────────────────────────────────────

pub static PROFILE_CACHE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "rocpctl_profile_cache_lookups",
        "Profile cache lookups per agent",
        &["agent", "result"]
    )
    .expect("register rocpctl_profile_cache_lookups")
});

/// Publish an agent's cache statistics
pub fn record_cache_stats(agent: AgentId, stats: CacheStats) {
    let agent = agent.to_string();
    PROFILE_CACHE
        .with_label_values(&[agent.as_str(), "hit"])
        .set(stats.hits as i64);
    PROFILE_CACHE
        .with_label_values(&[agent.as_str(), "miss"])
        .set(stats.misses as i64);
}

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics exposition is not valid UTF-8")
}

/// Write the text exposition to `path`
pub fn write_metrics(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        SAMPLES_TOTAL.with_label_values(&["ok"]).inc();
        record_cache_stats(AgentId(7), CacheStats { hits: 2, misses: 1 });

        let text = encode_metrics().unwrap();
        assert!(text.contains("rocpctl_samples_total"));
        assert!(text.contains("rocpctl_profile_cache_lookups{agent=\"agent-7\",result=\"hit\"} 2"));
    }

    #[test]
    fn test_write_metrics() {
        PROFILES_EXECUTED.inc();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");

        write_metrics(&path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("rocpctl_profiles_executed_total"));
    }
}
