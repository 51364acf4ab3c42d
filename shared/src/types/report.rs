//! Run report data structures
//!
//! The report is what `rocpctl sample` prints. Field names follow the
//! layout consumed by the metrics exporter (`GpuMetrics[].Metrics[].Field`),
//! values are rendered as strings.

use crate::types::agent::AgentInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of sampling one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Ok,
    Error,
}

/// One counter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub field: String,
    pub value: String,
}

/// Per-agent section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GpuReport {
    pub gpu_id: String,
    pub drm_render_id: String,
    pub logical_node_id: String,
    pub metrics: Vec<MetricValue>,
    pub status: AgentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Counters that were supported but could not be packed into any profile
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_counters: Vec<String>,

    /// Requested counters the device does not expose
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_counters: Vec<String>,
}

impl GpuReport {
    /// Build the section for a successfully sampled agent
    pub fn success(
        agent: &AgentInfo,
        values: &BTreeMap<String, f64>,
        dropped_counters: Vec<String>,
        unsupported_counters: Vec<String>,
    ) -> Self {
        Self {
            gpu_id: agent.gpu_id.to_string(),
            drm_render_id: agent.drm_render_minor.to_string(),
            logical_node_id: agent.logical_node_id.to_string(),
            metrics: values
                .iter()
                .map(|(field, value)| MetricValue {
                    field: field.clone(),
                    value: format_value(*value),
                })
                .collect(),
            status: AgentStatus::Ok,
            error: None,
            dropped_counters,
            unsupported_counters,
        }
    }

    /// Build the section for an agent whose sampling failed
    pub fn failure(agent: &AgentInfo, error: impl Into<String>) -> Self {
        Self {
            gpu_id: agent.gpu_id.to_string(),
            drm_render_id: agent.drm_render_minor.to_string(),
            logical_node_id: agent.logical_node_id.to_string(),
            metrics: Vec::new(),
            status: AgentStatus::Error,
            error: Some(error.into()),
            dropped_counters: Vec::new(),
            unsupported_counters: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok
    }
}

/// Complete result of one `sample` run across all agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunReport {
    pub gpu_metrics: Vec<GpuReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// RFC 3339 timestamp taken when the run started
    pub timestamp: String,

    /// Sampling window per profile, in microseconds
    pub duration_us: u64,

    /// Values come from a simulated device, not hardware
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

impl RunReport {
    pub fn new(duration_us: u64) -> Self {
        Self {
            gpu_metrics: Vec::new(),
            host: None,
            timestamp: crate::utils::time::rfc3339_now(),
            duration_us,
            simulated: false,
        }
    }

    /// Number of agents whose sampling failed
    pub fn failed_count(&self) -> usize {
        self.gpu_metrics.iter().filter(|g| !g.is_ok()).count()
    }

    /// True when there was at least one agent and none succeeded
    pub fn all_failed(&self) -> bool {
        !self.gpu_metrics.is_empty() && self.failed_count() == self.gpu_metrics.len()
    }
}

/// Render a counter value: integral values without a fractional part.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::agent::{AgentId, AgentKind};

    fn agent() -> AgentInfo {
        AgentInfo {
            id: AgentId(2),
            kind: AgentKind::Gpu,
            name: "gfx942".to_string(),
            gpu_id: 45678,
            drm_render_minor: 128,
            logical_node_id: 1,
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(-3.0), "-3");
    }

    #[test]
    fn test_success_report_shape() {
        let mut values = BTreeMap::new();
        values.insert("SQ_WAVES".to_string(), 12.0);
        values.insert("GRBM_COUNT".to_string(), 3.0);

        let gpu = GpuReport::success(&agent(), &values, vec![], vec!["BOGUS".to_string()]);
        let json = serde_json::to_value(&gpu).unwrap();

        assert_eq!(json["GpuId"], "45678");
        assert_eq!(json["DrmRenderId"], "128");
        assert_eq!(json["LogicalNodeId"], "1");
        assert_eq!(json["Status"], "ok");
        assert_eq!(json["Metrics"][0]["Field"], "GRBM_COUNT");
        assert_eq!(json["Metrics"][1]["Value"], "12");
        assert_eq!(json["UnsupportedCounters"][0], "BOGUS");
        assert!(json.get("Error").is_none());
        assert!(json.get("DroppedCounters").is_none());
    }

    #[test]
    fn test_failure_report() {
        let gpu = GpuReport::failure(&agent(), "context start failed");
        assert!(!gpu.is_ok());

        let json = serde_json::to_value(&gpu).unwrap();
        assert_eq!(json["Status"], "error");
        assert_eq!(json["Error"], "context start failed");
        assert_eq!(json["Metrics"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_run_report_failure_accounting() {
        let mut report = RunReport::new(1000);
        assert!(!report.all_failed());

        report.gpu_metrics.push(GpuReport::failure(&agent(), "boom"));
        assert!(report.all_failed());

        report
            .gpu_metrics
            .push(GpuReport::success(&agent(), &BTreeMap::new(), vec![], vec![]));
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_failed());
    }

    #[test]
    fn test_run_report_roundtrip_field_names() {
        let report = RunReport::new(250);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"GpuMetrics\""));
        assert!(json.contains("\"DurationUs\":250"));
        assert!(!json.contains("Simulated"));

        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.duration_us, 250);
    }

    #[test]
    fn test_simulated_run_is_flagged() {
        let mut report = RunReport::new(250);
        report.simulated = true;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["Simulated"], true);
    }
}
