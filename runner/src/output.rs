//! JSON report output

use anyhow::{Context, Result};
use rocpctl_shared::RunReport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write `report` as pretty JSON to `output_path`, or to stdout when `None`
pub fn write_report(report: &RunReport, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_json(report, BufWriter::new(file))?;
            info!("Report written to {}", path.display());
        }
        None => write_json(report, std::io::stdout().lock())?,
    }

    Ok(())
}

fn write_json<W: Write>(report: &RunReport, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)
        .context("Failed to serialize report to JSON")?;
    writeln!(writer)?;
    writer.flush().context("Failed to flush report")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocpctl_shared::{AgentId, AgentInfo, AgentKind, GpuReport};
    use std::collections::BTreeMap;

    fn agent() -> AgentInfo {
        AgentInfo {
            id: AgentId(1),
            kind: AgentKind::Gpu,
            name: "gfx942".to_string(),
            gpu_id: 1234,
            drm_render_minor: 128,
            logical_node_id: 1,
        }
    }

    #[test]
    fn test_write_report_file() {
        let mut report = RunReport::new(1000);
        let values = BTreeMap::from([("SQ_WAVES".to_string(), 42.0)]);
        report
            .gpu_metrics
            .push(GpuReport::success(&agent(), &values, Vec::new(), Vec::new()));

        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("report.json");
        write_report(&report, Some(&output_path)).unwrap();

        let contents = std::fs::read_to_string(output_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let gpu = &parsed["GpuMetrics"][0];
        assert_eq!(gpu["GpuId"], "1234");
        assert_eq!(gpu["DrmRenderId"], "128");
        assert_eq!(gpu["Metrics"][0]["Field"], "SQ_WAVES");
        assert_eq!(gpu["Metrics"][0]["Value"], "42");
        assert_eq!(parsed["DurationUs"], 1000);
    }

    #[test]
    fn test_write_report_bad_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("missing").join("report.json");
        assert!(write_report(&RunReport::new(1), Some(&output_path)).is_err());
    }
}
