//! Readiness report: aggregation, console rendering, JSON artifact.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::core::types::{StepStatus, VerificationResult};
use crate::step::StepOutcome;

/// Aggregated result of the final verification phase.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub results: Vec<VerificationResult>,
}

impl ReadinessReport {
    pub fn from_results(results: Vec<VerificationResult>) -> Self {
        Self {
            ready: results.iter().all(|result| result.present),
            results,
        }
    }
}

/// One colored console line per executed step.
pub fn step_line(outcome: &StepOutcome) -> String {
    let tag = match outcome.status {
        StepStatus::Completed => " OK ".green().bold(),
        StepStatus::Skipped => "SKIP".cyan(),
        StepStatus::Failed => "FAIL".red().bold(),
    };
    match &outcome.detail {
        Some(detail) => format!("[{tag}] {} ({detail})", outcome.name),
        None => format!("[{tag}] {}", outcome.name),
    }
}

/// Multi-line human summary of the readiness report.
pub fn summary(report: &ReadinessReport) -> String {
    let mut lines = Vec::with_capacity(report.results.len() + 1);
    for result in &report.results {
        let line = if result.present {
            format!(
                "{:<10} {} {}",
                result.tool,
                "ready".green(),
                result.version.as_deref().unwrap_or("")
            )
        } else {
            format!("{:<10} {}", result.tool, "missing".red().bold())
        };
        lines.push(line.trim_end().to_string());
    }
    let verdict = if report.ready {
        "all capabilities ready".green().to_string()
    } else {
        "host is not ready".red().bold().to_string()
    };
    lines.push(verdict);
    lines.join("\n")
}

/// Atomically write the report JSON next to the run log (temp file + rename).
pub fn write_report(path: &Path, report: &ReadinessReport) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("report path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(report).context("serialize report")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(present: &[bool]) -> Vec<VerificationResult> {
        present
            .iter()
            .enumerate()
            .map(|(i, present)| VerificationResult {
                tool: format!("tool{i}"),
                present: *present,
                version: present.then(|| "v1.0".to_string()),
            })
            .collect()
    }

    #[test]
    fn ready_only_when_every_result_is_present() {
        assert!(ReadinessReport::from_results(results(&[true, true])).ready);
        assert!(!ReadinessReport::from_results(results(&[true, false])).ready);
        assert!(ReadinessReport::from_results(Vec::new()).ready);
    }

    #[test]
    fn summary_names_missing_tools() {
        colored::control::set_override(false);
        let report = ReadinessReport::from_results(results(&[true, false]));
        let text = summary(&report);
        assert!(text.contains("tool0"));
        assert!(text.contains("ready"));
        assert!(text.contains("tool1"));
        assert!(text.contains("missing"));
        assert!(text.contains("host is not ready"));
    }

    #[test]
    fn report_round_trips_through_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        let report = ReadinessReport::from_results(results(&[true]));

        write_report(&path, &report).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&contents).expect("parse");
        assert_eq!(value["ready"], true);
        assert_eq!(value["results"][0]["tool"], "tool0");
    }
}
