use anyhow::{Context, Result};
use std::path::Path;

use super::types::RunReport;

/// Write the run report as pretty JSON
pub fn write(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::state::{CandidateStatus, CaptchaOutcome, FilterReport, JobCandidate, RunSummary};

    #[test]
    fn test_report_lists_visited_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut skipped = JobCandidate::new(0);
        skipped.title = "Staff PM".into();
        skipped.mark(CandidateStatus::AlreadyApplied);
        let report = RunReport {
            site: "LinkedIn".into(),
            generated_at: "2026-10-18T10:00:00+00:00".into(),
            application: None,
            summary: RunSummary {
                run_id: "run-2".into(),
                captcha: CaptchaOutcome::TimedOut { waited_secs: 300 },
                filters: FilterReport::default(),
                candidates: vec![skipped],
                applied: None,
                duration_ms: 900,
            },
        };

        write(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["application"].is_null());
        assert_eq!(value["summary"]["candidates"][0]["title"], "Staff PM");
        assert_eq!(value["summary"]["captcha"]["type"], "timedOut");
    }

    #[test]
    fn test_unwritable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run.json");
        let report = RunReport {
            site: "LinkedIn".into(),
            generated_at: String::new(),
            application: None,
            summary: RunSummary {
                run_id: "run-3".into(),
                captcha: CaptchaOutcome::NotDetected,
                filters: FilterReport::default(),
                candidates: vec![],
                applied: None,
                duration_ms: 0,
            },
        };
        assert!(write(&report, &path).is_err());
    }
}
