pub mod csv;
pub mod json;
pub mod mailer;
pub mod types;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::flow::state::RunSummary;
use types::RunReport;

/// Files written for one run
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub csv: Option<PathBuf>,
    pub json: PathBuf,
}

/// Write the CSV record (when a job was applied) and the JSON run report
pub fn write_reports(summary: &RunSummary, site: &str, output_dir: &Path) -> Result<ReportPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let now = chrono::Local::now();
    let stem = format!(
        "{}_job_{}",
        site.to_lowercase().replace(' ', "_"),
        now.format("%Y%m%d_%H%M%S")
    );

    let csv_path = match summary.applied {
        Some(ref record) => {
            let path = output_dir.join(format!("{}.csv", stem));
            csv::generate(record, site, &path)?;
            Some(path)
        }
        None => None,
    };

    let report = RunReport {
        site: site.to_string(),
        generated_at: now.to_rfc3339(),
        application: summary.applied.clone(),
        summary: summary.clone(),
    };
    let json_path = output_dir.join(format!("{}.json", stem));
    json::write(&report, &json_path)?;

    Ok(ReportPaths {
        csv: csv_path,
        json: json_path,
    })
}
