use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::flow::state::{JobCandidate, RunSummary};

/// The one job applied to in a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub applied_date: String,
}

impl ApplicationRecord {
    pub fn from_candidate(candidate: &JobCandidate, applied_at: DateTime<Local>) -> Self {
        Self {
            title: candidate.title.clone(),
            company: candidate.company.clone(),
            location: candidate.location.clone(),
            link: candidate.application_link.clone(),
            applied_date: applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Labelled fields in report order
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("Job Title", self.title.as_str()),
            ("Company", self.company.as_str()),
            ("Location", self.location.as_str()),
            ("Link", self.link.as_str()),
            ("Applied Date", self.applied_date.as_str()),
        ]
    }
}

/// Run results for report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub site: String,
    pub generated_at: String,
    pub application: Option<ApplicationRecord>,
    pub summary: RunSummary,
}
