use serde::{Deserialize, Serialize};

use crate::report::types::ApplicationRecord;

/// Status of one job card during discovery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CandidateStatus {
    Unvisited,
    AlreadyApplied,
    NoApplyControl,
    Applying,
    Applied,
    Failed { reason: String },
}

/// Job card enumerated from a results listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobCandidate {
    pub index: usize,
    pub title: String,
    pub company: String,
    pub location: String,
    pub application_link: String,
    pub status: CandidateStatus,
}

impl JobCandidate {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            title: String::new(),
            company: String::new(),
            location: String::new(),
            application_link: String::new(),
            status: CandidateStatus::Unvisited,
        }
    }

    pub fn mark(&mut self, status: CandidateStatus) {
        log::debug!(
            "candidate #{} '{}': {:?} -> {:?}",
            self.index,
            self.title,
            self.status,
            status
        );
        self.status = status;
    }

    pub fn label(&self) -> String {
        match (self.title.is_empty(), self.company.is_empty()) {
            (true, _) => format!("job #{}", self.index),
            (false, true) => self.title.clone(),
            (false, false) => format!("{} at {}", self.title, self.company),
        }
    }
}

/// Outcome of one filter step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepStatus {
    Applied,
    /// The filter was already in effect; nothing was clicked
    AlreadySatisfied,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterReport {
    pub steps: Vec<StepReport>,
}

impl FilterReport {
    /// Steps whose filter is in effect
    pub fn in_effect(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !matches!(s.status, StepStatus::Failed { .. }))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed { .. }))
            .count()
    }
}

/// States of the application modal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ModalState {
    Opened,
    AwaitingHuman,
    Stepping,
    Reviewing,
    Submitting,
    Closed,
    Failed,
}

impl ModalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ModalState::Closed | ModalState::Failed)
    }

    /// Transition table of the modal state machine
    pub fn can_transition(self, to: ModalState) -> bool {
        use ModalState::*;
        match (self, to) {
            (from, Failed) => !from.is_terminal(),
            (Opened, AwaitingHuman) | (Opened, Closed) => true,
            (AwaitingHuman, Stepping) => true,
            (Stepping, Reviewing) | (Stepping, Submitting) | (Stepping, Closed) => true,
            (Reviewing, Stepping) | (Reviewing, Closed) => true,
            (Submitting, Closed) => true,
            _ => false,
        }
    }
}

/// How an application modal ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Completion {
    /// No modal appeared; the apply click was the whole application
    Instant,
    /// Submit was clicked
    Submitted { verified: bool },
    /// Stepping ended without a Submit control
    Unconfirmed { verified: bool },
}

impl Completion {
    pub fn counts_as_applied(self) -> bool {
        match self {
            Completion::Instant | Completion::Submitted { .. } => true,
            Completion::Unconfirmed { verified } => verified,
        }
    }
}

/// Result of the CAPTCHA guard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CaptchaOutcome {
    NotDetected,
    Solved { waited_secs: u64 },
    TimedOut { waited_secs: u64 },
}

/// Result of the discovery loop
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Applied {
        record: ApplicationRecord,
        visited: Vec<JobCandidate>,
    },
    NoJobFound {
        visited: Vec<JobCandidate>,
    },
}

impl DiscoveryOutcome {
    pub fn visited(&self) -> &[JobCandidate] {
        match self {
            DiscoveryOutcome::Applied { visited, .. } => visited,
            DiscoveryOutcome::NoJobFound { visited } => visited,
        }
    }

    pub fn record(&self) -> Option<&ApplicationRecord> {
        match self {
            DiscoveryOutcome::Applied { record, .. } => Some(record),
            DiscoveryOutcome::NoJobFound { .. } => None,
        }
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub captcha: CaptchaOutcome,
    pub filters: FilterReport,
    pub candidates: Vec<JobCandidate>,
    pub applied: Option<ApplicationRecord>,
    pub duration_ms: u64,
}
