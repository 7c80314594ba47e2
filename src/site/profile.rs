use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, EngineResult, LocatorChain};

/// Locator tables and URLs for one job board
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProfile {
    pub name: String,
    pub urls: SiteUrls,
    pub login: LoginLocators,
    pub captcha: CaptchaProfile,
    #[serde(default)]
    pub filters: Vec<FilterStep>,
    pub jobs: JobLocators,
    pub modal: ModalLocators,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteUrls {
    pub home: String,
    /// Search results page; keywords and location are added as query parameters
    pub search: String,
    #[serde(default = "default_keywords_param")]
    pub keywords_param: String,
    #[serde(default = "default_location_param")]
    pub location_param: String,
}

fn default_keywords_param() -> String {
    "keywords".to_string()
}

fn default_location_param() -> String {
    "location".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginLocators {
    /// Control that reveals the login form, if the home page needs one
    #[serde(default)]
    pub sign_in: Option<LocatorChain>,
    pub email: LocatorChain,
    pub password: LocatorChain,
    pub submit: LocatorChain,
    /// Present once logged in
    pub landmarks: LocatorChain,
    /// URL fragments seen once logged in
    #[serde(default)]
    pub success_url_fragments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaProfile {
    /// CSS selectors of CAPTCHA widgets
    pub markers: Vec<String>,
    /// Lower-case phrases searched for in the page HTML
    #[serde(default)]
    pub text_signatures: Vec<String>,
}

/// How the options of a filter are picked
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Selection {
    /// The open control is itself the toggle
    #[default]
    None,
    Toggle { option: LocatorChain },
    /// Type into a search box, then pick a suggestion
    Search {
        input: LocatorChain,
        query: String,
        pick: LocatorChain,
    },
}

/// Post-condition showing that a filter took effect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verification {
    /// A chip or applied indicator becomes visible
    Indicator(LocatorChain),
    /// The results URL carries the filter parameter
    UrlContains(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStep {
    pub name: String,
    pub open: LocatorChain,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub confirm: Option<LocatorChain>,
    /// Dialog the confirm control must be found in
    #[serde(default)]
    pub dialog_scope: Option<LocatorChain>,
    /// `{ indicator: <chain> }` or `{ urlContains: <fragment> }`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub verify: Verification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLocators {
    pub card: LocatorChain,
    pub title: LocatorChain,
    pub company: LocatorChain,
    pub location: LocatorChain,
    /// Anchor whose href is the job link, resolved inside the card
    pub link: LocatorChain,
    pub detail_panel: LocatorChain,
    pub apply: LocatorChain,
    /// The apply control's text must contain one of these
    pub apply_keywords: Vec<String>,
    pub already_applied: LocatorChain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalLocators {
    pub container: LocatorChain,
    pub review: LocatorChain,
    pub submit: LocatorChain,
    pub next: LocatorChain,
    pub close: LocatorChain,
    /// Confirmation shown when closing an unfinished application
    #[serde(default)]
    pub discard: Option<LocatorChain>,
    pub success: LocatorChain,
    /// CSS selectors of required inputs and textareas
    pub required_fields: Vec<String>,
}

impl SiteProfile {
    /// Checks that deserialization alone cannot express
    pub fn validate(&self) -> EngineResult<()> {
        url::Url::parse(&self.urls.home)
            .map_err(|e| EngineError::InvalidProfile(format!("home url: {}", e)))?;
        url::Url::parse(&self.urls.search)
            .map_err(|e| EngineError::InvalidProfile(format!("search url: {}", e)))?;

        if self.jobs.apply_keywords.is_empty() {
            return Err(EngineError::InvalidProfile(
                "jobs.applyKeywords must not be empty".to_string(),
            ));
        }
        if self.captcha.markers.is_empty() && self.captcha.text_signatures.is_empty() {
            return Err(EngineError::InvalidProfile(
                "captcha needs markers or text signatures".to_string(),
            ));
        }
        for step in &self.filters {
            if step.name.trim().is_empty() {
                return Err(EngineError::InvalidProfile(
                    "filter step without a name".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Every locator chain in the profile, for listing and checks
    pub fn chains(&self) -> Vec<&LocatorChain> {
        let mut chains = Vec::new();
        chains.extend(self.login.sign_in.iter());
        chains.extend([
            &self.login.email,
            &self.login.password,
            &self.login.submit,
            &self.login.landmarks,
        ]);
        for step in &self.filters {
            chains.push(&step.open);
            match &step.selection {
                Selection::None => {}
                Selection::Toggle { option } => chains.push(option),
                Selection::Search { input, pick, .. } => {
                    chains.push(input);
                    chains.push(pick);
                }
            }
            chains.extend(step.confirm.iter());
            chains.extend(step.dialog_scope.iter());
            if let Verification::Indicator(chain) = &step.verify {
                chains.push(chain);
            }
        }
        chains.extend([
            &self.jobs.card,
            &self.jobs.title,
            &self.jobs.company,
            &self.jobs.location,
            &self.jobs.link,
            &self.jobs.detail_panel,
            &self.jobs.apply,
            &self.jobs.already_applied,
            &self.modal.container,
            &self.modal.review,
            &self.modal.submit,
            &self.modal.next,
            &self.modal.close,
        ]);
        chains.extend(self.modal.discard.iter());
        chains.push(&self.modal.success);
        chains
    }
}
