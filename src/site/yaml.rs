use anyhow::{Context, Result};
use std::path::Path;

use super::profile::SiteProfile;

/// LinkedIn profile shipped with the binary
const LINKEDIN_PROFILE: &str = include_str!("../../sites/linkedin.yaml");

/// Parse the embedded LinkedIn profile
pub fn embedded_profile() -> Result<SiteProfile> {
    parse_profile_content(LINKEDIN_PROFILE, Path::new("sites/linkedin.yaml"))
}

/// Parse a YAML site profile file
pub fn parse_profile_file(path: &Path) -> Result<SiteProfile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_profile_content(&content, path)
}

/// Parse YAML content into a validated SiteProfile
pub fn parse_profile_content(content: &str, source_path: &Path) -> Result<SiteProfile> {
    let profile: SiteProfile = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid site profile: {}", source_path.display()))?;

    profile
        .validate()
        .with_context(|| format!("Invalid site profile: {}", source_path.display()))?;

    Ok(profile)
}

/// Load the profile from a file if given, otherwise the embedded one
pub fn load_profile(path: Option<&Path>) -> Result<SiteProfile> {
    match path {
        Some(path) => parse_profile_file(path),
        None => embedded_profile(),
    }
}
