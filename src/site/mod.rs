//! Site profiles: the per-board locator tables, declared in YAML

pub mod profile;
pub mod yaml;

pub use profile::{
    CaptchaProfile, FilterStep, JobLocators, LoginLocators, ModalLocators, Selection,
    SiteProfile, SiteUrls, Verification,
};
pub use yaml::{embedded_profile, load_profile, parse_profile_content, parse_profile_file};
