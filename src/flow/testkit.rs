//! Shared fixtures for flow tests: a compact site profile with one-spec
//! chains and a zero-delay configuration

use std::path::Path;

use crate::driver::fake::FakeDriver;
use crate::engine::ManualClock;
use crate::site::{parse_profile_content, SiteProfile};
use crate::utils::config::Config;

use super::context::FlowContext;
use super::events::EventEmitter;

pub const TEST_PROFILE: &str = r##"
name: TestBoard
urls:
  home: "https://jobs.test/"
  search: "https://jobs.test/jobs/search/"
login:
  signIn: { name: sign in, specs: [{ by: path, css: ".sign-in" }] }
  email: { name: email, specs: [{ by: path, css: "#email" }] }
  password: { name: password, specs: [{ by: path, css: "#password" }] }
  submit: { name: submit, specs: [{ by: path, css: "#submit" }] }
  landmarks: { name: landmark, specs: [{ by: path, css: ".nav" }] }
  successUrlFragments: ["/feed"]
captcha:
  markers: [".captcha"]
  textSignatures: ["verify you are human"]
filters:
  - name: Date Posted
    open: { name: date filter, specs: [{ by: path, css: ".date-filter" }] }
    selection:
      kind: toggle
      option: { name: past day, specs: [{ by: path, css: ".past-day" }] }
    confirm:
      name: show results
      specs:
        - { by: path, css: ".show-results" }
        - { by: path, css: ".show-results-alt" }
    dialogScope: { name: dropdown, specs: [{ by: path, css: ".dropdown" }] }
    verify:
      indicator: { name: date chip, specs: [{ by: path, css: ".chip-date" }] }
  - name: Easy Apply
    open: { name: easy filter, specs: [{ by: path, css: ".easy-filter" }] }
    verify:
      urlContains: "f_AL=true"
jobs:
  card: { name: card, specs: [{ by: path, css: ".card" }] }
  title: { name: title, specs: [{ by: path, css: ".title" }] }
  company: { name: company, specs: [{ by: path, css: ".company" }] }
  location: { name: location, specs: [{ by: path, css: ".location" }] }
  link: { name: link, specs: [{ by: path, css: "a.link" }] }
  detailPanel: { name: details, specs: [{ by: path, css: ".details" }] }
  apply: { name: apply, specs: [{ by: path, css: ".apply" }] }
  applyKeywords: ["easy apply"]
  alreadyApplied: { name: applied badge, specs: [{ by: path, css: ".applied-badge" }] }
modal:
  container: { name: modal, specs: [{ by: path, css: ".modal" }] }
  review: { name: review, specs: [{ by: path, css: ".review" }] }
  submit: { name: submit, specs: [{ by: path, css: ".submit" }] }
  next: { name: next, specs: [{ by: path, css: ".next" }] }
  close: { name: close, specs: [{ by: path, css: ".close" }] }
  discard: { name: discard, specs: [{ by: path, css: ".discard" }] }
  success: { name: sent, specs: [{ by: path, css: ".sent" }] }
  requiredFields: ["input[required]"]
"##;

pub fn profile() -> SiteProfile {
    parse_profile_content(TEST_PROFILE, Path::new("test.yaml")).unwrap()
}

/// Config with every pause at zero and short waits
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.email = "pm@example.com".to_string();
    config.password = "secret".to_string();
    let t = &mut config.timeouts;
    t.locator_ms = 1000;
    t.control_ms = 1000;
    t.modal_open_ms = 1000;
    t.detail_panel_ms = 1000;
    t.verify_ms = 2000;
    t.poll_ms = 500;
    t.enable_poll_attempts = 2;
    t.step_delay_ms = 0;
    t.post_login_ms = 0;
    t.human_pause_secs = 0;
    t.captcha_stabilize_secs = 0;
    config
}

pub struct Harness {
    pub clock: ManualClock,
    pub driver: FakeDriver,
    pub profile: SiteProfile,
    pub config: Config,
    pub emitter: EventEmitter,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::new();
        Self {
            driver: FakeDriver::new(clock.clone()),
            clock,
            profile: profile(),
            config: fast_config(),
            emitter: EventEmitter::default(),
        }
    }

    pub fn ctx(&self) -> FlowContext<'_> {
        FlowContext::new(
            &self.driver,
            &self.clock,
            &self.profile,
            &self.config,
            &self.emitter,
        )
    }
}
