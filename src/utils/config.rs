use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
///
/// Loaded once before a run. Precedence, lowest first: defaults, YAML file,
/// `JOBPILOT_*` environment variables, command line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Login email
    pub email: String,

    /// Login password
    #[serde(skip_serializing)]
    pub password: String,

    pub search: SearchConfig,
    pub browser: BrowserConfig,
    pub timeouts: Timeouts,
    pub limits: Limits,
    pub autofill: AutofillProfile,
    pub smtp: SmtpConfig,

    /// Directory for reports and failure screenshots
    pub output_dir: PathBuf,

    /// Site profile overriding the embedded one
    pub locators: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            search: SearchConfig::default(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
            limits: Limits::default(),
            autofill: AutofillProfile::default(),
            smtp: SmtpConfig::default(),
            output_dir: PathBuf::from("./output"),
            locators: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub keywords: String,
    pub location: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: "Product Manager".to_string(),
            location: "India".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Attach to a running browser instead of launching one
    pub cdp_endpoint: Option<String>,

    /// Chromium executable; discovered when unset
    pub executable_path: Option<PathBuf>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Download Playwright browsers before launching
    pub install_browsers: bool,

    /// Keep a headed browser open after a fatal error until Ctrl+C
    pub hold_on_failure: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            cdp_endpoint: None,
            executable_path: None,
            viewport_width: 1280,
            viewport_height: 800,
            install_browsers: false,
            hold_on_failure: true,
        }
    }
}

/// Wait budgets. Millisecond fields end in `_ms`, second fields in `_secs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    /// Budget for one logical action (a whole locator chain)
    pub action_ms: u64,
    /// Wait for one locator candidate
    pub locator_ms: u64,
    pub poll_ms: u64,
    pub enable_poll_attempts: u32,
    pub navigation_ms: u64,
    pub settle_ms: u64,
    /// Filter verification poll
    pub verify_ms: u64,
    pub detail_panel_ms: u64,
    pub modal_open_ms: u64,
    /// Wait for each modal control (Review, Submit, Next, Close)
    pub control_ms: u64,
    /// Pause after clicking a modal control
    pub step_delay_ms: u64,
    pub post_login_ms: u64,
    pub human_pause_secs: u64,
    pub human_pause_slice_secs: u64,
    pub captcha_ceiling_secs: u64,
    pub captcha_poll_secs: u64,
    pub captcha_status_secs: u64,
    pub captcha_stabilize_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: 30000,
            locator_ms: 6000,
            poll_ms: 500,
            enable_poll_attempts: 10,
            navigation_ms: 30000,
            settle_ms: 10000,
            verify_ms: 5000,
            detail_panel_ms: 5000,
            modal_open_ms: 5000,
            control_ms: 3000,
            step_delay_ms: 2000,
            post_login_ms: 5000,
            human_pause_secs: 30,
            human_pause_slice_secs: 5,
            captcha_ceiling_secs: 300,
            captcha_poll_secs: 3,
            captcha_status_secs: 30,
            captcha_stabilize_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    /// Job cards inspected per run
    pub max_candidates: usize,
    /// Stepping iterations inside one application modal
    pub max_steps: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            max_steps: 10,
        }
    }
}

/// Placeholder values for required form fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AutofillProfile {
    pub phone: String,
    pub email: String,
    pub name: String,
    pub years: String,
    pub fallback: String,
}

impl Default for AutofillProfile {
    fn default() -> Self {
        Self {
            phone: "+1234567890".to_string(),
            email: "user@example.com".to_string(),
            name: "John Doe".to_string(),
            years: "5".to_string(),
            fallback: "N/A".to_string(),
        }
    }
}

/// Mail server for sending the application record after a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

impl SmtpConfig {
    /// Mail goes out only once both ends are known
    pub fn is_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false);
        set(&self.from) && set(&self.to)
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jobpilot").join("config.yaml"))
    }

    /// Load from an explicit file, or the default location if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        load_dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Overlay `JOBPILOT_*` variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(email) = lookup("JOBPILOT_EMAIL") {
            self.email = email;
        }
        if let Some(password) = lookup("JOBPILOT_PASSWORD") {
            self.password = password;
        }
        if let Some(headless) = lookup("JOBPILOT_HEADLESS") {
            self.browser.headless = parse_bool(&headless)
                .with_context(|| format!("Invalid JOBPILOT_HEADLESS value: {}", headless))?;
        }
        if let Some(endpoint) = lookup("JOBPILOT_CDP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.browser.cdp_endpoint = Some(endpoint);
            }
        }

        if let Some(host) = lookup("JOBPILOT_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = lookup("JOBPILOT_SMTP_PORT") {
            self.smtp.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid JOBPILOT_SMTP_PORT value: {}", port))?;
        }
        let smtp = &mut self.smtp;
        for (key, slot) in [
            ("JOBPILOT_SMTP_USERNAME", &mut smtp.username),
            ("JOBPILOT_SMTP_PASSWORD", &mut smtp.password),
            ("JOBPILOT_SMTP_FROM", &mut smtp.from),
            ("JOBPILOT_SMTP_TO", &mut smtp.to),
        ] {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }
        Ok(())
    }

    /// Ask for whichever login credential is still empty.
    /// `ask` receives the prompt and whether the answer is secret.
    pub fn prompt_credentials<F>(&mut self, mut ask: F) -> Result<()>
    where
        F: FnMut(&str, bool) -> Result<String>,
    {
        if self.email.trim().is_empty() {
            self.email = ask("Email", false)?.trim().to_string();
        }
        if self.password.is_empty() {
            self.password = ask("Password", true)?;
        }
        Ok(())
    }

    /// Reject settings that would make a wait loop spin
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.captcha_poll_secs == 0 {
            anyhow::bail!("captchaPollSecs must be greater than zero");
        }
        if self.timeouts.human_pause_secs > 0 && self.timeouts.human_pause_slice_secs == 0 {
            anyhow::bail!("humanPauseSliceSecs must be greater than zero");
        }
        if self.limits.max_candidates == 0 {
            anyhow::bail!("maxCandidates must be greater than zero");
        }
        Ok(())
    }
}

/// Read a `.env` file from the working directory into the environment
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("ignoring .env file: {}", e),
    }
}

/// Prompt on the terminal; secrets are read without echo
pub fn ask_terminal(prompt: &str, secret: bool) -> Result<String> {
    use std::io::{BufRead, Write};

    if secret {
        return rpassword::prompt_password(format!("{}: ", prompt))
            .with_context(|| format!("Failed to read {}", prompt.to_lowercase()));
    }

    print!("{}: ", prompt);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}
