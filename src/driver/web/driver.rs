//! Browser driver implementation using Playwright
//!
//! Drives a single Chromium page. The page handle is the only shared
//! resource and is accessed by one flow at a time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::driver::traits::{BrowserDriver, ClickMode, ElementState, LoadState};
use crate::utils::config::BrowserConfig;

/// Interval between polls while waiting on page state
const POLL_MS: u64 = 100;

/// Window without new resource entries that counts as network quiet
const NETWORK_QUIET_MS: u64 = 500;

const RESOURCE_COUNTER_JS: &str = "() => {
    const seen = (window.__jobpilotResources || 0)
        + performance.getEntriesByType('resource').length;
    window.__jobpilotResources = seen;
    performance.clearResourceTimings();
    return seen;
}";

/// Picks the first option with a value, unless one is already chosen
const SELECT_FIRST_OPTION_JS: &str = "el => {
    if (el.value) return false;
    const option = Array.from(el.options || []).find(o => o.value && !o.disabled);
    if (!option) return false;
    el.value = option.value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}";

/// Browser driver using Playwright
pub struct PlaywrightDriver {
    #[allow(dead_code)]
    playwright: Playwright,
    browser: Browser,
    context: BrowserContext,
    page: Mutex<Page>,
    /// Connected to an already running browser over CDP
    attached: bool,
    closed: AtomicBool,
}

impl PlaywrightDriver {
    /// Launch (or attach to) a browser and open a fresh page
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        if config.install_browsers {
            println!("{} Installing Playwright browsers...", "⬇".blue());
            playwright
                .prepare()
                .context("Failed to install Playwright browsers")?;
        }

        let chromium = playwright.chromium();

        let (browser, attached) = match config.cdp_endpoint {
            Some(ref endpoint) => {
                println!(
                    "{} Trying to connect to browser at: {}",
                    "🔌".blue(),
                    endpoint
                );
                match chromium
                    .connect_over_cdp_builder(endpoint)
                    .connect_over_cdp()
                    .await
                {
                    Ok(b) => {
                        println!("{} Connected to existing browser!", "✅".green());
                        (b, true)
                    }
                    Err(e) => {
                        println!(
                            "{} Could not connect to existing browser: {}",
                            "⚠️".yellow(),
                            e
                        );
                        (launch_chromium_browser(&chromium, config).await?, false)
                    }
                }
            }
            None => (launch_chromium_browser(&chromium, config).await?, false),
        };

        // Reuse the first context of an attached browser so its login survives
        let reused_context = if attached {
            browser.contexts()?.into_iter().next()
        } else {
            None
        };

        let context = match reused_context {
            Some(ctx) => {
                println!("{} Reusing existing browser context", "♻️".green());
                ctx
            }
            None => browser
                .context_builder()
                .build()
                .await
                .context("Failed to create browser context")?,
        };

        let page = context
            .new_page()
            .await
            .context("Failed to open a new page")?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;

        Ok(Self {
            playwright,
            browser,
            context,
            page: Mutex::new(page),
            attached,
            closed: AtomicBool::new(false),
        })
    }

    async fn ready_state(&self) -> Result<String> {
        let page = self.page.lock().await;
        let state: String = page
            .evaluate::<(), String>("() => document.readyState", ())
            .await?;
        Ok(state)
    }

    /// Resources finished since the page loaded. The timing buffer is
    /// drained on every read so it never caps at its size limit.
    async fn resource_count(&self) -> Result<u64> {
        let page = self.page.lock().await;
        let count: u64 = page
            .evaluate::<(), u64>(RESOURCE_COUNTER_JS, ())
            .await?;
        Ok(count)
    }

    /// Evaluate a function on the first element matching the selector
    async fn eval_on<T, U>(&self, selector: &str, js: &str, arg: Option<T>) -> Result<U>
    where
        T: serde::Serialize + Send + Sync,
        U: serde::de::DeserializeOwned,
    {
        let page = self.page.lock().await;
        let value = page
            .evaluate_on_selector::<T, U>(selector, js, arg)
            .await
            .with_context(|| format!("Script evaluation failed on '{}'", selector))?;
        Ok(value)
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    fn name(&self) -> &str {
        "playwright"
    }

    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page.lock().await;
        page.goto_builder(url)
            .timeout(timeout_ms as f64)
            .goto()
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.lock().await;
        let url: String = page
            .evaluate::<(), String>("() => location.href", ())
            .await?;
        Ok(url)
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        state: ElementState,
        timeout_ms: u64,
    ) -> Result<bool> {
        match state {
            ElementState::Visible => {
                let page = self.page.lock().await;
                let result = page
                    .wait_for_selector_builder(selector)
                    .timeout(timeout_ms as f64)
                    .wait_for_selector()
                    .await;
                Ok(result.is_ok())
            }
            ElementState::Attached => {
                let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                loop {
                    if self.count(selector).await? > 0 {
                        return Ok(true);
                    }
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    sleep(Duration::from_millis(POLL_MS)).await;
                }
            }
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().await;
        let elements = page.query_selector_all(selector).await?;
        Ok(elements.len())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => Ok(el.is_visible().await?),
            None => Ok(false),
        }
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool> {
        if self.count(selector).await? == 0 {
            return Ok(false);
        }
        self.eval_on::<(), bool>(
            selector,
            "el => !el.disabled && el.getAttribute('aria-disabled') !== 'true'",
            None,
        )
        .await
    }

    async fn click(&self, selector: &str, mode: ClickMode) -> Result<()> {
        let page = self.page.lock().await;
        let builder = page.click_builder(selector).timeout(5000.0);
        let builder = match mode {
            ClickMode::Normal => builder,
            ClickMode::Forced => builder.force(true),
        };
        builder
            .click()
            .await
            .with_context(|| format!("Failed to click: {}", selector))?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => {
                el.scroll_into_view_if_needed(None).await?;
                Ok(())
            }
            None => anyhow::bail!("Element not found for selector: {}", selector),
        }
    }

    async fn dispatch_click(&self, selector: &str) -> Result<()> {
        self.eval_on::<(), ()>(selector, "el => el.click()", None)
            .await
    }

    async fn double_click(&self, selector: &str) -> Result<()> {
        let page = self.page.lock().await;
        page.dblclick_builder(selector).dblclick().await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let page = self.page.lock().await;
        match page.query_selector(selector).await? {
            Some(el) => {
                el.fill_builder(value).fill().await?;
                Ok(())
            }
            None => anyhow::bail!("Element not found for selector: {}", selector),
        }
    }

    async fn select_first_option(&self, selector: &str) -> Result<bool> {
        self.eval_on::<(), bool>(selector, SELECT_FIRST_OPTION_JS, None)
            .await
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.eval_on::<(), ()>(selector, "el => el.focus()", None)
            .await?;
        let page = self.page.lock().await;
        page.keyboard.down(key).await?;
        page.keyboard.up(key).await?;
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        if self.count(selector).await? == 0 {
            return Ok(None);
        }
        self.eval_on::<(), Option<String>>(selector, "el => el.textContent", None)
            .await
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        if self.count(selector).await? == 0 {
            return Ok(None);
        }
        self.eval_on::<String, Option<String>>(
            selector,
            "(el, name) => el.getAttribute(name)",
            Some(name.to_string()),
        )
        .await
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        self.eval_on::<(), String>(selector, "el => el.value || ''", None)
            .await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let ready = self.ready_state().await?;
            let reached = match state {
                LoadState::DomContentLoaded => ready == "interactive" || ready == "complete",
                LoadState::Load => ready == "complete",
                LoadState::NetworkIdle => {
                    let count = self.resource_count().await?;
                    if last_count != Some(count) {
                        last_count = Some(count);
                        quiet_since = Instant::now();
                    }
                    ready == "complete"
                        && quiet_since.elapsed() >= Duration::from_millis(NETWORK_QUIET_MS)
                }
            };

            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Timed out after {}ms waiting for {:?}", timeout_ms, state);
            }
            sleep(Duration::from_millis(POLL_MS)).await;
        }
    }

    async fn page_content(&self) -> Result<String> {
        let page = self.page.lock().await;
        let html = page.content().await?;
        Ok(html)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let page = self.page.lock().await;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        page.screenshot_builder()
            .path(path.to_path_buf())
            .screenshot()
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.attached {
            println!(
                "{} Detaching from browser - browser stays open",
                "📌".cyan()
            );
            let page = self.page.lock().await;
            page.close(None).await.ok();
            return Ok(());
        }

        self.context
            .close()
            .await
            .context("Failed to close browser context")?;
        self.browser
            .close()
            .await
            .context("Failed to close browser")?;
        Ok(())
    }
}

/// Launch a new Chromium browser
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &BrowserConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(PathBuf::from);

    let executable = config
        .executable_path
        .clone()
        .or(env_path)
        .or_else(find_system_browser);

    if let Some(ref path) = executable {
        println!("{} Using browser: {}", "🌐".blue(), path.display());
        launcher = launcher.executable(path);
    } else {
        println!(
            "{} No browser executable found. Using the Playwright default...",
            "ℹ".blue()
        );
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-geolocation",
        "--disable-notifications",
        "--disable-features=ConversionMeasurement,QuietNotificationPrompts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    launcher
        .launch()
        .await
        .context("Failed to launch Chromium")
}

fn find_system_browser() -> Option<PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];

    common_paths
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
