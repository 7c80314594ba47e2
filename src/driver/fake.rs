//! Scripted in-memory page for engine tests
//!
//! Elements are registered under the exact selector string the engine will
//! query (without the trailing `>> nth=N`). Waits that would time out advance
//! the shared `ManualClock` by the full timeout.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::driver::traits::{BrowserDriver, ClickMode, ElementState, LoadState};
use crate::engine::clock::ManualClock;

/// How a click reached the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeClick {
    Normal,
    Forced,
    Dispatch,
    Double,
}

/// Page mutation triggered by a successful click
#[derive(Debug, Clone)]
pub enum FakeEffect {
    Add(String, FakeElement),
    Remove(String),
    SetUrl(String),
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub visible: bool,
    pub enabled: bool,
    /// `is_enabled` polls until the element turns enabled
    pub enable_after_polls: usize,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub value: String,
    /// Option values of a select element
    pub options: Vec<String>,
    pub click_failures: HashSet<FakeClick>,
    pub fill_fails: bool,
    pub on_click: Vec<FakeEffect>,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            enabled: true,
            enable_after_polls: 0,
            text: String::new(),
            attrs: HashMap::new(),
            value: String::new(),
            options: Vec::new(),
            click_failures: HashSet::new(),
            fill_fails: false,
            on_click: Vec::new(),
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::visible()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn options(mut self, values: &[&str]) -> Self {
        self.options = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn enabled_after(mut self, polls: usize) -> Self {
        self.enabled = false;
        self.enable_after_polls = polls;
        self
    }

    pub fn fail_on(mut self, kind: FakeClick) -> Self {
        self.click_failures.insert(kind);
        self
    }

    pub fn fail_all_clicks(self) -> Self {
        self.fail_on(FakeClick::Normal)
            .fail_on(FakeClick::Forced)
            .fail_on(FakeClick::Dispatch)
            .fail_on(FakeClick::Double)
    }

    pub fn on_click(mut self, effect: FakeEffect) -> Self {
        self.on_click.push(effect);
        self
    }
}

#[derive(Default)]
struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
    url: String,
    page_text: String,
    network_never_idle: bool,
    dom_never_loaded: bool,
    navigate_fails: bool,
    clicks: Vec<(String, FakeClick)>,
    fills: Vec<(String, String)>,
    selections: Vec<(String, String)>,
    presses: Vec<(String, String)>,
    scrolls: Vec<String>,
    navigations: Vec<String>,
    load_waits: Vec<LoadState>,
    screenshots: Vec<PathBuf>,
    closed: bool,
}

pub struct FakeDriver {
    clock: ManualClock,
    page: Mutex<FakePage>,
}

/// Split `base >> nth=N` into the base selector and index
fn split_nth(selector: &str) -> (&str, usize) {
    if let Some(pos) = selector.rfind(" >> nth=") {
        if let Ok(n) = selector[pos + 8..].parse::<usize>() {
            return (&selector[..pos], n);
        }
    }
    (selector, 0)
}

impl FakeDriver {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            page: Mutex::new(FakePage::default()),
        }
    }

    pub fn add(&self, selector: &str, element: FakeElement) {
        let mut page = self.page.lock().unwrap();
        page.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
    }

    pub fn remove(&self, selector: &str) {
        self.page.lock().unwrap().elements.remove(selector);
    }

    pub fn set_url(&self, url: &str) {
        self.page.lock().unwrap().url = url.to_string();
    }

    pub fn set_page_text(&self, text: &str) {
        self.page.lock().unwrap().page_text = text.to_string();
    }

    pub fn set_network_never_idle(&self, value: bool) {
        self.page.lock().unwrap().network_never_idle = value;
    }

    pub fn set_dom_never_loaded(&self, value: bool) {
        self.page.lock().unwrap().dom_never_loaded = value;
    }

    pub fn set_navigate_fails(&self, value: bool) {
        self.page.lock().unwrap().navigate_fails = value;
    }

    pub fn clicks(&self) -> Vec<(String, FakeClick)> {
        self.page.lock().unwrap().clicks.clone()
    }

    /// Number of clicks of any kind on a selector (exact match)
    pub fn click_count(&self, selector: &str) -> usize {
        self.page
            .lock()
            .unwrap()
            .clicks
            .iter()
            .filter(|(s, _)| s == selector)
            .count()
    }

    /// Number of clicks on any selector starting with the prefix
    pub fn clicks_with_prefix(&self, prefix: &str) -> usize {
        self.page
            .lock()
            .unwrap()
            .clicks
            .iter()
            .filter(|(s, _)| s.starts_with(prefix))
            .count()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.page.lock().unwrap().fills.clone()
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.page.lock().unwrap().selections.clone()
    }

    pub fn presses(&self) -> Vec<(String, String)> {
        self.page.lock().unwrap().presses.clone()
    }

    pub fn scrolls(&self) -> Vec<String> {
        self.page.lock().unwrap().scrolls.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.page.lock().unwrap().navigations.clone()
    }

    pub fn load_waits(&self) -> Vec<LoadState> {
        self.page.lock().unwrap().load_waits.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.page.lock().unwrap().screenshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.page.lock().unwrap().closed
    }

    fn with_element<T>(&self, selector: &str, f: impl FnOnce(&mut FakeElement) -> T) -> Option<T> {
        let (base, nth) = split_nth(selector);
        let mut page = self.page.lock().unwrap();
        page.elements
            .get_mut(base)
            .and_then(|list| list.get_mut(nth))
            .map(f)
    }

    fn record_click(&self, selector: &str, kind: FakeClick) -> Result<()> {
        let effects = {
            let mut page = self.page.lock().unwrap();
            page.clicks.push((selector.to_string(), kind));
            let (base, nth) = split_nth(selector);
            let element = page
                .elements
                .get(base)
                .and_then(|list| list.get(nth))
                .ok_or_else(|| anyhow!("no element for {}", selector))?;
            if element.click_failures.contains(&kind) {
                bail!("{:?} click intercepted on {}", kind, selector);
            }
            element.on_click.clone()
        };

        let mut page = self.page.lock().unwrap();
        for effect in effects {
            match effect {
                FakeEffect::Add(sel, el) => page.elements.entry(sel).or_default().push(el),
                FakeEffect::Remove(sel) => {
                    page.elements.remove(&sel);
                }
                FakeEffect::SetUrl(url) => page.url = url,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn navigate(&self, url: &str, _timeout_ms: u64) -> Result<()> {
        let mut page = self.page.lock().unwrap();
        if page.navigate_fails {
            bail!("net::ERR_NAME_NOT_RESOLVED at {}", url);
        }
        page.navigations.push(url.to_string());
        page.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().url.clone())
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        state: ElementState,
        timeout_ms: u64,
    ) -> Result<bool> {
        let found = self
            .with_element(selector, |el| match state {
                ElementState::Attached => true,
                ElementState::Visible => el.visible,
            })
            .unwrap_or(false);
        if !found {
            self.clock.advance(Duration::from_millis(timeout_ms));
        }
        Ok(found)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let page = self.page.lock().unwrap();
        Ok(page.elements.get(selector).map(|l| l.len()).unwrap_or(0))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        Ok(self.with_element(selector, |el| el.visible).unwrap_or(false))
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool> {
        Ok(self
            .with_element(selector, |el| {
                if !el.enabled && el.enable_after_polls > 0 {
                    el.enable_after_polls -= 1;
                    if el.enable_after_polls == 0 {
                        el.enabled = true;
                    }
                }
                el.enabled
            })
            .unwrap_or(false))
    }

    async fn click(&self, selector: &str, mode: ClickMode) -> Result<()> {
        let kind = match mode {
            ClickMode::Normal => FakeClick::Normal,
            ClickMode::Forced => FakeClick::Forced,
        };
        self.record_click(selector, kind)
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.with_element(selector, |_| ())
            .ok_or_else(|| anyhow!("no element for {}", selector))?;
        self.page.lock().unwrap().scrolls.push(selector.to_string());
        Ok(())
    }

    async fn dispatch_click(&self, selector: &str) -> Result<()> {
        self.record_click(selector, FakeClick::Dispatch)
    }

    async fn double_click(&self, selector: &str) -> Result<()> {
        self.record_click(selector, FakeClick::Double)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let ok = self
            .with_element(selector, |el| {
                if el.fill_fails {
                    false
                } else {
                    el.value = value.to_string();
                    true
                }
            })
            .ok_or_else(|| anyhow!("no element for {}", selector))?;
        if !ok {
            bail!("element is not editable: {}", selector);
        }
        self.page
            .lock()
            .unwrap()
            .fills
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_first_option(&self, selector: &str) -> Result<bool> {
        let chosen = self
            .with_element(selector, |el| {
                if !el.value.is_empty() {
                    return None;
                }
                let option = el.options.iter().find(|o| !o.is_empty())?.clone();
                el.value = option.clone();
                Some(option)
            })
            .ok_or_else(|| anyhow!("no element for {}", selector))?;

        match chosen {
            Some(option) => {
                self.page
                    .lock()
                    .unwrap()
                    .selections
                    .push((selector.to_string(), option));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.with_element(selector, |_| ())
            .ok_or_else(|| anyhow!("no element for {}", selector))?;
        self.page
            .lock()
            .unwrap()
            .presses
            .push((selector.to_string(), key.to_string()));
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.with_element(selector, |el| el.text.clone()))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .with_element(selector, |el| el.attrs.get(name).cloned())
            .flatten())
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        self.with_element(selector, |el| el.value.clone())
            .ok_or_else(|| anyhow!("no element for {}", selector))
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> Result<()> {
        let (never_idle, never_loaded) = {
            let mut page = self.page.lock().unwrap();
            page.load_waits.push(state);
            (page.network_never_idle, page.dom_never_loaded)
        };
        let stuck = match state {
            LoadState::NetworkIdle => never_idle,
            LoadState::DomContentLoaded | LoadState::Load => never_loaded,
        };
        if stuck {
            self.clock.advance(Duration::from_millis(timeout_ms));
            bail!("Timeout {}ms exceeded waiting for {:?}", timeout_ms, state);
        }
        Ok(())
    }

    async fn page_content(&self) -> Result<String> {
        Ok(self.page.lock().unwrap().page_text.clone())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .lock()
            .unwrap()
            .screenshots
            .push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.page.lock().unwrap().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::Clock;

    #[test]
    fn test_split_nth() {
        assert_eq!(split_nth("css=a >> nth=3"), ("css=a", 3));
        assert_eq!(split_nth("css=a >> nth=0 >> css=b"), ("css=a >> nth=0 >> css=b", 0));
        assert_eq!(split_nth("css=a >> nth=0 >> css=b >> nth=2"), ("css=a >> nth=0 >> css=b", 2));
    }

    #[tokio::test]
    async fn test_missing_element_wait_advances_clock() {
        let clock = ManualClock::new();
        let driver = FakeDriver::new(clock.clone());
        let found = driver
            .wait_for_element("css=missing >> nth=0", ElementState::Visible, 1000)
            .await
            .unwrap();
        assert!(!found);
        assert_eq!(clock.now(), Duration::from_secs(1));
    }
}
