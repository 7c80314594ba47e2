use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Element state to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the DOM
    Attached,
    /// Present and rendered with a non-empty box
    Visible,
}

/// Page load milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// DOMContentLoaded fired
    DomContentLoaded,
    /// Document fully loaded
    Load,
    /// No network activity for a short quiet window
    NetworkIdle,
}

/// How a click is delivered to the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickMode {
    /// Regular click with actionability checks
    Normal,
    /// Click bypassing visibility/overlap checks
    Forced,
}

/// Browser driver interface
///
/// The interaction engine only talks to the page through this trait. Every
/// element-level operation takes a selector string in Playwright syntax
/// (`css=...`, `text=...`, `role=...`, chained with ` >> `), which keeps the
/// engine independent of element handle lifetimes and lets a resolved target
/// be re-queried after the DOM re-renders.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name (e.g. "playwright")
    fn name(&self) -> &str;

    /// Navigate the page to a URL
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Get the current page URL
    async fn current_url(&self) -> Result<String>;

    /// Wait for an element to reach a state
    ///
    /// # Returns
    /// True if the element reached the state, false if the wait timed out
    async fn wait_for_element(
        &self,
        selector: &str,
        state: ElementState,
        timeout_ms: u64,
    ) -> Result<bool>;

    /// Count elements matching the selector, without waiting
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Check if the element is currently visible
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Check if the element is currently enabled
    async fn is_enabled(&self, selector: &str) -> Result<bool>;

    /// Click the element
    async fn click(&self, selector: &str, mode: ClickMode) -> Result<()>;

    /// Scroll the element into the viewport
    async fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Dispatch a click from script (`el.click()`)
    async fn dispatch_click(&self, selector: &str) -> Result<()>;

    /// Double click the element
    async fn double_click(&self, selector: &str) -> Result<()>;

    /// Replace the value of an input element
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Choose the first selectable option of an empty `<select>`.
    /// Returns false when nothing was changed.
    async fn select_first_option(&self, selector: &str) -> Result<bool>;

    /// Press a key while the element is focused
    async fn press(&self, selector: &str, key: &str) -> Result<()>;

    /// Get the text content of an element, None if absent
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Get an attribute of an element, None if absent
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Get the current value of an input element
    async fn input_value(&self, selector: &str) -> Result<String>;

    /// Wait for the page to reach a load state
    async fn wait_for_load_state(&self, state: LoadState, timeout_ms: u64) -> Result<()>;

    /// Get the full page HTML
    async fn page_content(&self) -> Result<String>;

    /// Take a screenshot of the page
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Close the page, context and browser
    async fn close(&self) -> Result<()>;
}
