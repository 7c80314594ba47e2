use std::time::Duration;

use crate::driver::{BrowserDriver, LoadState};

/// Fallback content-loaded wait ceiling
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Which wait ended the settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    NetworkIdle,
    ContentLoaded,
    /// Neither wait succeeded; the caller proceeds anyway
    Unsettled,
}

/// Best-effort "page is stable enough" wait
pub struct WaitCoordinator<'a> {
    driver: &'a dyn BrowserDriver,
}

impl<'a> WaitCoordinator<'a> {
    pub fn new(driver: &'a dyn BrowserDriver) -> Self {
        Self { driver }
    }

    /// Wait for network quiet, falling back to content loaded. Never fails.
    pub async fn settle(&self, primary: Duration) -> Settled {
        let primary_ms = primary.as_millis() as u64;
        match self
            .driver
            .wait_for_load_state(LoadState::NetworkIdle, primary_ms)
            .await
        {
            Ok(()) => return Settled::NetworkIdle,
            Err(e) => log::debug!("network never went quiet: {:#}", e),
        }

        let fallback = primary.min(FALLBACK_TIMEOUT).as_millis() as u64;
        match self
            .driver
            .wait_for_load_state(LoadState::DomContentLoaded, fallback)
            .await
        {
            Ok(()) => Settled::ContentLoaded,
            Err(e) => {
                log::debug!("content-loaded wait failed, continuing: {:#}", e);
                Settled::Unsettled
            }
        }
    }
}
