//! Click strategy executor
//!
//! Applies an escalating ladder of interaction techniques to one resolved
//! element and stops at the first one that does not error.

use std::fmt;

use crate::driver::{BrowserDriver, ClickMode};

use super::clock::Clock;
use super::error::{EngineError, EngineResult};
use super::resolver::ResolvedTarget;
use super::retry::RetryPolicy;

/// Interaction to perform on a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click,
    Fill(String),
    Press(String),
}

/// One rung of an interaction ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Plain,
    ScrollThenClick,
    Forced,
    ScriptDispatch,
    DoubleClick,
    Fill,
    ScrollThenFill,
    Press,
}

const CLICK_LADDER: &[Strategy] = &[
    Strategy::Plain,
    Strategy::ScrollThenClick,
    Strategy::Forced,
    Strategy::ScriptDispatch,
    Strategy::DoubleClick,
];
const FILL_LADDER: &[Strategy] = &[Strategy::Fill, Strategy::ScrollThenFill];
const PRESS_LADDER: &[Strategy] = &[Strategy::Press];

impl Action {
    fn ladder(&self) -> &'static [Strategy] {
        match self {
            Action::Click => CLICK_LADDER,
            Action::Fill(_) => FILL_LADDER,
            Action::Press(_) => PRESS_LADDER,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click => write!(f, "click"),
            Action::Fill(_) => write!(f, "fill"),
            Action::Press(key) => write!(f, "press {}", key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done { strategy: Strategy, attempts: usize },
    Failed { last_error: String, attempts: usize },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }

    pub fn into_result(self, what: &str) -> EngineResult<Strategy> {
        match self {
            Outcome::Done { strategy, .. } => Ok(strategy),
            Outcome::Failed {
                last_error,
                attempts,
            } => Err(EngineError::Driver(anyhow::anyhow!(
                "{} failed after {} strategies: {}",
                what,
                attempts,
                last_error
            ))),
        }
    }
}

pub struct Executor<'a> {
    driver: &'a dyn BrowserDriver,
    clock: &'a dyn Clock,
}

impl<'a> Executor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, clock: &'a dyn Clock) -> Self {
        Self { driver, clock }
    }

    pub async fn invoke(
        &self,
        target: &ResolvedTarget,
        action: &Action,
        policy: &RetryPolicy,
    ) -> Outcome {
        self.invoke_from(target, action, policy, action.ladder()[0])
            .await
    }

    /// Run the ladder starting at `first`; a strategy outside the action's
    /// ladder starts from the bottom rung
    pub async fn invoke_from(
        &self,
        target: &ResolvedTarget,
        action: &Action,
        policy: &RetryPolicy,
        first: Strategy,
    ) -> Outcome {
        let handle = target.handle();

        if matches!(action, Action::Click) {
            self.wait_enabled(&handle, policy).await;
        }

        let ladder = action.ladder();
        let start = ladder.iter().position(|s| *s == first).unwrap_or(0);
        let mut attempts = 0;
        let mut last_error = String::from("no strategy attempted");

        for strategy in &ladder[start..] {
            attempts += 1;
            match self.apply(&handle, action, *strategy).await {
                Ok(()) => {
                    log::debug!("{} on {} succeeded with {:?}", action, handle, strategy);
                    return Outcome::Done {
                        strategy: *strategy,
                        attempts,
                    };
                }
                Err(e) => {
                    log::debug!("{} on {} failed with {:?}: {:#}", action, handle, strategy, e);
                    last_error = format!("{:#}", e);
                }
            }
        }

        log::warn!("{} on {} exhausted all strategies", action, handle);
        Outcome::Failed {
            last_error,
            attempts,
        }
    }

    /// Poll enablement; returns whether the element became enabled
    async fn wait_enabled(&self, handle: &str, policy: &RetryPolicy) -> bool {
        for attempt in 0..=policy.max_attempts {
            match self.driver.is_enabled(handle).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    log::debug!("enablement check failed on {}: {:#}", handle, e);
                    return false;
                }
            }
            if attempt < policy.max_attempts {
                self.clock.sleep(policy.poll_interval).await;
            }
        }
        log::debug!("{} still disabled, trying anyway", handle);
        false
    }

    async fn apply(&self, handle: &str, action: &Action, strategy: Strategy) -> anyhow::Result<()> {
        match (strategy, action) {
            (Strategy::Plain, _) => self.driver.click(handle, ClickMode::Normal).await,
            (Strategy::ScrollThenClick, _) => {
                self.driver.scroll_into_view(handle).await?;
                self.driver.click(handle, ClickMode::Normal).await
            }
            (Strategy::Forced, _) => self.driver.click(handle, ClickMode::Forced).await,
            (Strategy::ScriptDispatch, _) => self.driver.dispatch_click(handle).await,
            (Strategy::DoubleClick, _) => self.driver.double_click(handle).await,
            (Strategy::Fill, Action::Fill(value)) => self.driver.fill(handle, value).await,
            (Strategy::ScrollThenFill, Action::Fill(value)) => {
                self.driver.scroll_into_view(handle).await?;
                self.driver.fill(handle, value).await
            }
            (Strategy::Press, Action::Press(key)) => self.driver.press(handle, key).await,
            (strategy, action) => anyhow::bail!("{:?} does not apply to {}", strategy, action),
        }
    }
}
