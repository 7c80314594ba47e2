//! Locator chain resolution
//!
//! Tries the specs of a chain in order and pins the first visible match.

use std::time::Duration;

use crate::driver::{BrowserDriver, ElementState};

use super::clock::Clock;
use super::error::{EngineError, EngineResult};
use super::locator::LocatorChain;
use super::retry::RetryPolicy;

/// A chain resolved to one concrete element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Compiled selector of the matching spec, including any scope prefix
    selector: String,
    nth: usize,
    spec_index: usize,
    resolved_at: Duration,
}

impl ResolvedTarget {
    pub fn new(selector: String, nth: usize, spec_index: usize, resolved_at: Duration) -> Self {
        Self {
            selector,
            nth,
            spec_index,
            resolved_at,
        }
    }

    /// Selector pinned to the matched element
    pub fn handle(&self) -> String {
        format!("{} >> nth={}", self.selector, self.nth)
    }

    /// Selector matching every element of the spec that matched
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Index of the matching spec within its chain
    pub fn spec_index(&self) -> usize {
        self.spec_index
    }

    /// Clock reading at resolution
    pub fn resolved_at(&self) -> Duration {
        self.resolved_at
    }

    /// Sibling match of the same spec
    pub fn nth(&self, index: usize) -> ResolvedTarget {
        ResolvedTarget {
            nth: index,
            ..self.clone()
        }
    }

    /// Selector for `inner` scoped inside this element
    pub fn scoped(&self, inner: &str) -> String {
        format!("{} >> {}", self.handle(), inner)
    }
}

/// Outcome of resolving a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedTarget),
    NotFound { chain: String, tried: usize },
}

impl Resolution {
    pub fn found(self) -> Option<ResolvedTarget> {
        match self {
            Resolution::Found(target) => Some(target),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn into_result(self) -> EngineResult<ResolvedTarget> {
        match self {
            Resolution::Found(target) => Ok(target),
            Resolution::NotFound { chain, tried } => Err(EngineError::NotFound { chain, tried }),
        }
    }
}

/// Resolves locator chains against the page
pub struct Resolver<'a> {
    driver: &'a dyn BrowserDriver,
    clock: &'a dyn Clock,
}

impl<'a> Resolver<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, clock: &'a dyn Clock) -> Self {
        Self { driver, clock }
    }

    /// Resolve a chain against the whole page
    pub async fn resolve(&self, chain: &LocatorChain, policy: &RetryPolicy) -> Resolution {
        self.resolve_from(None, chain, policy, 0).await
    }

    /// Resolve a chain inside an already resolved element
    pub async fn resolve_within(
        &self,
        scope: &ResolvedTarget,
        chain: &LocatorChain,
        policy: &RetryPolicy,
    ) -> Resolution {
        self.resolve_from(Some(scope), chain, policy, 0).await
    }

    /// Resolve starting at spec `start`, skipping the earlier ones
    pub async fn resolve_from(
        &self,
        scope: Option<&ResolvedTarget>,
        chain: &LocatorChain,
        policy: &RetryPolicy,
        start: usize,
    ) -> Resolution {
        let started = self.clock.now();
        let mut tried = 0;

        for (index, spec) in chain.specs().iter().enumerate().skip(start) {
            let elapsed = self.clock.since(started);
            if elapsed >= policy.total_budget {
                log::debug!(
                    "'{}': budget of {}ms spent after {} locator(s)",
                    chain.name(),
                    policy.total_budget.as_millis(),
                    tried
                );
                break;
            }

            tried += 1;
            let selector = scoped_selector(scope, &spec.to_selector());
            let first = format!("{} >> nth=0", selector);

            match self
                .driver
                .wait_for_element(&first, ElementState::Visible, policy.per_attempt_ms())
                .await
            {
                Ok(true) => {
                    log::debug!("'{}': matched locator #{} ({})", chain.name(), index, selector);
                    return Resolution::Found(ResolvedTarget::new(
                        selector,
                        0,
                        index,
                        self.clock.now(),
                    ));
                }
                Ok(false) => log::debug!("'{}': no match for {}", chain.name(), selector),
                Err(e) => log::debug!("'{}': error on {}: {:#}", chain.name(), selector, e),
            }
        }

        Resolution::NotFound {
            chain: chain.name().to_string(),
            tried,
        }
    }

    /// Whether any spec of the chain has a visible match right now
    pub async fn is_present(&self, scope: Option<&ResolvedTarget>, chain: &LocatorChain) -> bool {
        for spec in chain.specs() {
            let selector = scoped_selector(scope, &spec.to_selector());
            match self.driver.is_visible(&format!("{} >> nth=0", selector)).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => log::debug!("presence check '{}' failed on {}: {:#}", chain.name(), selector, e),
            }
        }
        false
    }

    /// Number of elements matched by the target's spec
    pub async fn count(&self, target: &ResolvedTarget) -> usize {
        match self.driver.count(target.selector()).await {
            Ok(n) => n,
            Err(e) => {
                log::warn!("count failed on {}: {:#}", target.selector(), e);
                0
            }
        }
    }
}

fn scoped_selector(scope: Option<&ResolvedTarget>, selector: &str) -> String {
    match scope {
        Some(scope) => scope.scoped(selector),
        None => selector.to_string(),
    }
}
