use std::path::PathBuf;
use std::time::Duration;

use crate::driver::BrowserDriver;
use crate::engine::{
    Action, Clock, EngineResult, Executor, LocatorChain, ResolvedTarget, Resolution, Resolver,
    RetryPolicy, Settled, Strategy, WaitCoordinator,
};
use crate::site::SiteProfile;
use crate::utils::config::Config;

use super::events::EventEmitter;

/// Everything one run's flows borrow: the page, time, locator tables,
/// settings and the status channel
pub struct FlowContext<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub clock: &'a dyn Clock,
    pub profile: &'a SiteProfile,
    pub config: &'a Config,
    pub emitter: &'a EventEmitter,
}

impl<'a> FlowContext<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        clock: &'a dyn Clock,
        profile: &'a SiteProfile,
        config: &'a Config,
        emitter: &'a EventEmitter,
    ) -> Self {
        Self {
            driver,
            clock,
            profile,
            config,
            emitter,
        }
    }

    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.driver, self.clock)
    }

    pub fn executor(&self) -> Executor<'a> {
        Executor::new(self.driver, self.clock)
    }

    /// Default policy for locator lookups
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_timeouts(&self.config.timeouts)
    }

    /// Policy with a shorter per-candidate wait, for controls that may
    /// legitimately be absent
    pub fn short_policy(&self, per_attempt_ms: u64) -> RetryPolicy {
        self.policy()
            .with_attempt_timeout(Duration::from_millis(per_attempt_ms))
    }

    /// Short per-candidate wait with room for every spec of `chain`
    pub fn bounded_policy(&self, per_attempt_ms: u64, chain: &LocatorChain) -> RetryPolicy {
        self.short_policy(per_attempt_ms).spread_over(chain.len())
    }

    pub async fn settle(&self) -> Settled {
        WaitCoordinator::new(self.driver)
            .settle(Duration::from_millis(self.config.timeouts.settle_ms))
            .await
    }

    pub async fn resolve(&self, chain: &LocatorChain, policy: &RetryPolicy) -> Resolution {
        self.resolver().resolve(chain, policy).await
    }

    pub async fn resolve_in(
        &self,
        scope: Option<&ResolvedTarget>,
        chain: &LocatorChain,
        policy: &RetryPolicy,
    ) -> Resolution {
        match scope {
            Some(scope) => self.resolver().resolve_within(scope, chain, policy).await,
            None => self.resolver().resolve(chain, policy).await,
        }
    }

    /// Resolve a chain and run an action on the match
    pub async fn act(
        &self,
        scope: Option<&ResolvedTarget>,
        chain: &LocatorChain,
        action: Action,
        policy: &RetryPolicy,
    ) -> EngineResult<Strategy> {
        let target = self.resolve_in(scope, chain, policy).await.into_result()?;
        self.executor()
            .invoke(&target, &action, policy)
            .await
            .into_result(chain.name())
    }

    pub async fn pause(&self, duration: Duration) {
        self.clock.sleep(duration).await;
    }

    /// Path inside the output directory
    pub fn output_path(&self, filename: &str) -> PathBuf {
        if let Err(e) = std::fs::create_dir_all(&self.config.output_dir) {
            log::warn!(
                "could not create output directory {}: {}",
                self.config.output_dir.display(),
                e
            );
        }
        self.config.output_dir.join(filename)
    }
}
