//! Filter sequencer
//!
//! Runs each search filter as open → select → confirm → verify, with one
//! confirm retry. A failed step is reported and the next step still runs.

use std::time::Duration;

use crate::engine::{
    Action, EngineError, EngineResult, ResolvedTarget, RetryPolicy, Strategy,
};
use crate::site::{FilterStep, Selection, Verification};

use super::context::FlowContext;
use super::events::RunEvent;
use super::state::{FilterReport, StepReport, StepStatus};

pub struct FilterSequencer<'c, 'a> {
    ctx: &'c FlowContext<'a>,
}

/// The control whose click commits a filter, kept for the retry
struct Commit {
    target: ResolvedTarget,
    scope: Option<ResolvedTarget>,
}

impl<'c, 'a> FilterSequencer<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run every step in declared order
    pub async fn run(&self, steps: &[FilterStep]) -> FilterReport {
        let mut report = FilterReport::default();

        for step in steps {
            let status = self.run_step(step).await;
            if let StepStatus::Failed { ref reason } = status {
                log::warn!("filter '{}' failed: {}", step.name, reason);
            }
            self.ctx.emitter.emit(RunEvent::FilterStepFinished {
                name: step.name.clone(),
                status: status.clone(),
            });
            report.steps.push(StepReport {
                name: step.name.clone(),
                status,
            });
        }

        report
    }

    pub async fn run_step(&self, step: &FilterStep) -> StepStatus {
        if self.verified(&step.verify).await {
            return StepStatus::AlreadySatisfied;
        }

        match self.apply(step).await {
            Ok(()) => StepStatus::Applied,
            Err(e) => StepStatus::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn apply(&self, step: &FilterStep) -> EngineResult<()> {
        let policy = self.ctx.policy();
        let timeouts = &self.ctx.config.timeouts;

        let open = self.click(None, step, &policy, true).await?;
        self.ctx
            .pause(Duration::from_millis(timeouts.step_delay_ms))
            .await;

        self.select(&step.selection, &policy).await?;

        let commit = match step.confirm {
            Some(_) => {
                let scope = match step.dialog_scope {
                    Some(ref chain) => {
                        let short = self.ctx.bounded_policy(timeouts.control_ms, chain);
                        self.ctx.resolve(chain, &short).await.found()
                    }
                    None => None,
                };
                let target = self.click(scope.as_ref(), step, &policy, false).await?;
                Commit { target, scope }
            }
            None => Commit {
                target: open,
                scope: None,
            },
        };

        self.ctx.settle().await;
        if self.poll_verification(&step.verify).await {
            return Ok(());
        }

        log::info!("'{}' not verified, retrying commit", step.name);
        self.retry_commit(step, &commit, &policy).await?;

        self.ctx.settle().await;
        if self.poll_verification(&step.verify).await {
            return Ok(());
        }

        Err(EngineError::VerificationFailed {
            what: format!(
                "'{}' not in effect after {}ms",
                step.name, timeouts.verify_ms
            ),
        })
    }

    /// Resolve and click the open (or confirm) control
    async fn click(
        &self,
        scope: Option<&ResolvedTarget>,
        step: &FilterStep,
        policy: &RetryPolicy,
        open: bool,
    ) -> EngineResult<ResolvedTarget> {
        let chain = match (open, &step.confirm) {
            (false, Some(confirm)) => confirm,
            _ => &step.open,
        };
        let target = self
            .ctx
            .resolve_in(scope, chain, policy)
            .await
            .into_result()?;
        self.ctx
            .executor()
            .invoke(&target, &Action::Click, policy)
            .await
            .into_result(chain.name())?;
        Ok(target)
    }

    async fn select(&self, selection: &Selection, policy: &RetryPolicy) -> EngineResult<()> {
        match selection {
            Selection::None => Ok(()),
            Selection::Toggle { option } => {
                self.ctx.act(None, option, Action::Click, policy).await?;
                Ok(())
            }
            Selection::Search { input, query, pick } => {
                self.ctx
                    .act(None, input, Action::Fill(query.clone()), policy)
                    .await?;
                self.ctx
                    .pause(Duration::from_millis(self.ctx.config.timeouts.step_delay_ms))
                    .await;
                self.ctx.act(None, pick, Action::Click, policy).await?;
                Ok(())
            }
        }
    }

    /// Alternate specs after the one that matched, else a stronger click
    async fn retry_commit(
        &self,
        step: &FilterStep,
        commit: &Commit,
        policy: &RetryPolicy,
    ) -> EngineResult<()> {
        let chain = step.confirm.as_ref().unwrap_or(&step.open);
        let executor = self.ctx.executor();

        let alternate = self
            .ctx
            .resolver()
            .resolve_from(
                commit.scope.as_ref(),
                chain,
                policy,
                commit.target.spec_index() + 1,
            )
            .await
            .found();

        let outcome = match alternate {
            Some(alt) => {
                log::debug!("retrying '{}' with locator #{}", chain.name(), alt.spec_index());
                executor.invoke(&alt, &Action::Click, policy).await
            }
            None => {
                executor
                    .invoke_from(&commit.target, &Action::Click, policy, Strategy::Forced)
                    .await
            }
        };
        outcome.into_result(chain.name())?;
        Ok(())
    }

    async fn verified(&self, verify: &Verification) -> bool {
        match verify {
            Verification::Indicator(chain) => self.ctx.resolver().is_present(None, chain).await,
            Verification::UrlContains(fragment) => match self.ctx.driver.current_url().await {
                Ok(url) => url.contains(fragment.as_str()),
                Err(e) => {
                    log::debug!("could not read url: {:#}", e);
                    false
                }
            },
        }
    }

    async fn poll_verification(&self, verify: &Verification) -> bool {
        let timeouts = &self.ctx.config.timeouts;
        let budget = Duration::from_millis(timeouts.verify_ms);
        let interval = Duration::from_millis(timeouts.poll_ms.max(1));
        let started = self.ctx.clock.now();

        loop {
            if self.verified(verify).await {
                return true;
            }
            if self.ctx.clock.since(started) >= budget {
                return false;
            }
            self.ctx.pause(interval).await;
        }
    }
}
