//! Application modal state machine
//!
//! ```text
//! Opened -> AwaitingHuman -> Stepping -> Reviewing -> Stepping
//!                                     -> Submitting -> Closed
//!                                     -> Closed
//! Opened -> Closed (no modal: instant application)
//! any non-terminal state -> Failed
//! ```

use std::time::Duration;

use crate::engine::{Action, EngineError, EngineResult, LocatorChain, ResolvedTarget};

use super::autofill::Autofill;
use super::context::FlowContext;
use super::events::RunEvent;
use super::state::{Completion, ModalState};

/// Position of one modal run in the state machine
#[derive(Debug, Clone)]
pub struct ModalSession {
    state: ModalState,
    step_count: u32,
    max_steps: u32,
    history: Vec<ModalState>,
}

impl ModalSession {
    pub fn new(max_steps: u32) -> Self {
        Self {
            state: ModalState::Opened,
            step_count: 0,
            max_steps,
            history: vec![ModalState::Opened],
        }
    }

    pub fn state(&self) -> ModalState {
        self.state
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    /// Every state entered, in order
    pub fn history(&self) -> &[ModalState] {
        &self.history
    }

    pub fn can_step(&self) -> bool {
        self.step_count < self.max_steps
    }

    pub fn transition(&mut self, to: ModalState) -> EngineResult<()> {
        if !self.state.can_transition(to) {
            return Err(EngineError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", to),
            });
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Review,
    Submit,
    Next,
}

pub struct ModalMachine<'c, 'a> {
    ctx: &'c FlowContext<'a>,
}

impl<'c, 'a> ModalMachine<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> EngineResult<Completion> {
        let mut session = ModalSession::new(self.ctx.config.limits.max_steps);
        self.run_session(&mut session).await
    }

    /// Drive one session to `Closed` or `Failed`
    pub async fn run_session(&self, session: &mut ModalSession) -> EngineResult<Completion> {
        let chain = &self.ctx.profile.modal.container;
        let policy = self
            .ctx
            .bounded_policy(self.ctx.config.timeouts.modal_open_ms, chain);

        let container = match self.ctx.resolve(chain, &policy).await.found() {
            Some(container) => container,
            None => {
                log::debug!("no application modal, treating as instant apply");
                self.enter(session, ModalState::Closed)?;
                return Ok(Completion::Instant);
            }
        };

        match self.drive(session, &container).await {
            Ok(completion) => Ok(completion),
            Err(e) => {
                log::warn!("application modal failed: {}", e);
                if !session.state().is_terminal() {
                    self.enter(session, ModalState::Failed)?;
                }
                self.close_overlay().await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut ModalSession,
        container: &ResolvedTarget,
    ) -> EngineResult<Completion> {
        let ctx = self.ctx;
        let autofill = Autofill::new(ctx, Some(container.clone()));

        self.enter(session, ModalState::AwaitingHuman)?;
        self.await_human(&autofill).await;
        self.enter(session, ModalState::Stepping)?;

        let mut submitted = false;
        while session.can_step() {
            autofill.fill_required().await;

            let Some((control, target)) = self.next_control(container).await else {
                log::debug!("no modal control at step {}", session.step_count());
                break;
            };

            self.click(&target, control).await?;
            match control {
                Control::Review => {
                    self.enter(session, ModalState::Reviewing)?;
                    session.step_count += 1;
                    self.enter(session, ModalState::Stepping)?;
                }
                Control::Next => {
                    session.step_count += 1;
                }
                Control::Submit => {
                    self.enter(session, ModalState::Submitting)?;
                    submitted = true;
                    break;
                }
            }
            ctx.pause(Duration::from_millis(ctx.config.timeouts.step_delay_ms))
                .await;
        }

        if submitted {
            ctx.settle().await;
        }

        let verified = ctx
            .resolver()
            .is_present(None, &ctx.profile.modal.success)
            .await;
        self.close_overlay().await;
        self.enter(session, ModalState::Closed)?;

        Ok(if submitted {
            Completion::Submitted { verified }
        } else {
            Completion::Unconfirmed { verified }
        })
    }

    /// Fixed pause for the human, filling required fields at each slice
    async fn await_human(&self, autofill: &Autofill<'_, '_>) {
        let timeouts = &self.ctx.config.timeouts;
        let total = timeouts.human_pause_secs;
        let slice = timeouts.human_pause_slice_secs.max(1);

        autofill.fill_required().await;
        if total == 0 {
            return;
        }

        self.ctx.emitter.emit(RunEvent::WaitStarted {
            label: "Review the application".to_string(),
            total_secs: total,
        });
        let mut elapsed = 0;
        while elapsed < total {
            let step = slice.min(total - elapsed);
            self.ctx.pause(Duration::from_secs(step)).await;
            elapsed += step;
            self.ctx.emitter.emit(RunEvent::WaitProgress {
                elapsed_secs: elapsed,
            });
            autofill.fill_required().await;
        }
        self.ctx.emitter.emit(RunEvent::WaitFinished);
    }

    /// First visible and enabled control, Review before Submit before Next
    async fn next_control(&self, container: &ResolvedTarget) -> Option<(Control, ResolvedTarget)> {
        let modal = &self.ctx.profile.modal;
        let control_ms = self.ctx.config.timeouts.control_ms;

        let controls: [(Control, &LocatorChain); 3] = [
            (Control::Review, &modal.review),
            (Control::Submit, &modal.submit),
            (Control::Next, &modal.next),
        ];
        for (control, chain) in controls {
            let policy = self.ctx.bounded_policy(control_ms, chain);
            let Some(target) = self
                .ctx
                .resolve_in(Some(container), chain, &policy)
                .await
                .found()
            else {
                continue;
            };
            match self.ctx.driver.is_enabled(&target.handle()).await {
                Ok(true) => return Some((control, target)),
                Ok(false) => log::debug!("'{}' is disabled", chain.name()),
                Err(e) => log::debug!("'{}' enablement check failed: {:#}", chain.name(), e),
            }
        }
        None
    }

    async fn click(&self, target: &ResolvedTarget, control: Control) -> EngineResult<()> {
        let name = match control {
            Control::Review => self.ctx.profile.modal.review.name(),
            Control::Submit => self.ctx.profile.modal.submit.name(),
            Control::Next => self.ctx.profile.modal.next.name(),
        };
        self.ctx
            .executor()
            .invoke(target, &Action::Click, &self.ctx.policy())
            .await
            .into_result(name)?;
        Ok(())
    }

    /// Best-effort: close control, then the discard confirmation if any
    async fn close_overlay(&self) {
        let modal = &self.ctx.profile.modal;
        let policy = self.ctx.short_policy(self.ctx.config.timeouts.control_ms);

        if let Err(e) = self.ctx.act(None, &modal.close, Action::Click, &policy).await {
            log::debug!("no overlay to close: {}", e);
            return;
        }
        if let Some(ref discard) = modal.discard {
            self.ctx
                .pause(Duration::from_millis(self.ctx.config.timeouts.step_delay_ms))
                .await;
            if let Err(e) = self.ctx.act(None, discard, Action::Click, &policy).await {
                log::debug!("no discard confirmation: {}", e);
            }
        }
    }

    fn enter(&self, session: &mut ModalSession, state: ModalState) -> EngineResult<()> {
        session.transition(state)?;
        self.ctx.emitter.emit(RunEvent::ModalTransition {
            state,
            step: session.step_count(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeEffect, FakeElement};
    use crate::engine::LocatorSpec;
    use crate::flow::testkit::Harness;

    const REVIEW: &str = "css=.modal >> nth=0 >> css=.review";
    const SUBMIT: &str = "css=.modal >> nth=0 >> css=.submit";
    const NEXT: &str = "css=.modal >> nth=0 >> css=.next";

    fn open_modal(h: &Harness) {
        h.driver.add("css=.modal", FakeElement::visible());
        h.driver.add("css=.close", FakeElement::visible());
    }

    #[test]
    fn test_session_rejects_invalid_transition() {
        let mut session = ModalSession::new(10);
        assert!(matches!(
            session.transition(ModalState::Submitting),
            Err(EngineError::InvalidTransition { ref to, .. }) if to == "Submitting"
        ));
        assert_eq!(session.state(), ModalState::Opened);

        session.transition(ModalState::AwaitingHuman).unwrap();
        session.transition(ModalState::Failed).unwrap();
        assert!(session.transition(ModalState::Closed).is_err());
    }

    #[tokio::test]
    async fn test_no_modal_is_instant_apply() {
        let h = Harness::new();
        let ctx = h.ctx();

        let mut session = ModalSession::new(10);
        let completion = ModalMachine::new(&ctx)
            .run_session(&mut session)
            .await
            .unwrap();

        assert_eq!(completion, Completion::Instant);
        assert_eq!(session.history(), &[ModalState::Opened, ModalState::Closed]);
    }

    #[tokio::test]
    async fn test_no_controls_ends_unconfirmed() {
        let h = Harness::new();
        open_modal(&h);

        let ctx = h.ctx();
        let mut session = ModalSession::new(10);
        let completion = ModalMachine::new(&ctx)
            .run_session(&mut session)
            .await
            .unwrap();

        assert_eq!(completion, Completion::Unconfirmed { verified: false });
        assert_eq!(session.step_count(), 0);
        assert_eq!(session.state(), ModalState::Closed);
        assert_eq!(h.driver.click_count("css=.close >> nth=0"), 1);
    }

    #[tokio::test]
    async fn test_stepping_bounded_by_max_steps() {
        let mut h = Harness::new();
        h.config.limits.max_steps = 4;
        open_modal(&h);
        h.driver.add(NEXT, FakeElement::visible());

        let ctx = h.ctx();
        let mut session = ModalSession::new(ctx.config.limits.max_steps);
        let completion = ModalMachine::new(&ctx)
            .run_session(&mut session)
            .await
            .unwrap();

        assert_eq!(session.step_count(), 4);
        assert_eq!(h.driver.click_count(&format!("{} >> nth=0", NEXT)), 4);
        assert_eq!(completion, Completion::Unconfirmed { verified: false });
    }

    #[tokio::test]
    async fn test_review_then_submit() {
        let h = Harness::new();
        open_modal(&h);
        h.driver.add(
            REVIEW,
            FakeElement::visible().on_click(FakeEffect::Remove(REVIEW.into())),
        );
        h.driver.add(
            SUBMIT,
            FakeElement::visible()
                .on_click(FakeEffect::Add("css=.sent".into(), FakeElement::visible())),
        );

        let ctx = h.ctx();
        let mut session = ModalSession::new(10);
        let completion = ModalMachine::new(&ctx)
            .run_session(&mut session)
            .await
            .unwrap();

        assert_eq!(completion, Completion::Submitted { verified: true });
        assert_eq!(session.step_count(), 1);
        assert_eq!(
            session.history(),
            &[
                ModalState::Opened,
                ModalState::AwaitingHuman,
                ModalState::Stepping,
                ModalState::Reviewing,
                ModalState::Stepping,
                ModalState::Submitting,
                ModalState::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_review_falls_through_to_submit() {
        let h = Harness::new();
        open_modal(&h);
        h.driver.add(REVIEW, FakeElement::visible().disabled());
        h.driver.add(SUBMIT, FakeElement::visible());

        let ctx = h.ctx();
        let completion = ModalMachine::new(&ctx).run().await.unwrap();

        assert_eq!(completion, Completion::Submitted { verified: false });
        assert_eq!(h.driver.click_count(&format!("{} >> nth=0", REVIEW)), 0);
    }

    #[tokio::test]
    async fn test_failed_submit_still_closes_overlay() {
        let h = Harness::new();
        open_modal(&h);
        h.driver.add(SUBMIT, FakeElement::visible().fail_all_clicks());

        let ctx = h.ctx();
        let mut session = ModalSession::new(10);
        let result = ModalMachine::new(&ctx).run_session(&mut session).await;

        assert!(result.is_err());
        assert_eq!(session.state(), ModalState::Failed);
        assert_eq!(h.driver.click_count("css=.close >> nth=0"), 1);
    }

    #[tokio::test]
    async fn test_required_fields_filled_inside_modal() {
        let h = Harness::new();
        open_modal(&h);
        h.driver.add(
            "css=.modal >> nth=0 >> css=input[required]",
            FakeElement::visible().attr("name", "phoneNumber"),
        );

        let ctx = h.ctx();
        ModalMachine::new(&ctx).run().await.unwrap();

        assert_eq!(
            h.driver.fills(),
            vec![(
                "css=.modal >> nth=0 >> css=input[required] >> nth=0".to_string(),
                "+1234567890".to_string()
            )]
        );
    }

    fn chain(name: &str, css: &[&str]) -> LocatorChain {
        LocatorChain::new(name, css.iter().map(|c| LocatorSpec::css(c)).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_next_found_through_later_locator() {
        let mut h = Harness::new();
        h.config.limits.max_steps = 3;
        h.profile.modal.next = chain("next", &[".next-v1", ".next-v2"]);
        open_modal(&h);
        h.driver
            .add("css=.modal >> nth=0 >> css=.next-v2", FakeElement::visible());

        let ctx = h.ctx();
        let mut session = ModalSession::new(ctx.config.limits.max_steps);
        ModalMachine::new(&ctx)
            .run_session(&mut session)
            .await
            .unwrap();

        assert_eq!(session.step_count(), 3);
        assert_eq!(
            h.driver
                .click_count("css=.modal >> nth=0 >> css=.next-v2 >> nth=0"),
            3
        );
    }

    #[tokio::test]
    async fn test_container_found_through_later_locator() {
        let mut h = Harness::new();
        h.profile.modal.container = chain("modal", &[".dialog-v1", ".modal"]);
        open_modal(&h);
        h.driver.add(SUBMIT, FakeElement::visible());

        let ctx = h.ctx();
        let completion = ModalMachine::new(&ctx).run().await.unwrap();

        assert_eq!(completion, Completion::Submitted { verified: false });
        assert_eq!(h.driver.click_count(&format!("{} >> nth=0", SUBMIT)), 1);
    }
}
