//! CAPTCHA guard
//!
//! Runs once after the login submit. A detected challenge is left to the
//! human at the keyboard; the guard only polls until the session looks
//! logged in or the ceiling runs out, and never fails the run.

use std::time::Duration;

use crate::engine::EngineError;

use super::context::FlowContext;
use super::events::RunEvent;
use super::state::CaptchaOutcome;

pub struct CaptchaGuard<'c, 'a> {
    ctx: &'c FlowContext<'a>,
}

impl<'c, 'a> CaptchaGuard<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>) -> Self {
        Self { ctx }
    }

    /// Structural markers first, then text signatures in the page HTML
    pub async fn detect(&self) -> bool {
        let captcha = &self.ctx.profile.captcha;

        for marker in &captcha.markers {
            let selector = format!("css={} >> nth=0", marker);
            if self.ctx.driver.is_visible(&selector).await.unwrap_or(false) {
                log::debug!("captcha marker visible: {}", marker);
                return true;
            }
        }

        if captcha.text_signatures.is_empty() {
            return false;
        }
        match self.ctx.driver.page_content().await {
            Ok(html) => {
                let html = html.to_lowercase();
                captcha
                    .text_signatures
                    .iter()
                    .any(|sig| html.contains(&sig.to_lowercase()))
            }
            Err(e) => {
                log::debug!("could not read page content: {:#}", e);
                false
            }
        }
    }

    /// Success URL fragment or a post-login landmark
    pub async fn logged_in(&self) -> bool {
        let login = &self.ctx.profile.login;

        if let Ok(url) = self.ctx.driver.current_url().await {
            if login
                .success_url_fragments
                .iter()
                .any(|fragment| url.contains(fragment.as_str()))
            {
                return true;
            }
        }
        self.ctx.resolver().is_present(None, &login.landmarks).await
    }

    pub async fn guard(&self) -> CaptchaOutcome {
        let timeouts = &self.ctx.config.timeouts;

        if !self.detect().await {
            self.ctx
                .pause(Duration::from_secs(timeouts.captcha_stabilize_secs))
                .await;
            return CaptchaOutcome::NotDetected;
        }

        let ceiling = timeouts.captcha_ceiling_secs;
        let poll = Duration::from_secs(timeouts.captcha_poll_secs.max(1));
        let status_every = timeouts.captcha_status_secs.max(1);

        self.ctx
            .emitter
            .warn("CAPTCHA detected, solve it in the browser window");
        self.ctx.emitter.emit(RunEvent::WaitStarted {
            label: "Waiting for CAPTCHA".to_string(),
            total_secs: ceiling,
        });

        let started = self.ctx.clock.now();
        let mut waited = 0;
        let mut next_status = status_every;

        let outcome = loop {
            if self.logged_in().await {
                break CaptchaOutcome::Solved {
                    waited_secs: waited,
                };
            }
            if waited >= ceiling {
                break CaptchaOutcome::TimedOut {
                    waited_secs: waited,
                };
            }

            self.ctx.pause(poll).await;
            waited = self.ctx.clock.since(started).as_secs();
            self.ctx.emitter.emit(RunEvent::WaitProgress {
                elapsed_secs: waited.min(ceiling),
            });

            if waited >= next_status && waited < ceiling {
                self.ctx.emitter.info(format!(
                    "Still waiting for CAPTCHA ({}s / {}s)",
                    waited, ceiling
                ));
                next_status += status_every;
            }
        };

        self.ctx.emitter.emit(RunEvent::WaitFinished);
        if let CaptchaOutcome::TimedOut { waited_secs } = outcome {
            self.ctx.emitter.warn(format!(
                "{}, continuing",
                EngineError::CaptchaTimeout { waited_secs }
            ));
        }
        outcome
    }
}
