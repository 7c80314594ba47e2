use std::time::Duration;

use crate::engine::{Action, EngineError, EngineResult, LocatorChain};

use super::captcha::CaptchaGuard;
use super::context::FlowContext;
use super::events::RunEvent;
use super::state::CaptchaOutcome;

/// Signs in with the configured credentials and clears a CAPTCHA, if any
pub struct LoginFlow<'c, 'a> {
    ctx: &'c FlowContext<'a>,
}

impl<'c, 'a> LoginFlow<'c, 'a> {
    pub fn new(ctx: &'c FlowContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> EngineResult<CaptchaOutcome> {
        let ctx = self.ctx;
        let config = ctx.config;
        let login = &ctx.profile.login;

        if config.email.is_empty() || config.password.is_empty() {
            return Err(EngineError::SessionFailure(
                "email and password are required".to_string(),
            ));
        }

        ctx.emitter
            .info(format!("Opening {}", ctx.profile.urls.home));
        ctx.driver
            .navigate(&ctx.profile.urls.home, config.timeouts.navigation_ms)
            .await
            .map_err(|e| EngineError::SessionFailure(format!("{:#}", e)))?;
        ctx.settle().await;

        if let Some(ref sign_in) = login.sign_in {
            if !ctx.resolver().is_present(None, &login.email).await {
                let short = ctx.short_policy(config.timeouts.control_ms);
                match ctx.act(None, sign_in, Action::Click, &short).await {
                    Ok(_) => {
                        ctx.settle().await;
                    }
                    Err(e) => log::debug!("no sign-in control: {}", e),
                }
            }
        }

        self.required(&login.email, Action::Fill(config.email.clone()))
            .await?;
        self.required(&login.password, Action::Fill(config.password.clone()))
            .await?;
        self.required(&login.submit, Action::Click).await?;

        ctx.pause(Duration::from_millis(config.timeouts.post_login_ms))
            .await;
        ctx.settle().await;

        let guard = CaptchaGuard::new(ctx);
        let captcha = guard.guard().await;
        ctx.emitter.emit(RunEvent::CaptchaFinished { outcome: captcha });

        if guard.logged_in().await {
            ctx.emitter.success("Logged in");
        } else {
            ctx.emitter
                .warn("Could not confirm login, continuing anyway");
        }

        Ok(captcha)
    }

    /// Any failure on a credential input ends the session
    async fn required(&self, chain: &LocatorChain, action: Action) -> EngineResult<()> {
        let policy = self.ctx.policy();
        match self.ctx.act(None, chain, action, &policy).await {
            Ok(_) => Ok(()),
            Err(EngineError::NotFound { tried, .. }) => Err(EngineError::SessionFailure(format!(
                "login control '{}' not found ({} locator(s) tried)",
                chain.name(),
                tried
            ))),
            Err(e) => Err(EngineError::SessionFailure(format!(
                "{}: {}",
                chain.name(),
                e
            ))),
        }
    }
}
