//! Job application flows built on the interaction engine
//!
//! `run` drives one session end to end:
//! login -> search -> filters -> discovery -> report.

pub mod autofill;
pub mod captcha;
pub mod context;
pub mod discovery;
pub mod events;
pub mod filters;
pub mod login;
pub mod modal;
pub mod search;
pub mod state;

#[cfg(test)]
pub mod testkit;

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::watch;

use crate::engine::{EngineError, EngineResult};
use crate::report;
use crate::report::types::ApplicationRecord;

pub use context::FlowContext;
pub use events::{ConsoleEventListener, EventEmitter, RunEvent, Stage};
pub use state::{DiscoveryOutcome, RunSummary};

use discovery::DiscoveryLoop;
use filters::FilterSequencer;
use login::LoginFlow;

/// Run every stage once over the session in `ctx`
pub async fn run(ctx: &FlowContext<'_>) -> EngineResult<RunSummary> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let started = ctx.clock.now();

    ctx.emitter.emit(RunEvent::RunStarted {
        run_id: run_id.clone(),
        site: ctx.profile.name.clone(),
    });

    let captcha = stage(ctx, Stage::Login, LoginFlow::new(ctx).run()).await?;
    stage(ctx, Stage::Search, search::open_search(ctx)).await?;
    let filters = stage(ctx, Stage::Filters, async {
        Ok(FilterSequencer::new(ctx).run(&ctx.profile.filters).await)
    })
    .await?;
    if filters.failed_count() > 0 {
        ctx.emitter.warn(format!(
            "{} filter(s) could not be applied, results may be broader",
            filters.failed_count()
        ));
    }
    let outcome = stage(ctx, Stage::Discovery, DiscoveryLoop::new(ctx).run()).await?;

    let applied = outcome.record().cloned();
    let summary = RunSummary {
        run_id,
        captcha,
        filters,
        candidates: outcome.visited().to_vec(),
        applied,
        duration_ms: ctx.clock.since(started).as_millis() as u64,
    };

    stage(ctx, Stage::Report, async {
        match report::write_reports(&summary, &ctx.profile.name, &ctx.config.output_dir) {
            Ok(paths) => {
                ctx.emitter
                    .info(format!("Run report: {}", paths.json.display()));
                if let (Some(csv), Some(record)) = (paths.csv, summary.applied.clone()) {
                    ctx.emitter
                        .success(format!("Application record: {}", csv.display()));
                    if ctx.config.smtp.is_configured() {
                        mail_report(ctx, record, csv).await;
                    }
                }
            }
            Err(e) => ctx.emitter.error(format!("Failed to write reports: {:#}", e)),
        }
        Ok(())
    })
    .await?;

    ctx.emitter.emit(RunEvent::RunFinished {
        summary: summary.clone(),
    });
    Ok(summary)
}

/// How a supervised run ended
#[derive(Debug)]
pub enum RunEnd {
    Finished(RunSummary),
    Failed(EngineError),
    /// The stop signal fired before the run finished
    Interrupted,
}

/// Run until done or until `stop` flips, then close the browser.
///
/// A failed headed run keeps the browser open for inspection until the
/// stop signal fires, when `hold_on_failure` is set.
pub async fn run_until_stopped(ctx: &FlowContext<'_>, mut stop: watch::Receiver<bool>) -> RunEnd {
    let end = tokio::select! {
        biased;
        _ = stop.changed() => RunEnd::Interrupted,
        result = run(ctx) => match result {
            Ok(summary) => RunEnd::Finished(summary),
            Err(e) => RunEnd::Failed(e),
        },
    };

    let browser = &ctx.config.browser;
    match end {
        RunEnd::Interrupted => ctx.emitter.warn("Run interrupted"),
        RunEnd::Failed(_) if browser.hold_on_failure && !browser.headless => {
            ctx.emitter
                .warn("Browser left open for inspection, press Ctrl+C to close it");
            let _ = stop.changed().await;
        }
        _ => {}
    }

    if let Err(e) = ctx.driver.close().await {
        log::warn!("failed to close browser: {:#}", e);
    }
    end
}

/// Mail the record; a mail failure never fails the run
async fn mail_report(ctx: &FlowContext<'_>, record: ApplicationRecord, csv: PathBuf) {
    let smtp = ctx.config.smtp.clone();
    let to = smtp.to.clone().unwrap_or_default();
    let sent =
        tokio::task::spawn_blocking(move || report::mailer::send(&smtp, &record, &csv)).await;

    match sent {
        Ok(Ok(())) => ctx.emitter.success(format!("Report mailed to {}", to)),
        Ok(Err(e)) => ctx.emitter.error(format!("Failed to mail report: {:#}", e)),
        Err(e) => ctx.emitter.error(format!("Mail task failed: {}", e)),
    }
}

/// Wrap a stage in start/finish events; errors leave a screenshot behind
async fn stage<T, F>(ctx: &FlowContext<'_>, stage: Stage, fut: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    ctx.emitter.emit(RunEvent::StageStarted { stage });
    let started = ctx.clock.now();

    match fut.await {
        Ok(value) => {
            ctx.emitter.emit(RunEvent::StageFinished {
                stage,
                duration_ms: ctx.clock.since(started).as_millis() as u64,
            });
            Ok(value)
        }
        Err(e) => {
            handle_failure(ctx, stage, &e).await;
            Err(e)
        }
    }
}

/// Capture a diagnostic screenshot for a failed stage
async fn handle_failure(ctx: &FlowContext<'_>, stage: Stage, error: &EngineError) {
    ctx.emitter
        .error(format!("{} failed: {}", stage.as_str(), error));

    let filename = format!(
        "fail_{}_{}_{}.png",
        stage.as_str(),
        chrono::Local::now().format("%H%M%S"),
        &uuid::Uuid::new_v4().to_string()[..8]
    );
    let path = ctx.output_path(&filename);
    match ctx.driver.screenshot(&path).await {
        Ok(()) => ctx
            .emitter
            .info(format!("Screenshot saved: {}", path.display())),
        Err(e) => log::warn!("failed to capture screenshot: {:#}", e),
    }
}
