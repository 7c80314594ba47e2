use super::state::{CandidateStatus, CaptchaOutcome, ModalState, RunSummary, StepStatus};
use tokio::sync::broadcast;

/// Run stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Login,
    Search,
    Filters,
    Discovery,
    Report,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Login => "login",
            Stage::Search => "search",
            Stage::Filters => "filters",
            Stage::Discovery => "discovery",
            Stage::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// Run events for real-time status output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        site: String,
    },
    RunFinished {
        summary: RunSummary,
    },

    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        duration_ms: u64,
    },

    FilterStepFinished {
        name: String,
        status: StepStatus,
    },

    CandidateStarted {
        index: usize,
        label: String,
    },
    CandidateFinished {
        index: usize,
        status: CandidateStatus,
    },

    ModalTransition {
        state: ModalState,
        step: u32,
    },

    /// A timed wait shown as a progress bar
    WaitStarted {
        label: String,
        total_secs: u64,
    },
    WaitProgress {
        elapsed_secs: u64,
    },
    WaitFinished,

    CaptchaFinished {
        outcome: CaptchaOutcome,
    },

    Log {
        level: LogLevel,
        message: String,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(RunEvent::Log {
            level,
            message: message.into(),
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

/// Print above the wait bar while one is drawn, plainly otherwise
fn print_line(multi: &MultiProgress, bar: &Option<ProgressBar>, line: String) {
    if bar.is_some() && !multi.is_hidden() && multi.println(&line).is_ok() {
        return;
    }
    println!("{}", line);
}

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when piped, to avoid terminal escape codes
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut wait_bar: Option<ProgressBar> = None;

        macro_rules! out {
            ($($arg:tt)*) => {
                print_line(&multi, &wait_bar, format!($($arg)*))
            };
        }

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("console listener dropped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted { run_id, site } => {
                    out!(
                        "\n{} Run started on {}: {}",
                        "▶".green().bold(),
                        site.white().bold(),
                        run_id.cyan()
                    );
                }

                RunEvent::RunFinished { summary } => {
                    if let Some(pb) = wait_bar.take() {
                        pb.finish_and_clear();
                    }

                    out!("\n{} Run finished", "■".blue().bold());
                    out!(
                        "  Filters in effect: {}",
                        if summary.filters.in_effect().is_empty() {
                            "none".dimmed().to_string()
                        } else {
                            summary.filters.in_effect().join(", ")
                        }
                    );
                    out!("  Candidates inspected: {}", summary.candidates.len());
                    match summary.applied {
                        Some(ref record) => {
                            out!("  {} Applied to:", "✓".green());
                            for (field, value) in record.fields() {
                                out!("    {:<13} {}", field, value);
                            }
                        }
                        None => out!("  {} No job found", "○".yellow()),
                    }
                    out!("  Duration: {}ms", summary.duration_ms);
                }

                RunEvent::StageStarted { stage } => {
                    out!("\n  {} {}", "→".blue(), stage.as_str().white().bold());
                }

                RunEvent::StageFinished { stage, duration_ms } => {
                    out!(
                        "  {} {} ({}ms)",
                        "←".blue(),
                        stage.as_str(),
                        duration_ms
                    );
                }

                RunEvent::FilterStepFinished { name, status } => match status {
                    StepStatus::Applied => {
                        out!("    {} {}", "✓".green(), name);
                    }
                    StepStatus::AlreadySatisfied => {
                        out!("    {} {} {}", "✓".green(), name, "(already applied)".dimmed());
                    }
                    StepStatus::Failed { reason } => {
                        out!("    {} {} {}", "✗".red(), name, reason.dimmed());
                    }
                },

                RunEvent::CandidateStarted { index, label } => {
                    out!("    {} [{}] {}", "•".cyan(), index, label);
                }

                RunEvent::CandidateFinished { index, status } => {
                    let text = match status {
                        CandidateStatus::Applied => "applied".green().bold(),
                        CandidateStatus::AlreadyApplied => "already applied".yellow(),
                        CandidateStatus::NoApplyControl => "no apply control".yellow(),
                        CandidateStatus::Failed { reason } => format!("failed: {}", reason).red(),
                        other => format!("{:?}", other).dimmed(),
                    };
                    out!("      [{}] {}", index, text);
                }

                RunEvent::ModalTransition { state, step } => {
                    log::debug!("modal -> {:?} (step {})", state, step);
                    out!("      {} {:?} {}", "↳".dimmed(), state, format!("step {}", step).dimmed());
                }

                RunEvent::WaitStarted { label, total_secs } => {
                    let pb = multi.add(ProgressBar::new(total_secs));
                    if let Ok(style) = ProgressStyle::default_bar()
                        .template("      {msg} [{bar:30.cyan/blue}] {pos}/{len}s")
                    {
                        pb.set_style(style.progress_chars("=> "));
                    }
                    pb.set_message(label);
                    wait_bar = Some(pb);
                }

                RunEvent::WaitProgress { elapsed_secs } => {
                    if let Some(ref pb) = wait_bar {
                        pb.set_position(elapsed_secs);
                    }
                }

                RunEvent::WaitFinished => {
                    if let Some(pb) = wait_bar.take() {
                        pb.finish_and_clear();
                    }
                }

                RunEvent::CaptchaFinished { outcome } => match outcome {
                    CaptchaOutcome::NotDetected => {}
                    CaptchaOutcome::Solved { waited_secs } => {
                        out!("    {} CAPTCHA solved after {}s", "✓".green(), waited_secs);
                    }
                    CaptchaOutcome::TimedOut { waited_secs } => {
                        out!(
                            "    {} CAPTCHA wait timed out after {}s, continuing anyway",
                            "⚠️".yellow(),
                            waited_secs
                        );
                    }
                },

                RunEvent::Log { level, message } => {
                    let line = match level {
                        LogLevel::Info => format!("    {} {}", "ℹ".blue(), message),
                        LogLevel::Success => format!("    {} {}", "✅".green(), message),
                        LogLevel::Warn => format!("    {} {}", "⚠️".yellow(), message),
                        LogLevel::Error => format!("    {} {}", "❌".red(), message),
                    };
                    print_line(&multi, &wait_bar, line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitter_broadcasts_to_subscribers() {
        let (emitter, mut first) = EventEmitter::new();
        let mut second = emitter.subscribe();

        emitter.warn("slow page");

        for receiver in [&mut first, &mut second] {
            match receiver.recv().await.unwrap() {
                RunEvent::Log { level, message } => {
                    assert_eq!(level, LogLevel::Warn);
                    assert_eq!(message, "slow page");
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let emitter = EventEmitter::default();
        emitter.info("nobody listening");
    }
}
