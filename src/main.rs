use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use jobpilot::driver::PlaywrightDriver;
use jobpilot::engine::TokioClock;
use jobpilot::flow::{self, ConsoleEventListener, EventEmitter, FlowContext, RunEnd};
use jobpilot::site;
use jobpilot::utils::config::{ask_terminal, Config};

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(version = "0.1.0")]
#[command(about = "Job board automation: search, filter and Easy Apply", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, search, filter and apply to one job
    Run(RunArgs),

    /// Print the locator chains of a site profile and their selectors
    Locators {
        /// Site profile YAML (defaults to the embedded LinkedIn profile)
        #[arg(short, long)]
        locators: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Config file (defaults to ~/.config/jobpilot/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Config file (defaults to ~/.config/jobpilot/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Site profile YAML overriding the embedded one
    #[arg(short, long)]
    locators: Option<PathBuf>,

    /// Login email (prefer JOBPILOT_EMAIL)
    #[arg(long)]
    email: Option<String>,

    /// Show the browser window
    #[arg(long, default_value = "false")]
    headful: bool,

    /// Attach to a running browser over CDP (e.g. http://localhost:9222)
    #[arg(long)]
    cdp_endpoint: Option<String>,

    /// Search keywords
    #[arg(short, long)]
    keywords: Option<String>,

    /// Search location
    #[arg(long)]
    location: Option<String>,

    /// Output directory for reports and screenshots
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Job cards to inspect before giving up
    #[arg(long)]
    max_candidates: Option<usize>,

    /// Seconds to pause on each application form for manual input
    #[arg(long)]
    human_pause: Option<u64>,

    /// Action timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Download the Playwright browsers before launching
    #[arg(long, default_value = "false")]
    install_browsers: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref locators) = self.locators {
            config.locators = Some(locators.clone());
        }
        if let Some(ref email) = self.email {
            config.email = email.clone();
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(ref endpoint) = self.cdp_endpoint {
            config.browser.cdp_endpoint = Some(endpoint.clone());
        }
        if let Some(ref keywords) = self.keywords {
            config.search.keywords = keywords.clone();
        }
        if let Some(ref location) = self.location {
            config.search.location = location.clone();
        }
        if let Some(ref output) = self.output {
            config.output_dir = output.clone();
        }
        if let Some(max) = self.max_candidates {
            config.limits.max_candidates = max;
        }
        if let Some(secs) = self.human_pause {
            config.timeouts.human_pause_secs = secs;
        }
        if let Some(ms) = self.timeout {
            config.timeouts.action_ms = ms;
        }
        if self.install_browsers {
            config.browser.install_browsers = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await?,

        Commands::Locators { locators } => print_locators(locators.as_deref())?,

        Commands::Config { config } => {
            let config = Config::load(config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    if std::io::stdin().is_terminal() {
        config.prompt_credentials(ask_terminal)?;
    }
    config.validate()?;

    let profile = site::load_profile(config.locators.as_deref())?;
    profile.validate()?;

    println!(
        "{} Searching {} for: {}",
        "▶".green().bold(),
        profile.name.white().bold(),
        config.search.keywords.cyan()
    );
    println!("  Location: {}", config.search.location.cyan());
    println!(
        "  Browser: {}",
        match config.browser.cdp_endpoint {
            Some(ref endpoint) => format!("attached at {}", endpoint),
            None if config.browser.headless => "headless".to_string(),
            None => "headed".to_string(),
        }
        .cyan()
    );
    println!("  Output: {}", config.output_dir.display().to_string().cyan());

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        println!("\n{} Stopping...", "⏹️ ".yellow());
        let _ = stop_tx.send(true);
    })?;

    let driver = PlaywrightDriver::launch(&config.browser).await?;
    let clock = TokioClock::new();

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let end = {
        let ctx = FlowContext::new(&driver, &clock, &profile, &config, &emitter);
        flow::run_until_stopped(&ctx, stop_rx).await
    };

    drop(emitter);
    let _ = listener.await;

    match end {
        RunEnd::Failed(e) => Err(anyhow::Error::new(e).context("Run failed")),
        RunEnd::Finished(_) | RunEnd::Interrupted => Ok(()),
    }
}

fn print_locators(path: Option<&Path>) -> anyhow::Result<()> {
    let profile = site::load_profile(path)?;
    profile.validate()?;

    println!(
        "{} Locators for {}",
        "🔍".to_string().blue(),
        profile.name.white().bold()
    );
    for chain in profile.chains() {
        println!("\n  {}", chain.name().cyan());
        for (i, spec) in chain.specs().iter().enumerate() {
            println!("    {}. {}", i + 1, spec.to_selector());
        }
    }
    Ok(())
}
