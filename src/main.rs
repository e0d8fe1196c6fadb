//! team-digest - multi-source team activity gatherer
//!
//! A CLI tool that collects a team's issues, pull requests, commits and
//! chat messages from Jira, GitHub and Slack for a date window, merges
//! them per source and saves one unified JSON document per run.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, missing mandatory credentials, persistence, etc.)
//!   2 - Completed, but --strict was set and some source was unavailable or partial

mod aggregate;
mod cli;
mod config;
mod connector;
mod credentials;
mod error;
mod models;
mod report;
mod scope;
mod store;

use aggregate::{Aggregator, AggregatorSettings};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, TeamConfig, DEFAULT_CONFIG_FILE};
use connector::ConnectorSet;
use credentials::Credentials;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use store::DocumentStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("team-digest v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .team-digest.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to declare your teams, projects, repositories and channels.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Gather every requested team. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let range = args
        .date_range(config.general.default_days, Utc::now().date_naive())
        .map_err(anyhow::Error::msg)?;

    let teams = select_teams(&config, &args)?;

    let credentials = Credentials::from_env(&config.credentials);
    debug!("Credentials: {:?}", credentials);
    for kind in credentials.missing() {
        if kind.is_mandatory() {
            warn!("No {} token in ${}", kind.label(), token_env(&config, kind));
        } else {
            warn!(
                "No {} token in ${}; {} data will be skipped",
                kind.label(),
                token_env(&config, kind),
                kind
            );
        }
    }

    let connectors =
        ConnectorSet::from_config(&config).context("Failed to build HTTP client")?;
    let aggregator = Aggregator::new(connectors, AggregatorSettings::from(&config.general));
    let store = DocumentStore::new(&config.general.output_dir);

    println!("📥 Gathering activity for {}", range);
    println!("   Output: {}", store.root().display());
    if config.general.concurrent_sources || config.general.concurrent_scopes {
        println!("   Mode: concurrent");
    }

    let mut aborted = 0;
    let mut impaired = 0;

    for team in teams {
        let spinner = spinner(&args, team);
        let result = aggregator
            .run_and_persist(team, range, &credentials, &store)
            .await;
        spinner.finish_and_clear();

        match result {
            Ok(run) => {
                if !args.quiet {
                    print!("{}", report::generate_run_summary(&run.document, &run.path));
                }
                if !run.document.impaired_sources().is_empty() {
                    impaired += 1;
                }
            }
            Err(e) => {
                // Other teams still run
                error!("{}: {}", team.id, e);
                eprintln!("\n❌ {}: {}", team.name(), e);
                aborted += 1;
            }
        }
    }

    println!(
        "\n✅ Done in {:.1}s",
        start_time.elapsed().as_secs_f64()
    );

    if aborted > 0 {
        bail!("{} team run(s) aborted", aborted);
    }

    if args.strict && impaired > 0 {
        eprintln!(
            "\n⛔ {} team(s) have unavailable or partially failed sources. Failing (exit code 2).",
            impaired
        );
        return Ok(2);
    }

    Ok(0)
}

/// The teams named on the command line, in config declaration order.
fn select_teams<'a>(config: &'a Config, args: &Args) -> Result<Vec<&'a TeamConfig>> {
    if args.all_teams {
        if config.teams.is_empty() {
            bail!("No teams configured; add [[teams]] to {}", DEFAULT_CONFIG_FILE);
        }
        return Ok(config.teams.iter().collect());
    }

    let id = args.team.as_deref().unwrap_or_default();
    match config.team(id) {
        Some(team) => Ok(vec![team]),
        None => {
            let known: Vec<&str> = config.teams.iter().map(|t| t.id.as_str()).collect();
            bail!("Unknown team '{}' (configured: {})", id, known.join(", "))
        }
    }
}

fn token_env(config: &Config, kind: models::SourceKind) -> &str {
    match kind {
        models::SourceKind::IssueTracker => &config.credentials.jira_token_env,
        models::SourceKind::CodeHost => &config.credentials.github_token_env,
        models::SourceKind::Chat => &config.credentials.slack_token_env,
    }
}

fn spinner(args: &Args, team: &TeamConfig) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Gathering {}...", team.name()));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
