//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the date window defaults.

use crate::models::DateRange;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// team-digest - gather a team's weekly activity from Jira, GitHub and Slack
///
/// Collects issues, pull requests, commits and chat messages for a team
/// over a date window and saves them as one JSON document per run.
///
/// Examples:
///   team-digest --team infra
///   team-digest --team infra --days 14
///   team-digest --team infra --start 2026-10-01 --end 2026-10-07
///   team-digest --all-teams --concurrent --strict
///   team-digest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Team id to gather activity for (as declared in the config file)
    #[arg(
        short,
        long,
        value_name = "ID",
        required_unless_present_any = ["all_teams", "init_config"],
        conflicts_with = "all_teams"
    )]
    pub team: Option<String>,

    /// Gather every configured team, in declaration order
    #[arg(long)]
    pub all_teams: bool,

    /// First day of the window (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE", requires = "end", conflicts_with = "days")]
    pub start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE", requires = "start", conflicts_with = "days")]
    pub end: Option<NaiveDate>,

    /// Window length in days, ending today
    ///
    /// Default: from config or 7.
    #[arg(short, long, value_name = "N")]
    pub days: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .team-digest.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "TEAM_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory documents are written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Delay between consecutive requests to one source, in milliseconds
    #[arg(long, value_name = "MS")]
    pub request_delay_ms: Option<u64>,

    /// Per-fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fetch sources and scopes concurrently
    #[arg(long)]
    pub concurrent: bool,

    /// Exit with code 2 when any source is unavailable or partially failed
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .team-digest.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref team) = self.team {
            if team.trim().is_empty() {
                return Err("Team id must not be empty".to_string());
            }
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(format!(
                    "Start date {} is after end date {}",
                    start, end
                ));
            }
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The window to gather: explicit dates, or the last `days` ending `today`.
    pub fn date_range(&self, default_days: u32, today: NaiveDate) -> Result<DateRange, String> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => DateRange::new(start, end).map_err(|e| e.to_string()),
            (None, None) => DateRange::last_days(today, self.days.unwrap_or(default_days))
                .map_err(|e| e.to_string()),
            _ => Err("--start and --end must be given together".to_string()),
        }
    }
}
