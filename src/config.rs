//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.team-digest.toml` files: general run settings, API endpoints,
//! the environment variables holding credentials, and team definitions.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".team-digest.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// API endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Where credentials are read from.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Teams to gather activity for.
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Window length when no explicit dates are given.
    #[serde(default = "default_days")]
    pub default_days: u32,

    /// Delay between consecutive requests to the same source.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Per-fetch timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Fetch the scopes of one source concurrently.
    #[serde(default)]
    pub concurrent_scopes: bool,

    /// Gather the three sources concurrently.
    #[serde(default)]
    pub concurrent_sources: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_days: default_days(),
            request_delay_ms: default_request_delay_ms(),
            timeout_seconds: default_timeout(),
            concurrent_scopes: false,
            concurrent_sources: false,
        }
    }
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_days() -> u32 {
    7
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    60
}

/// Base URLs of the external systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_jira_base_url")]
    pub jira_base_url: String,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    #[serde(default = "default_slack_api_url")]
    pub slack_api_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            jira_base_url: default_jira_base_url(),
            github_api_url: default_github_api_url(),
            slack_api_url: default_slack_api_url(),
        }
    }
}

fn default_jira_base_url() -> String {
    "https://issues.redhat.com".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_string()
}

/// Names of the environment variables holding each token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_jira_token_env")]
    pub jira_token_env: String,

    #[serde(default = "default_github_token_env")]
    pub github_token_env: String,

    #[serde(default = "default_slack_token_env")]
    pub slack_token_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            jira_token_env: default_jira_token_env(),
            github_token_env: default_github_token_env(),
            slack_token_env: default_slack_token_env(),
        }
    }
}

fn default_jira_token_env() -> String {
    "JIRA_API_TOKEN".to_string()
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_slack_token_env() -> String {
    "SLACK_BOT_TOKEN".to_string()
}

/// One team and everything that is queried on its behalf.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Short identifier, also used as the storage directory name.
    pub id: String,

    /// Name shown in reports.
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub jira: JiraTeamConfig,

    #[serde(default)]
    pub github: GithubTeamConfig,

    #[serde(default)]
    pub slack: SlackTeamConfig,
}

impl TeamConfig {
    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraTeamConfig {
    /// Project keys, queried in this order.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Restrict issues to these assignees/reporters (empty = no filter).
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubTeamConfig {
    /// Usernames whose authored items are searched.
    #[serde(default)]
    pub users: Vec<String>,

    /// Organizations the user searches are limited to.
    #[serde(default)]
    pub orgs: Vec<String>,

    /// `owner/name` repositories monitored regardless of author.
    #[serde(default)]
    pub repos: Vec<String>,

    /// Branches whose commit history is monitored.
    #[serde(default)]
    pub branches: Vec<BranchWatch>,
}

/// A branch whose commits by one author are collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchWatch {
    /// `owner/name` repository.
    pub repo: String,
    pub branch: String,
    /// Commit author name to keep.
    pub author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackTeamConfig {
    /// Channel ids to read.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Display names whose messages are kept (empty = everyone).
    #[serde(default)]
    pub users: Vec<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(delay) = args.request_delay_ms {
            self.general.request_delay_ms = delay;
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }
        if let Some(days) = args.days {
            self.general.default_days = days;
        }

        // Flags only ever switch concurrency on
        if args.concurrent {
            self.general.concurrent_scopes = true;
            self.general.concurrent_sources = true;
        }
    }

    /// Check values that parse but cannot drive a run.
    ///
    /// Called after CLI overrides are merged, so it covers both sources.
    pub fn validate(&self) -> Result<()> {
        if self.general.timeout_seconds == 0 {
            bail!("general.timeout_seconds must be at least 1");
        }
        if self.general.default_days == 0 {
            bail!("general.default_days must be at least 1");
        }
        Ok(())
    }

    /// Look up a team by id.
    pub fn team(&self, id: &str) -> Option<&TeamConfig> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config {
            teams: vec![example_team()],
            ..Config::default()
        };
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn example_team() -> TeamConfig {
    TeamConfig {
        id: "platform".to_string(),
        display_name: "Platform Team".to_string(),
        jira: JiraTeamConfig {
            projects: vec!["PLAT".to_string()],
            members: Vec::new(),
        },
        github: GithubTeamConfig {
            users: vec!["octocat".to_string()],
            orgs: vec!["example-org".to_string()],
            repos: vec!["example-org/platform".to_string()],
            branches: Vec::new(),
        },
        slack: SlackTeamConfig {
            channels: vec!["C0123456789".to_string()],
            users: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_dir, "data");
        assert_eq!(config.general.default_days, 7);
        assert_eq!(config.general.request_delay_ms, 1000);
        assert_eq!(config.credentials.jira_token_env, "JIRA_API_TOKEN");
        assert!(config.teams.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "out"
request_delay_ms = 250

[endpoints]
jira_base_url = "https://jira.example.com"

[[teams]]
id = "infra"
display_name = "Infrastructure"

[teams.jira]
projects = ["OPS", "INFRA"]

[teams.github]
users = ["alice", "bob"]
orgs = ["acme", "acme-labs"]
repos = ["acme/deploy"]

[[teams.github.branches]]
repo = "acme/site"
branch = "release"
author = "Alice Smith"

[teams.slack]
channels = ["C1", "C2"]
users = ["alice"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, "out");
        assert_eq!(config.general.request_delay_ms, 250);
        assert_eq!(config.general.timeout_seconds, 60);
        assert_eq!(config.endpoints.jira_base_url, "https://jira.example.com");
        assert_eq!(config.endpoints.github_api_url, "https://api.github.com");

        let team = config.team("infra").unwrap();
        assert_eq!(team.name(), "Infrastructure");
        assert_eq!(team.jira.projects, vec!["OPS", "INFRA"]);
        assert_eq!(team.github.orgs.len(), 2);
        assert_eq!(team.github.branches[0].author, "Alice Smith");
        assert_eq!(team.slack.channels, vec!["C1", "C2"]);
        assert!(config.team("missing").is_none());
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_days() {
        let config: Config = toml::from_str("[general]\ntimeout_seconds = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));

        let config: Config = toml::from_str("[general]\ndefault_days = 0").unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("default_days"));

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_team_name_falls_back_to_id() {
        let team = TeamConfig {
            id: "ops".to_string(),
            ..TeamConfig::default()
        };
        assert_eq!(team.name(), "ops");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[endpoints]"));
        assert!(toml_str.contains("[[teams]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.teams.len(), 1);
    }
}
