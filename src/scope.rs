//! Scope expansion.
//!
//! A scope is one unit of query granularity within a source: a Jira
//! project, a GitHub user searched across the team's organizations, a
//! monitored repository, a monitored branch, or the team's set of Slack
//! channels. [`expand`] turns a team's configuration into the ordered list
//! of scopes a connector runs, and the order it returns is the order the
//! merged text is assembled in.

use crate::config::TeamConfig;
use crate::models::SourceKind;
use std::fmt;

/// A single query a connector runs for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// One Jira project, optionally filtered to team members.
    Project { key: String, members: Vec<String> },
    /// Items authored by one user, searched across all orgs jointly.
    Author { user: String, orgs: Vec<String> },
    /// Every item in a monitored repository.
    Repository { repo: String },
    /// Commits on a branch by one expected author.
    Branch {
        repo: String,
        branch: String,
        author: String,
    },
    /// All configured chat channels, filtered to an allow-list of senders.
    Channels {
        channels: Vec<String>,
        users: Vec<String>,
    },
}

impl Scope {
    /// The source this scope is queried against.
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Scope::Project { .. } => SourceKind::IssueTracker,
            Scope::Author { .. } | Scope::Repository { .. } | Scope::Branch { .. } => {
                SourceKind::CodeHost
            }
            Scope::Channels { .. } => SourceKind::Chat,
        }
    }

    /// Identifier recorded in the document for this scope.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project { key, .. } => write!(f, "project:{}", key),
            Scope::Author { user, .. } => write!(f, "author:{}", user),
            Scope::Repository { repo } => write!(f, "repo:{}", repo),
            Scope::Branch {
                repo,
                branch,
                author,
            } => write!(f, "branch:{}@{}:{}", repo, branch, author),
            Scope::Channels { channels, .. } => write!(f, "channels:{}", channels.join(",")),
        }
    }
}

/// Expand a team's configuration into the scopes for one source.
///
/// The result depends only on `team` and `kind`, in declaration order:
/// - issue tracker: one scope per project key
/// - code host: one scope per user (all orgs jointly), then one per
///   monitored repo, then one per monitored branch
/// - chat: exactly one scope covering every channel
pub fn expand(team: &TeamConfig, kind: SourceKind) -> Vec<Scope> {
    match kind {
        SourceKind::IssueTracker => {
            let members = trimmed(&team.jira.members);
            trimmed(&team.jira.projects)
                .into_iter()
                .map(|key| Scope::Project {
                    key,
                    members: members.clone(),
                })
                .collect()
        }
        SourceKind::CodeHost => {
            let github = &team.github;
            let orgs = trimmed(&github.orgs);
            let authors = trimmed(&github.users)
                .into_iter()
                .map(|user| Scope::Author {
                    user,
                    orgs: orgs.clone(),
                });
            let repos = trimmed(&github.repos)
                .into_iter()
                .map(|repo| Scope::Repository { repo });
            let branches = github.branches.iter().filter_map(|b| {
                let (repo, branch, author) = (b.repo.trim(), b.branch.trim(), b.author.trim());
                if repo.is_empty() || branch.is_empty() || author.is_empty() {
                    return None;
                }
                Some(Scope::Branch {
                    repo: repo.to_string(),
                    branch: branch.to_string(),
                    author: author.to_string(),
                })
            });
            authors.chain(repos).chain(branches).collect()
        }
        SourceKind::Chat => vec![Scope::Channels {
            channels: trimmed(&team.slack.channels),
            users: trimmed(&team.slack.users),
        }],
    }
}

/// Trimmed copies of the non-blank entries, in order.
fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BranchWatch, GithubTeamConfig, JiraTeamConfig, SlackTeamConfig};

    fn team() -> TeamConfig {
        TeamConfig {
            id: "infra".to_string(),
            display_name: "Infrastructure".to_string(),
            jira: JiraTeamConfig {
                projects: vec!["OPS".to_string(), "INFRA".to_string()],
                members: vec!["alice".to_string()],
            },
            github: GithubTeamConfig {
                users: vec!["alice".to_string(), "bob".to_string()],
                orgs: vec!["acme".to_string(), "acme-labs".to_string()],
                repos: vec!["acme/deploy".to_string()],
                branches: vec![BranchWatch {
                    repo: "acme/site".to_string(),
                    branch: "release".to_string(),
                    author: "Alice Smith".to_string(),
                }],
            },
            slack: SlackTeamConfig {
                channels: vec!["C1".to_string(), "C2".to_string()],
                users: vec!["alice".to_string()],
            },
        }
    }

    #[test]
    fn test_issue_tracker_one_scope_per_project() {
        let scopes = expand(&team(), SourceKind::IssueTracker);
        let ids: Vec<String> = scopes.iter().map(Scope::id).collect();
        assert_eq!(ids, vec!["project:OPS", "project:INFRA"]);
        assert!(scopes
            .iter()
            .all(|s| s.source_kind() == SourceKind::IssueTracker));
    }

    #[test]
    fn test_code_host_families_without_cross_product() {
        let scopes = expand(&team(), SourceKind::CodeHost);
        let ids: Vec<String> = scopes.iter().map(Scope::id).collect();
        // 2 users + 1 repo + 1 branch, not users x orgs
        assert_eq!(
            ids,
            vec![
                "author:alice",
                "author:bob",
                "repo:acme/deploy",
                "branch:acme/site@release:Alice Smith",
            ]
        );
        match &scopes[0] {
            Scope::Author { orgs, .. } => assert_eq!(orgs, &vec!["acme", "acme-labs"]),
            other => panic!("unexpected scope {:?}", other),
        }
    }

    #[test]
    fn test_chat_is_single_scope() {
        let scopes = expand(&team(), SourceKind::Chat);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].id(), "channels:C1,C2");

        let empty = expand(&TeamConfig::default(), SourceKind::Chat);
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn test_expand_is_deterministic() {
        let team = team();
        for kind in SourceKind::ALL {
            assert_eq!(expand(&team, kind), expand(&team, kind));
        }
    }

    #[test]
    fn test_empty_config_yields_no_scopes() {
        let team = TeamConfig::default();
        assert!(expand(&team, SourceKind::IssueTracker).is_empty());
        assert!(expand(&team, SourceKind::CodeHost).is_empty());
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let mut team = team();
        team.slack.channels = vec!["".to_string(), " C1 ".to_string(), "  ".to_string()];
        team.slack.users = vec![" U1".to_string(), "".to_string()];
        team.github.branches = vec![
            BranchWatch {
                repo: " acme/deploy ".to_string(),
                branch: "release".to_string(),
                author: "alice".to_string(),
            },
            BranchWatch {
                repo: "acme/site".to_string(),
                branch: " ".to_string(),
                author: "bob".to_string(),
            },
            BranchWatch {
                repo: "".to_string(),
                branch: "main".to_string(),
                author: "bob".to_string(),
            },
        ];

        let chat = expand(&team, SourceKind::Chat);
        assert_eq!(chat[0].id(), "channels:C1");
        match &chat[0] {
            Scope::Channels { users, .. } => assert_eq!(users, &vec!["U1"]),
            other => panic!("unexpected scope {:?}", other),
        }

        let branch_ids: Vec<String> = expand(&team, SourceKind::CodeHost)
            .iter()
            .filter(|s| matches!(s, Scope::Branch { .. }))
            .map(|s| s.id())
            .collect();
        assert_eq!(branch_ids, vec!["branch:acme/deploy@release:alice"]);
    }
}
