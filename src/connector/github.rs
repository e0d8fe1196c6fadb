//! GitHub code-host connector.
//!
//! Three query shapes are supported:
//! - items authored by one user within the window, limited to the team's
//!   organizations (one search across all orgs at once)
//! - every item in a monitored repository within the window
//! - commits on a monitored branch, post-filtered by commit author name,
//!   because the commit listing cannot filter by author name when a branch
//!   reference is given

use super::{
    decode, read_body, transport_error, truncate, unsupported_scope, warn_if_truncated, Connector,
};
use crate::models::{ActivityItem, ActivityRecord, DateRange, ItemKind, ScopeError, SourceKind};
use crate::scope::Scope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

const PER_PAGE: &str = "100";

/// Characters of an issue body kept in an item.
const BODY_LIMIT: usize = 200;

/// Connector for the GitHub REST API.
pub struct GithubConnector {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: Option<usize>,
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    repository_url: String,
    user: Option<Login>,
    #[serde(default)]
    labels: Vec<Label>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct Login {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    html_url: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: CommitAuthor,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
    date: DateTime<Utc>,
}

impl GithubConnector {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)], token: &str) -> Result<String, ScopeError> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(e, &self.api_url))?;

        read_body(response, &self.api_url).await
    }

    async fn search(&self, query: &str, token: &str) -> Result<Vec<ActivityItem>, ScopeError> {
        debug!("GitHub search: {}", query);
        let body = self
            .get("/search/issues", &[("q", query), ("per_page", PER_PAGE)], token)
            .await?;
        parse_search(&body)
    }

    async fn branch_commits(
        &self,
        repo: &str,
        branch: &str,
        author: &str,
        range: &DateRange,
        token: &str,
    ) -> Result<Vec<ActivityItem>, ScopeError> {
        let since = range.start_datetime().to_rfc3339();
        let until = range.end_datetime().to_rfc3339();
        debug!("GitHub commits on {}@{} since {} until {}", repo, branch, since, until);

        let body = self
            .get(
                &format!("/repos/{}/commits", repo),
                &[
                    ("sha", branch),
                    ("since", since.as_str()),
                    ("until", until.as_str()),
                    ("per_page", PER_PAGE),
                ],
                token,
            )
            .await?;
        parse_commits(&body, author)
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::CodeHost
    }

    async fn fetch(&self, scope: &Scope, range: &DateRange, token: &str) -> ActivityRecord {
        let result = match scope {
            Scope::Author { user, orgs } => self.search(&author_query(user, orgs, range), token).await,
            Scope::Repository { repo } => self.search(&repo_query(repo, range), token).await,
            Scope::Branch {
                repo,
                branch,
                author,
            } => self.branch_commits(repo, branch, author, range, token).await,
            _ => return unsupported_scope(self.kind(), scope),
        };

        match result {
            Ok(items) => {
                info!("GitHub {}: {} items", scope, items.len());
                ActivityRecord::success(self.kind(), scope.id(), items)
            }
            Err(e) => {
                warn!("GitHub {} failed: {}", scope, e);
                ActivityRecord::failure(self.kind(), scope.id(), e)
            }
        }
    }
}

fn window(range: &DateRange) -> String {
    format!(
        "updated:{}..{}",
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d")
    )
}

/// Search query for items authored by `user` in any of `orgs`.
pub fn author_query(user: &str, orgs: &[String], range: &DateRange) -> String {
    let mut parts = vec![format!("author:{}", user)];
    parts.extend(
        orgs.iter()
            .filter(|o| !o.trim().is_empty())
            .map(|o| format!("org:{}", o.trim())),
    );
    parts.push(window(range));
    parts.join(" ")
}

/// Search query for every item in one repository.
pub fn repo_query(repo: &str, range: &DateRange) -> String {
    format!("repo:{} {}", repo, window(range))
}

fn parse_search(body: &str) -> Result<Vec<ActivityItem>, ScopeError> {
    let response: SearchResponse = decode(body, "GitHub search")?;
    warn_if_truncated("GitHub search", response.items.len(), response.total_count);
    Ok(response.items.into_iter().map(search_item_to_activity).collect())
}

fn search_item_to_activity(item: SearchItem) -> ActivityItem {
    let repo = item
        .repository_url
        .rsplit_once("/repos/")
        .map(|(_, name)| name.to_string())
        .unwrap_or_default();

    let (kind, state, resolved_at) = match &item.pull_request {
        Some(pr) => match pr.merged_at {
            Some(merged) => (ItemKind::PullRequest, "merged".to_string(), Some(merged)),
            None => (ItemKind::PullRequest, item.state.clone(), item.closed_at),
        },
        None => (ItemKind::Issue, item.state.clone(), item.closed_at),
    };

    let mut activity = ActivityItem::new(
        kind,
        format!("{}#{}", repo, item.number),
        item.title,
        item.user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string()),
        state,
        item.created_at,
    );
    activity.updated_at = item.updated_at;
    activity.resolved_at = resolved_at;
    activity.url = Some(item.html_url);
    activity.detail = item
        .body
        .filter(|b| !b.trim().is_empty())
        .map(|b| truncate(&b, BODY_LIMIT));
    activity.labels = item.labels.into_iter().map(|l| l.name).collect();
    activity
}

/// Parse a commit listing and keep commits by `expected_author`.
fn parse_commits(body: &str, expected_author: &str) -> Result<Vec<ActivityItem>, ScopeError> {
    let commits: Vec<CommitEntry> = decode(body, "GitHub commits")?;
    let total = commits.len();

    let items: Vec<ActivityItem> = commits
        .into_iter()
        .filter(|c| author_matches(&c.commit.author.name, expected_author))
        .map(commit_to_activity)
        .collect();

    debug!("Kept {} of {} commits by {}", items.len(), total, expected_author);
    Ok(items)
}

fn author_matches(name: &str, expected: &str) -> bool {
    name.trim().eq_ignore_ascii_case(expected.trim())
}

fn commit_to_activity(entry: CommitEntry) -> ActivityItem {
    let mut lines = entry.commit.message.lines();
    let subject = lines.next().unwrap_or_default().to_string();
    let rest = lines.collect::<Vec<_>>().join("\n");

    let short_sha: String = entry.sha.chars().take(7).collect();
    let mut item = ActivityItem::new(
        ItemKind::Commit,
        short_sha,
        subject,
        entry.commit.author.name,
        "committed",
        entry.commit.author.date,
    );
    item.url = Some(entry.html_url);
    item.detail = Some(rest.trim().to_string()).filter(|r| !r.is_empty());
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::test_server;
    use crate::models::ErrorKind;
    use chrono::NaiveDate;

    const SEARCH_FIXTURE: &str = include_str!("../../fixtures/github_search.json");
    const COMMITS_FIXTURE: &str = include_str!("../../fixtures/github_commits.json");

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_author_query_searches_orgs_jointly() {
        let orgs = vec!["acme".to_string(), "acme-labs".to_string()];
        assert_eq!(
            author_query("alice", &orgs, &range()),
            "author:alice org:acme org:acme-labs updated:2026-10-11..2026-10-18"
        );
        assert_eq!(
            author_query("alice", &[], &range()),
            "author:alice updated:2026-10-11..2026-10-18"
        );
    }

    #[test]
    fn test_repo_query() {
        assert_eq!(
            repo_query("acme/deploy", &range()),
            "repo:acme/deploy updated:2026-10-11..2026-10-18"
        );
    }

    #[test]
    fn test_parse_search_fixture() {
        let items = parse_search(SEARCH_FIXTURE).unwrap();
        assert_eq!(items.len(), 3);

        let merged = &items[0];
        assert_eq!(merged.kind, ItemKind::PullRequest);
        assert_eq!(merged.id, "acme/deploy#412");
        assert_eq!(merged.state, "merged");
        assert_eq!(merged.actor, "alice");
        assert_eq!(merged.labels, vec!["ci", "reliability"]);
        assert!(merged.resolved_at.is_some());

        let issue = &items[1];
        assert_eq!(issue.kind, ItemKind::Issue);
        assert_eq!(issue.id, "acme-labs/runbooks#77");
        assert_eq!(issue.state, "open");
        assert!(issue.resolved_at.is_none());
        assert!(issue.detail.is_none());

        let closed_unmerged = &items[2];
        assert_eq!(closed_unmerged.kind, ItemKind::PullRequest);
        assert_eq!(closed_unmerged.state, "closed");
        assert!(closed_unmerged.resolved_at.is_some());
    }

    #[test]
    fn test_commits_filtered_by_author_name() {
        let items = parse_commits(COMMITS_FIXTURE, "Alice Smith").unwrap();
        // Bot commit dropped, case-insensitive name match kept
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "9f1c2d3");
        assert_eq!(items[0].title, "Fix broken footer links");
        assert_eq!(
            items[0].detail.as_deref(),
            Some("The footer pointed at the old docs domain.")
        );
        assert_eq!(items[1].title, "Release 2.4.0");
        assert!(items[1].detail.is_none());

        let none = parse_commits(COMMITS_FIXTURE, "Carol").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_malformed_payloads() {
        let err = parse_search(r#"{"message":"Bad credentials"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);

        let err = parse_commits(r#"{"message":"Not Found"}"#, "alice").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }

    fn author() -> Scope {
        Scope::Author {
            user: "alice".to_string(),
            orgs: vec!["acme".to_string()],
        }
    }

    #[test]
    fn test_unreachable_server_is_transport_failure() {
        let connector = GithubConnector::new(test_server::client(), test_server::REFUSED_URL);
        let record = tokio_test::block_on(connector.fetch(&author(), &range(), "token"));

        assert_eq!(record.scope_id, "author:alice");
        assert_eq!(record.item_count, 0);
        assert_eq!(record.error.unwrap().kind, ErrorKind::TransportFailure);
    }

    #[test]
    fn test_rate_limited_is_transport_failure() {
        let record = tokio_test::block_on(async {
            let url = test_server::respond_with("403 Forbidden", r#"{"message":"API rate limit exceeded"}"#).await;
            GithubConnector::new(test_server::client(), &url)
                .fetch(&author(), &range(), "token")
                .await
        });

        let error = record.error.unwrap();
        assert_eq!(error.kind, ErrorKind::TransportFailure);
        assert!(error.message.contains("rate limit"));
    }

    #[test]
    fn test_unexpected_body_is_malformed() {
        let record = tokio_test::block_on(async {
            let url = test_server::respond_with("200 OK", r#"{"unexpected":true}"#).await;
            GithubConnector::new(test_server::client(), &url)
                .fetch(&author(), &range(), "token")
                .await
        });

        assert_eq!(record.error.unwrap().kind, ErrorKind::MalformedResponse);
    }
}
