//! Jira issue-tracker connector.
//!
//! Issues are long-lived, so a project scope selects every issue that was
//! created, updated OR resolved inside the window rather than filtering on
//! creation time alone.

use super::{
    decode, read_body, transport_error, truncate, unsupported_scope, warn_if_truncated, Connector,
};
use crate::models::{ActivityItem, ActivityRecord, DateRange, ItemKind, ScopeError, SourceKind};
use crate::scope::Scope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Maximum issues returned per project.
const MAX_RESULTS: u32 = 100;

/// Characters of the description kept in an item.
const DESCRIPTION_LIMIT: usize = 200;

const FIELDS: &str = "summary,status,assignee,priority,updated,created,resolutiondate,description";

/// Connector for the Jira REST search API.
pub struct JiraConnector {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: Option<usize>,
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<Named>,
    #[serde(default)]
    assignee: Option<Person>,
    #[serde(default)]
    priority: Option<Named>,
    created: String,
    updated: String,
    #[serde(default)]
    resolutiondate: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(rename = "displayName")]
    display_name: String,
}

impl JiraConnector {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn search(
        &self,
        key: &str,
        members: &[String],
        range: &DateRange,
        token: &str,
    ) -> Result<Vec<ActivityItem>, ScopeError> {
        let jql = build_jql(key, members, range);
        debug!("Executing JQL: {}", jql);

        let url = format!("{}/rest/api/2/search", self.base_url);
        let max_results = MAX_RESULTS.to_string();
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("jql", jql.as_str()),
                ("maxResults", max_results.as_str()),
                ("fields", FIELDS),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, &self.base_url))?;

        let body = read_body(response, &self.base_url).await?;
        parse_search(&body, &self.base_url)
    }
}

#[async_trait]
impl Connector for JiraConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::IssueTracker
    }

    async fn fetch(&self, scope: &Scope, range: &DateRange, token: &str) -> ActivityRecord {
        let Scope::Project { key, members } = scope else {
            return unsupported_scope(self.kind(), scope);
        };

        match self.search(key, members, range, token).await {
            Ok(items) => {
                info!("Jira project {}: {} issues", key, items.len());
                ActivityRecord::success(self.kind(), scope.id(), items)
            }
            Err(e) => {
                warn!("Jira project {} failed: {}", key, e);
                ActivityRecord::failure(self.kind(), scope.id(), e)
            }
        }
    }
}

/// Build the JQL selecting issues with any activity in the window.
pub fn build_jql(project: &str, members: &[String], range: &DateRange) -> String {
    let start = range.start().format("%Y-%m-%d");
    let end = range.end_exclusive().format("%Y-%m-%d");

    let window = |field: &str| format!("({field} >= \"{start}\" AND {field} < \"{end}\")");

    let mut jql = format!(
        "project = \"{}\" AND ({} OR {} OR {})",
        project,
        window("created"),
        window("updated"),
        window("resolutiondate")
    );

    let members: Vec<&str> = members
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if !members.is_empty() {
        let conditions: Vec<String> = members
            .iter()
            .map(|m| format!("assignee = \"{m}\" OR reporter = \"{m}\""))
            .collect();
        jql.push_str(&format!(" AND ({})", conditions.join(" OR ")));
    }

    jql.push_str(" ORDER BY updated DESC");
    jql
}

/// Parse a search response body into activity items.
fn parse_search(body: &str, base_url: &str) -> Result<Vec<ActivityItem>, ScopeError> {
    let response: SearchResponse = decode(body, "Jira search")?;
    warn_if_truncated("Jira search", response.issues.len(), response.total);

    response
        .issues
        .into_iter()
        .map(|issue| issue_to_item(issue, base_url))
        .collect()
}

fn issue_to_item(issue: JiraIssue, base_url: &str) -> Result<ActivityItem, ScopeError> {
    let fields = issue.fields;
    let created_at = parse_timestamp(&fields.created, &issue.key)?;
    let updated_at = parse_timestamp(&fields.updated, &issue.key)?;
    let resolved_at = fields
        .resolutiondate
        .as_deref()
        .map(|ts| parse_timestamp(ts, &issue.key))
        .transpose()?;

    let mut item = ActivityItem::new(
        ItemKind::Issue,
        issue.key.clone(),
        fields.summary.unwrap_or_default(),
        fields
            .assignee
            .map(|a| a.display_name)
            .unwrap_or_else(|| "Unassigned".to_string()),
        fields
            .status
            .map(|s| s.name)
            .unwrap_or_else(|| "Unknown".to_string()),
        created_at,
    );
    item.updated_at = updated_at;
    item.resolved_at = resolved_at;
    item.url = Some(format!("{}/browse/{}", base_url, issue.key));
    item.detail = fields
        .description
        .filter(|d| !d.trim().is_empty())
        .map(|d| truncate(&d, DESCRIPTION_LIMIT));
    if let Some(priority) = fields.priority {
        item.labels.push(format!("priority:{}", priority.name));
    }

    Ok(item)
}

/// Jira timestamps look like `2026-10-14T16:42:10.123+0000`.
fn parse_timestamp(value: &str, key: &str) -> Result<DateTime<Utc>, ScopeError> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ScopeError::malformed(format!("{}: bad timestamp {:?}: {}", key, value, e)))
}
