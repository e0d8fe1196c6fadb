//! Source connectors.
//!
//! A connector fetches raw activity from one external system for one
//! [`Scope`] and one [`DateRange`], and normalizes it into an
//! [`ActivityRecord`]. Connectors never fail past their boundary: network,
//! auth and decoding failures are all captured in the record's `error`.

pub mod github;
pub mod jira;
pub mod slack;

use crate::config::Config;
use crate::models::{ActivityRecord, DateRange, ScopeError, SourceKind};
use crate::scope::Scope;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use github::GithubConnector;
pub use jira::JiraConnector;
pub use slack::SlackConnector;

/// Fetches activity from one external system.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The source this connector serves.
    fn kind(&self) -> SourceKind;

    /// Fetch one scope within the window.
    ///
    /// Always returns a well-formed record; failures are carried in
    /// [`ActivityRecord::error`].
    async fn fetch(&self, scope: &Scope, range: &DateRange, token: &str) -> ActivityRecord;
}

/// One connector per source kind.
#[derive(Clone)]
pub struct ConnectorSet {
    pub issue_tracker: Arc<dyn Connector>,
    pub code_host: Arc<dyn Connector>,
    pub chat: Arc<dyn Connector>,
}

impl ConnectorSet {
    /// Build the HTTP connectors described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = http_client(Duration::from_secs(config.general.timeout_seconds))?;
        let endpoints = &config.endpoints;

        Ok(Self {
            issue_tracker: Arc::new(JiraConnector::new(client.clone(), &endpoints.jira_base_url)),
            code_host: Arc::new(GithubConnector::new(client.clone(), &endpoints.github_api_url)),
            chat: Arc::new(SlackConnector::new(client, &endpoints.slack_api_url)),
        })
    }

    pub fn get(&self, kind: SourceKind) -> &dyn Connector {
        match kind {
            SourceKind::IssueTracker => self.issue_tracker.as_ref(),
            SourceKind::CodeHost => self.code_host.as_ref(),
            SourceKind::Chat => self.chat.as_ref(),
        }
    }
}

/// Shared HTTP client with a request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("team-digest/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a request error as a transport failure.
pub(crate) fn transport_error(err: reqwest::Error, endpoint: &str) -> ScopeError {
    if err.is_timeout() {
        ScopeError::transport(format!("request to {} timed out", endpoint))
    } else if err.is_connect() {
        ScopeError::transport(format!("cannot connect to {}", endpoint))
    } else if err.is_decode() {
        ScopeError::malformed(format!("failed to read response from {}: {}", endpoint, err))
    } else {
        ScopeError::transport(format!("request to {} failed: {}", endpoint, err))
    }
}

/// Read a response body, turning non-success statuses into transport failures.
pub(crate) async fn read_body(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<String, ScopeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ScopeError::transport(format!(
            "{} returned {}: {}",
            endpoint,
            status,
            truncate(&body, 200)
        )));
    }

    response
        .text()
        .await
        .map_err(|e| transport_error(e, endpoint))
}

/// Decode a JSON body into the expected shape.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    body: &str,
    what: &str,
) -> Result<T, ScopeError> {
    serde_json::from_str(body)
        .map_err(|e| ScopeError::malformed(format!("unexpected {} response: {}", what, e)))
}

/// Record for a scope handed to the wrong connector.
pub(crate) fn unsupported_scope(kind: SourceKind, scope: &Scope) -> ActivityRecord {
    ActivityRecord::failure(
        kind,
        scope.id(),
        ScopeError::malformed(format!("{} connector cannot query scope {}", kind, scope)),
    )
}

/// Warn when a single-page listing reports more matches than it returned.
pub(crate) fn warn_if_truncated(what: &str, returned: usize, total: Option<usize>) -> bool {
    match total {
        Some(total) if total > returned => {
            warn!(
                "{}: only the first {} of {} results were read; narrow the scope or the window",
                what, returned, total
            );
            true
        }
        _ => false,
    }
}

/// Shorten text to `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorKind;

    #[derive(serde::Deserialize)]
    struct Shape {
        #[allow(dead_code)]
        items: Vec<u32>,
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        // Multi-byte characters are not split
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_decode_reports_malformed() {
        let ok: Result<Shape, _> = decode(r#"{"items":[1,2]}"#, "test");
        assert!(ok.is_ok());

        let err = decode::<Shape>(r#"{"things":[]}"#, "test").err().unwrap();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert!(err.message.contains("unexpected test response"));
    }

    #[test]
    fn test_warn_if_truncated() {
        assert!(warn_if_truncated("search", 100, Some(250)));
        assert!(!warn_if_truncated("search", 3, Some(3)));
        assert!(!warn_if_truncated("search", 3, None));
    }

    #[test]
    fn test_unsupported_scope_is_failure() {
        let scope = Scope::Repository {
            repo: "acme/x".to_string(),
        };
        let record = unsupported_scope(SourceKind::IssueTracker, &scope);
        assert!(record.is_failure());
        assert_eq!(record.scope_id, "repo:acme/x");
        assert_eq!(record.item_count, 0);
    }
}
