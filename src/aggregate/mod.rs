//! Multi-source gathering.
//!
//! The [`Aggregator`] drives scope expansion and the connectors for each
//! source, merges each source's scope results into a [`SourceRecord`], and
//! assembles the three records into one [`UnifiedDocument`].
//!
//! A run aborts only when a mandatory source has no credentials (checked
//! before any request is made) or when the document cannot be persisted.
//! Everything else degrades the affected source and the run continues.

pub mod merge;

pub use merge::{degraded_source, merge_source};

use crate::config::{GeneralConfig, TeamConfig};
use crate::connector::{unsupported_scope, Connector, ConnectorSet};
use crate::credentials::Credentials;
use crate::error::RunError;
use crate::models::{
    ActivityRecord, DateRange, DocumentMetadata, ScopeError, SourceKind, SourceRecord, Sources,
    UnifiedDocument,
};
use crate::scope::{self, Scope};
use crate::store::DocumentStore;
use chrono::Utc;
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scheduling knobs for a run.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Pause between consecutive requests to the same source.
    pub request_delay: Duration,
    /// Upper bound on a single scope fetch.
    pub fetch_timeout: Duration,
    /// Fetch the scopes of a source concurrently (staggered by `request_delay`).
    pub concurrent_scopes: bool,
    /// Gather the three sources concurrently.
    pub concurrent_sources: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(60),
            concurrent_scopes: false,
            concurrent_sources: false,
        }
    }
}

impl From<&GeneralConfig> for AggregatorSettings {
    fn from(config: &GeneralConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(config.request_delay_ms),
            fetch_timeout: Duration::from_secs(config.timeout_seconds),
            concurrent_scopes: config.concurrent_scopes,
            concurrent_sources: config.concurrent_sources,
        }
    }
}

/// A persisted run.
#[derive(Debug, Clone)]
pub struct PersistedRun {
    pub document: UnifiedDocument,
    pub path: PathBuf,
}

/// Gathers and merges activity for one team and one window.
pub struct Aggregator {
    connectors: ConnectorSet,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(connectors: ConnectorSet, settings: AggregatorSettings) -> Self {
        Self {
            connectors,
            settings,
        }
    }

    /// Gather every source and assemble the unified document.
    ///
    /// Fails before any fetch if a mandatory source has no credentials.
    pub async fn run(
        &self,
        team: &TeamConfig,
        range: DateRange,
        credentials: &Credentials,
    ) -> Result<UnifiedDocument, RunError> {
        if let Some(kind) = SourceKind::ALL
            .into_iter()
            .find(|kind| kind.is_mandatory() && credentials.token(*kind).is_none())
        {
            return Err(RunError::MissingCredentials(kind));
        }

        info!("Gathering activity for {} ({})", team.name(), range);

        let sources = if self.settings.concurrent_sources {
            let (issue_tracker, code_host, chat) = tokio::join!(
                self.gather_source(SourceKind::IssueTracker, team, range, credentials),
                self.gather_source(SourceKind::CodeHost, team, range, credentials),
                self.gather_source(SourceKind::Chat, team, range, credentials),
            );
            Sources {
                issue_tracker,
                code_host,
                chat,
            }
        } else {
            Sources {
                issue_tracker: self
                    .gather_source(SourceKind::IssueTracker, team, range, credentials)
                    .await,
                code_host: self
                    .gather_source(SourceKind::CodeHost, team, range, credentials)
                    .await,
                chat: self
                    .gather_source(SourceKind::Chat, team, range, credentials)
                    .await,
            }
        };

        Ok(UnifiedDocument {
            metadata: DocumentMetadata {
                team_id: team.id.clone(),
                team_display_name: team.name().to_string(),
                period_start: range.start(),
                period_end: range.end(),
                generated_at: Utc::now(),
            },
            sources,
        })
    }

    /// Run, then persist the document and move the latest pointer.
    pub async fn run_and_persist(
        &self,
        team: &TeamConfig,
        range: DateRange,
        credentials: &Credentials,
        store: &DocumentStore,
    ) -> Result<PersistedRun, RunError> {
        let document = self.run(team, range, credentials).await?;
        let path = store.persist(&document)?;
        Ok(PersistedRun { document, path })
    }

    async fn gather_source(
        &self,
        kind: SourceKind,
        team: &TeamConfig,
        range: DateRange,
        credentials: &Credentials,
    ) -> SourceRecord {
        let Some(token) = credentials.token(kind) else {
            warn!("{} credentials not configured, skipping {} data", kind.label(), kind);
            return degraded_source(kind, range);
        };

        let scopes = scope::expand(team, kind);
        debug!("{}: {} scopes", kind.label(), scopes.len());

        let connector = self.connectors.get(kind);
        let records = if self.settings.concurrent_scopes {
            self.fetch_concurrent(connector, &scopes, &range, token).await
        } else {
            self.fetch_sequential(connector, &scopes, &range, token).await
        };

        let record = merge_source(kind, range, records);
        info!(
            "{}: {} items from {} scopes ({})",
            kind.label(),
            record.total_count,
            record.scopes_queried,
            record.status
        );
        record
    }

    async fn fetch_sequential(
        &self,
        connector: &dyn Connector,
        scopes: &[Scope],
        range: &DateRange,
        token: &str,
    ) -> Vec<ActivityRecord> {
        let mut records = Vec::with_capacity(scopes.len());
        for (i, scope) in scopes.iter().enumerate() {
            if i > 0 && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            records.push(self.fetch_one(connector, scope, range, token).await);
        }
        records
    }

    /// Start scope `i` after `i * request_delay`; join_all keeps input order.
    async fn fetch_concurrent(
        &self,
        connector: &dyn Connector,
        scopes: &[Scope],
        range: &DateRange,
        token: &str,
    ) -> Vec<ActivityRecord> {
        let delay = self.settings.request_delay;
        let fetches = scopes.iter().enumerate().map(move |(i, scope)| async move {
            let wait = delay.saturating_mul(i as u32);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            self.fetch_one(connector, scope, range, token).await
        });
        join_all(fetches).await
    }

    async fn fetch_one(
        &self,
        connector: &dyn Connector,
        scope: &Scope,
        range: &DateRange,
        token: &str,
    ) -> ActivityRecord {
        if scope.source_kind() != connector.kind() {
            warn!("{} is not a {} scope", scope, connector.kind());
            return unsupported_scope(connector.kind(), scope);
        }

        let fetch = connector.fetch(scope, range, token);
        match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(record) => {
                if record.is_failure() {
                    debug!("{} fetch failed", scope);
                }
                record
            }
            Err(_) => {
                warn!(
                    "{} timed out after {}s",
                    scope,
                    self.settings.fetch_timeout.as_secs_f64()
                );
                ActivityRecord::failure(
                    connector.kind(),
                    scope.id(),
                    ScopeError::transport(format!(
                        "fetch timed out after {}s",
                        self.settings.fetch_timeout.as_secs_f64()
                    )),
                )
            }
        }
    }
}
