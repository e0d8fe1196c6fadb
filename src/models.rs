//! Data models for activity gathering.
//!
//! This module contains the records that flow through the pipeline:
//! per-scope [`ActivityRecord`]s returned by connectors, per-source
//! [`SourceRecord`]s produced by the merge, and the [`UnifiedDocument`]
//! persisted at the end of a run.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One of the three external systems activity is gathered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Issue tracker (Jira)
    IssueTracker,
    /// Code host (GitHub)
    CodeHost,
    /// Chat (Slack)
    Chat,
}

impl SourceKind {
    /// Every source kind, in the fixed processing order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::IssueTracker,
        SourceKind::CodeHost,
        SourceKind::Chat,
    ];

    /// Whether a run must abort when this source has no credentials.
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, SourceKind::Chat)
    }

    /// Human-readable name of the backing system.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::IssueTracker => "Jira",
            SourceKind::CodeHost => "GitHub",
            SourceKind::Chat => "Slack",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SourceKind::IssueTracker => "🎫",
            SourceKind::CodeHost => "🐙",
            SourceKind::Chat => "💬",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::IssueTracker => write!(f, "issue_tracker"),
            SourceKind::CodeHost => write!(f, "code_host"),
            SourceKind::Chat => write!(f, "chat"),
        }
    }
}

/// Returned when a date range cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDateRange {
    #[error("invalid date range: start {start} is after end {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },
    #[error("invalid date range: {days} days before {end} is outside the calendar")]
    OutOfRange { end: NaiveDate, days: u32 },
}

/// Inclusive window of calendar days (UTC) that a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = InvalidDateRange;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRange> {
        if start > end {
            return Err(InvalidDateRange::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to and including `end`.
    pub fn last_days(end: NaiveDate, days: u32) -> Result<Self, InvalidDateRange> {
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or(InvalidDateRange::OutOfRange { end, days })?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First day after the window, for half-open queries.
    pub fn end_exclusive(&self) -> NaiveDate {
        self.end + Duration::days(1)
    }

    /// Midnight UTC at the start of the window.
    pub fn start_datetime(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Last second (UTC) of the final day in the window.
    pub fn end_datetime(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.end_exclusive().and_time(NaiveTime::MIN)) - Duration::seconds(1)
    }

    /// Whether a timestamp falls inside the window.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_datetime() && ts <= self.end_datetime()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Failure categories recorded in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required secret absent.
    MissingCredentials,
    /// Network or HTTP-level failure reaching the external system.
    TransportFailure,
    /// Response received but not parseable into the expected shape.
    MalformedResponse,
    /// Some scopes of a multi-scope source failed.
    PartialScopeFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MissingCredentials => write!(f, "missing credentials"),
            ErrorKind::TransportFailure => write!(f, "transport failure"),
            ErrorKind::MalformedResponse => write!(f, "malformed response"),
            ErrorKind::PartialScopeFailure => write!(f, "partial scope failure"),
        }
    }
}

/// Typed failure of a single scoped fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ScopeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ScopeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::TransportFailure,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::MalformedResponse,
            message: message.into(),
        }
    }
}

/// What a single activity entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest,
    Commit,
    Message,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Issue => write!(f, "Issue"),
            ItemKind::PullRequest => write!(f, "Pull Request"),
            ItemKind::Commit => write!(f, "Commit"),
            ItemKind::Message => write!(f, "Message"),
        }
    }
}

/// A single normalized activity entry (issue, pull request, commit or message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ItemKind,
    /// Stable identifier in the source system (issue key, `owner/repo#42`, short SHA, ...).
    pub id: String,
    /// Title, summary or first line of the entry.
    pub title: String,
    /// Person the entry is attributed to.
    pub actor: String,
    /// Status or state in the source system.
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Resolution or merge time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Longer free text (description, commit body, message text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl ActivityItem {
    /// Creates an entry whose update time equals its creation time.
    pub fn new(
        kind: ItemKind,
        id: impl Into<String>,
        title: impl Into<String>,
        actor: impl Into<String>,
        state: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            title: title.into(),
            actor: actor.into(),
            state: state.into(),
            created_at,
            updated_at: created_at,
            resolved_at: None,
            url: None,
            detail: None,
            labels: Vec::new(),
        }
    }
}

/// Result of one scoped fetch.
///
/// Exactly one of these holds: items are present and `item_count > 0`,
/// `error` is set (then `items` is empty and `item_count == 0`), or the
/// result is genuinely empty with no error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub source_kind: SourceKind,
    pub scope_id: String,
    pub items: Vec<ActivityItem>,
    pub item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScopeError>,
}

impl ActivityRecord {
    /// Creates a successful record; `item_count` is derived from `items`.
    pub fn success(
        source_kind: SourceKind,
        scope_id: impl Into<String>,
        items: Vec<ActivityItem>,
    ) -> Self {
        Self {
            source_kind,
            scope_id: scope_id.into(),
            item_count: items.len(),
            items,
            error: None,
        }
    }

    /// Creates a failed record with no items.
    pub fn failure(source_kind: SourceKind, scope_id: impl Into<String>, error: ScopeError) -> Self {
        Self {
            source_kind,
            scope_id: scope_id.into(),
            items: Vec::new(),
            item_count: 0,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Split into the successful block or the failure entry.
    pub fn into_result(self) -> Result<ScopeBlock, ScopeFailure> {
        match self.error {
            Some(error) => Err(ScopeFailure {
                scope_id: self.scope_id,
                error: error.kind,
                message: error.message,
            }),
            None => Ok(ScopeBlock {
                scope_id: self.scope_id,
                item_count: self.items.len(),
                items: self.items,
            }),
        }
    }
}

/// Items contributed by one successful scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeBlock {
    pub scope_id: String,
    pub item_count: usize,
    pub items: Vec<ActivityItem>,
}

/// A scope that failed, kept for visibility in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFailure {
    pub scope_id: String,
    pub error: ErrorKind,
    pub message: String,
}

/// Overall health of a source within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Every scope succeeded and at least one item was found.
    Ok,
    /// Every scope succeeded but nothing matched (or there were no scopes).
    Empty,
    /// Some scopes failed.
    Partial,
    /// Every scope failed.
    Failed,
    /// Not attempted because credentials were missing.
    Degraded,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Ok => write!(f, "ok"),
            SourceStatus::Empty => write!(f, "no activity"),
            SourceStatus::Partial => write!(f, "partial"),
            SourceStatus::Failed => write!(f, "failed"),
            SourceStatus::Degraded => write!(f, "unavailable"),
        }
    }
}

/// Merge of every scope of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_kind: SourceKind,
    pub status: SourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub date_range: DateRange,
    pub scopes_queried: usize,
    /// Sum of item counts over successful scopes only.
    pub total_count: usize,
    /// Rendered text of every successful scope, in scope order.
    pub combined_text: String,
    pub scopes: Vec<ScopeBlock>,
    pub partial_failures: Vec<ScopeFailure>,
}

impl SourceRecord {
    /// True when the source was unreachable in any way.
    pub fn is_impaired(&self) -> bool {
        matches!(
            self.status,
            SourceStatus::Partial | SourceStatus::Failed | SourceStatus::Degraded
        )
    }
}

/// Team identity and window shared by every source in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub team_id: String,
    pub team_display_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub generated_at: DateTime<Utc>,
}

/// The three source records of a run. Every kind is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sources {
    pub issue_tracker: SourceRecord,
    pub code_host: SourceRecord,
    pub chat: SourceRecord,
}

impl Sources {
    pub fn get(&self, kind: SourceKind) -> &SourceRecord {
        match kind {
            SourceKind::IssueTracker => &self.issue_tracker,
            SourceKind::CodeHost => &self.code_host,
            SourceKind::Chat => &self.chat,
        }
    }

    /// Records in the fixed source order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceRecord> {
        [&self.issue_tracker, &self.code_host, &self.chat].into_iter()
    }
}

/// The single merged output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDocument {
    pub metadata: DocumentMetadata,
    pub sources: Sources,
}

impl UnifiedDocument {
    /// Total items across all sources.
    pub fn total_items(&self) -> usize {
        self.sources.iter().map(|s| s.total_count).sum()
    }

    /// Sources that were unavailable or had failing scopes.
    pub fn impaired_sources(&self) -> Vec<SourceKind> {
        self.sources
            .iter()
            .filter(|s| s.is_impaired())
            .map(|s| s.source_kind)
            .collect()
    }
}
