//! Per-source merge.
//!
//! [`merge_source`] is a pure fold over the ordered per-scope records of one
//! source. Successful scopes become blocks (in scope order) and contribute
//! their counts; failing scopes contribute nothing to the count and are
//! listed in `partial_failures`.

use crate::models::{
    ActivityRecord, DateRange, ErrorKind, ScopeBlock, ScopeFailure, SourceKind, SourceRecord,
    SourceStatus,
};
use crate::report::render_blocks;

#[derive(Default)]
struct Fold {
    blocks: Vec<ScopeBlock>,
    failures: Vec<ScopeFailure>,
}

impl Fold {
    fn push(mut self, record: ActivityRecord) -> Self {
        match record.into_result() {
            Ok(block) => self.blocks.push(block),
            Err(failure) => self.failures.push(failure),
        }
        self
    }
}

/// Merge every scope result of one source into a single record.
///
/// `records` must be in scope declaration order; that order is kept in
/// `scopes` and `combined_text`.
pub fn merge_source(kind: SourceKind, range: DateRange, records: Vec<ActivityRecord>) -> SourceRecord {
    let scopes_queried = records.len();
    let Fold { blocks, failures } = records.into_iter().fold(Fold::default(), Fold::push);

    let total_count = blocks.iter().map(|b| b.item_count).sum();

    let status = if !failures.is_empty() {
        if blocks.is_empty() {
            SourceStatus::Failed
        } else {
            SourceStatus::Partial
        }
    } else if total_count == 0 {
        SourceStatus::Empty
    } else {
        SourceStatus::Ok
    };

    let error_kind = if failures.is_empty() {
        None
    } else {
        Some(ErrorKind::PartialScopeFailure)
    };

    SourceRecord {
        source_kind: kind,
        status,
        error_kind,
        date_range: range,
        scopes_queried,
        total_count,
        combined_text: render_blocks(kind, &blocks),
        scopes: blocks,
        partial_failures: failures,
    }
}

/// Record for a source skipped because its credentials are missing.
pub fn degraded_source(kind: SourceKind, range: DateRange) -> SourceRecord {
    SourceRecord {
        source_kind: kind,
        status: SourceStatus::Degraded,
        error_kind: Some(ErrorKind::MissingCredentials),
        date_range: range,
        scopes_queried: 0,
        total_count: 0,
        combined_text: String::new(),
        scopes: Vec::new(),
        partial_failures: Vec::new(),
    }
}
