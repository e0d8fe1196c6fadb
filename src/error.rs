//! Run-level error types.
//!
//! Scope-level failures never surface here: connectors fold them into
//! [`ActivityRecord::error`](crate::models::ActivityRecord). These are the
//! only two ways a run can abort.

use crate::models::SourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Failure writing or reading persisted documents.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("team id {0:?} cannot be used as a directory name")]
    InvalidTeamId(String),
}

/// Reasons a single team's run aborts.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("missing credentials for mandatory source {0}")]
    MissingCredentials(SourceKind),
    #[error("failed to persist document: {0}")]
    Persistence(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_messages() {
        let err = RunError::MissingCredentials(SourceKind::IssueTracker);
        assert_eq!(
            err.to_string(),
            "missing credentials for mandatory source issue_tracker"
        );

        let err: RunError = StoreError::InvalidTeamId("../x".to_string()).into();
        assert!(matches!(err, RunError::Persistence(_)));
        assert!(err.to_string().starts_with("failed to persist document"));
    }
}
