//! Document persistence.
//!
//! Each run writes a new, never-overwritten JSON document under
//! `{root}/{team_id}/` and then moves that team's `latest.json` pointer
//! to it. Both writes go through a temporary file in the same directory
//! followed by a rename, so readers only ever see complete files, and the
//! pointer is only moved after the document it names is in place.

use crate::error::StoreError;
use crate::models::UnifiedDocument;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File name of the per-team pointer to the newest document.
pub const LATEST_FILE: &str = "latest.json";

/// Contents of `latest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPointer {
    /// File name of the document, relative to the team directory.
    pub document: String,
    pub generated_at: DateTime<Utc>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Filesystem store for unified documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one team's documents.
    pub fn team_dir(&self, team_id: &str) -> Result<PathBuf, StoreError> {
        validate_team_id(team_id)?;
        Ok(self.root.join(team_id))
    }

    /// Write a document and point `latest.json` at it. Returns the document path.
    pub fn persist(&self, doc: &UnifiedDocument) -> Result<PathBuf, StoreError> {
        let dir = self.team_dir(&doc.metadata.team_id)?;
        fs::create_dir_all(&dir)?;

        let file_name = document_file_name(&doc.metadata.team_id, doc.metadata.generated_at);
        let path = dir.join(&file_name);

        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = write_temp(&dir, &json)?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists(path.clone())
            } else {
                StoreError::Io(e.error)
            }
        })?;
        debug!("Wrote document {}", path.display());

        let pointer = LatestPointer {
            document: file_name,
            generated_at: doc.metadata.generated_at,
            period_start: doc.metadata.period_start,
            period_end: doc.metadata.period_end,
        };
        let tmp = write_temp(&dir, &serde_json::to_vec_pretty(&pointer)?)?;
        tmp.persist(dir.join(LATEST_FILE))
            .map_err(|e| StoreError::Io(e.error))?;

        info!(
            "Saved {} document to {}",
            doc.metadata.team_id,
            path.display()
        );
        Ok(path)
    }

    /// Read a team's latest pointer, if one exists.
    pub fn latest_pointer(&self, team_id: &str) -> Result<Option<LatestPointer>, StoreError> {
        let path = self.team_dir(team_id)?.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&content)?))
    }

    /// Load the document the latest pointer references.
    pub fn load_latest(&self, team_id: &str) -> Result<Option<UnifiedDocument>, StoreError> {
        match self.latest_pointer(team_id)? {
            Some(pointer) => {
                let path = self.team_dir(team_id)?.join(&pointer.document);
                Ok(Some(Self::load(&path)?))
            }
            None => Ok(None),
        }
    }

    /// Load one document by path.
    pub fn load(path: &Path) -> Result<UnifiedDocument, StoreError> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}

/// `{team}-{YYYYMMDDTHHMMSSmmm}Z.json`, unique per run timestamp.
pub fn document_file_name(team_id: &str, generated_at: DateTime<Utc>) -> String {
    format!("{}-{}Z.json", team_id, generated_at.format("%Y%m%dT%H%M%S%3f"))
}

fn validate_team_id(team_id: &str) -> Result<(), StoreError> {
    let bad = team_id.is_empty()
        || team_id == "."
        || team_id == ".."
        || team_id.contains(['/', '\\'])
        || team_id == LATEST_FILE;
    if bad {
        Err(StoreError::InvalidTeamId(team_id.to_string()))
    } else {
        Ok(())
    }
}

fn write_temp(dir: &Path, content: &[u8]) -> Result<NamedTempFile, StoreError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}
