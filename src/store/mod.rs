//! Persisted status history -- append-only JSON document on disk.
//!
//! The whole history is read and rewritten on every append. That is fine at
//! this scale (one record per observed change); cross-process writers must be
//! serialized externally.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One observed status, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub status: String,
    pub last_updated: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    statuses: Vec<StatusRecord>,
}

/// File-backed store for the status history.
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full history. An absent file is an empty history, never an
    /// error; an unreadable or corrupt file is logged and treated the same.
    pub fn load(&self) -> Vec<StatusRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Status history unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<HistoryDocument>(&raw) {
            Ok(doc) => doc.statuses,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Status history corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append one record: read-all, push, write-all. The new document is fully
    /// written to a sibling temp file before it replaces the old one, so a
    /// failed write never truncates durable state.
    pub fn append(&self, status: &str, last_updated: &str) -> Result<()> {
        let mut statuses = self.load();
        statuses.push(StatusRecord {
            status: status.to_string(),
            last_updated: last_updated.to_string(),
            recorded_at: Utc::now(),
        });

        let doc = HistoryDocument { statuses };
        let payload = serde_json::to_string(&doc)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}
