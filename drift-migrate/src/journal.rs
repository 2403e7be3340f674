//! The migration journal.
//!
//! `meta/_journal.json` lists every generated migration in order. It is
//! the authoritative record of what exists; the SQL files are addressed
//! through it by index and tag.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Current journal format version.
pub const JOURNAL_VERSION: &str = "1";

/// Journal file name under `meta/`.
pub const JOURNAL_FILE: &str = "_journal.json";

/// One generated migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Zero-based migration index.
    pub idx: u32,
    /// Generation time, milliseconds since the epoch.
    pub when: i64,
    /// Human-readable tag; part of the SQL file name.
    pub tag: String,
    /// Whether the SQL file carries statement breakpoints.
    pub breakpoints: bool,
}

/// The journal for one migrations directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub version: String,
    pub dialect: String,
    pub entries: Vec<JournalEntry>,
}

impl Journal {
    /// A fresh journal with no entries.
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            version: JOURNAL_VERSION.to_string(),
            dialect: dialect.into(),
            entries: Vec::new(),
        }
    }

    /// Index the next generated migration will get.
    pub fn next_idx(&self) -> u32 {
        self.entries.last().map(|e| e.idx + 1).unwrap_or(0)
    }

    /// Append an entry for a newly generated migration.
    pub fn append(&mut self, tag: impl Into<String>, breakpoints: bool) -> &JournalEntry {
        let entry = JournalEntry {
            idx: self.next_idx(),
            when: Utc::now().timestamp_millis(),
            tag: tag.into(),
            breakpoints,
        };
        self.entries.push(entry);
        self.entries.last().unwrap()
    }

    /// Read the journal under `meta_dir`, if one exists.
    pub async fn read(meta_dir: &Path) -> MigrateResult<Option<Journal>> {
        let path = meta_dir.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let journal: Journal = serde_json::from_str(&raw)?;
        if journal.version != JOURNAL_VERSION {
            return Err(MigrationError::invalid_journal(format!(
                "version '{}' is not supported (expected '{}')",
                journal.version, JOURNAL_VERSION
            )));
        }
        Ok(Some(journal))
    }

    /// Write the journal under `meta_dir`.
    pub async fn write(&self, meta_dir: &Path) -> MigrateResult<()> {
        let path = meta_dir.join(JOURNAL_FILE);
        let raw = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, raw).await?;
        Ok(())
    }
}
