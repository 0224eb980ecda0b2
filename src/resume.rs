//! Resume support
//!
//! Two independent recovery paths that compose with per-item dedup:
//!
//! * **File-based**: re-derive the identifier set from an existing output
//!   artifact; anything already present is done and never re-fetched.
//! * **Cursor**: an explicit `category,page` position; categories before
//!   the target are skipped and the target starts at the given page.
//!
//! The [`CursorLedger`] persists per-category progress during a run so a
//! crash can be resumed at an exact page boundary. A page index is only
//! committed after every item on that page has been attempted.

use crate::storage::{StorageError, StorageResult};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// How the run should resume, derived from the `--resume` argument shape:
/// `category,page` (one comma, integer page) is a cursor, anything else is
/// an artifact path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResumeMode {
    #[default]
    Fresh,
    File(PathBuf),
    Cursor { category: String, page: u32 },
}

impl ResumeMode {
    pub fn parse(arg: &str) -> ResumeMode {
        let parts: Vec<&str> = arg.splitn(2, ',').collect();
        if parts.len() == 2 {
            if let Ok(page) = parts[1].trim().parse::<u32>() {
                return ResumeMode::Cursor {
                    category: parts[0].trim().to_string(),
                    page,
                };
            }
        }
        ResumeMode::File(PathBuf::from(arg))
    }
}

/// Re-derives the identifier set from an existing output artifact.
///
/// Format-agnostic: a leading `[` means a JSON array, anything else is
/// read line by line. Resumption therefore works whichever output format
/// produced the artifact. A missing file is an empty set.
pub fn scan_existing_ids(path: &Path) -> StorageResult<HashSet<String>> {
    let mut ids = HashSet::new();
    if !path.exists() {
        return Ok(ids);
    }
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim_start();

    if trimmed.starts_with('[') {
        let parsed: serde_json::Value = serde_json::from_str(trimmed)?;
        if let serde_json::Value::Array(records) = parsed {
            for record in records {
                if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                }
            }
        }
    } else {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                }
            }
        }
    }

    tracing::info!(count = ids.len(), path = %path.display(), "resume: scanned existing identifiers");
    Ok(ids)
}

/// Per-category page progress, persisted as a JSON sidecar next to the
/// output artifact.
#[derive(Debug)]
pub struct CursorLedger {
    path: PathBuf,
    pages: BTreeMap<String, u32>,
}

impl CursorLedger {
    /// The sidecar path for an output artifact.
    pub fn sidecar_for(output_path: &Path) -> PathBuf {
        let mut name = output_path.as_os_str().to_os_string();
        name.push(".cursor.json");
        PathBuf::from(name)
    }

    /// Loads the ledger, tolerating a missing or unreadable sidecar (a
    /// corrupt ledger only costs re-fetching, never correctness, since
    /// item dedup still applies).
    pub fn load(path: &Path) -> Self {
        let pages = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            pages,
        }
    }

    /// Last fully completed page for a category, if any.
    pub fn last_completed(&self, category: &str) -> Option<u32> {
        self.pages.get(category).copied()
    }

    /// Commits a fully attempted page. Monotone: committing an earlier
    /// page than already recorded is a no-op.
    pub fn commit(&mut self, category: &str, page: u32) -> StorageResult<()> {
        let entry = self.pages.entry(category.to_string()).or_insert(0);
        if page <= *entry {
            return Ok(());
        }
        *entry = page;
        self.persist()
    }

    /// Forgets a category's progress (fresh start).
    pub fn clear(&mut self, category: &str) -> StorageResult<()> {
        if self.pages.remove(category).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StorageError> {
        let rendered = serde_json::to_string_pretty(&self.pages)?;
        std::fs::write(&self.path, rendered)?;
        Ok(())
    }
}
