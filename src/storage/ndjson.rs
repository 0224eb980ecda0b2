//! One-record-per-line artifact writer

use crate::extract::Article;
use crate::storage::{ArticleStore, StorageResult};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// NDJSON output: each append is a single `write + newline` to a file
/// opened in append mode, so an interrupted run loses at most the record
/// being written.
pub struct NdjsonStore {
    path: PathBuf,
    ids: HashSet<String>,
}

impl NdjsonStore {
    /// Opens the artifact, loading the identifiers of any existing records
    /// so `exists` covers prior runs. Unparseable lines are skipped; a
    /// torn trailing line from a killed run must not poison the artifact.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut ids = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(std::fs::File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(record) => {
                        if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
                            ids.insert(id.to_string());
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping unparseable artifact line"),
                }
            }
            tracing::info!(count = ids.len(), path = %path.display(), "loaded existing article ids");
        }
        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }
}

impl ArticleStore for NdjsonStore {
    fn exists(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn append(&mut self, article: &Article) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(article)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        self.ids.insert(article.id.clone());
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
