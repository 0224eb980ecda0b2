//! Single-JSON-array artifact writer

use crate::extract::Article;
use crate::storage::{ArticleStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// JSON-array output: the whole array is held in memory and rewritten on
/// each append. Suited to smaller runs where a single well-formed file
/// matters more than write amplification; NDJSON is the default.
pub struct JsonArrayStore {
    path: PathBuf,
    records: Vec<serde_json::Value>,
    ids: HashSet<String>,
}

impl JsonArrayStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut records = Vec::new();
        let mut ids = HashSet::new();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if !content.trim().is_empty() {
                let parsed: serde_json::Value = serde_json::from_str(&content)?;
                let serde_json::Value::Array(existing) = parsed else {
                    return Err(StorageError::NotAnArray(path.display().to_string()));
                };
                for record in existing {
                    if let Some(id) = record.get("id").and_then(|v| v.as_str()) {
                        ids.insert(id.to_string());
                    }
                    records.push(record);
                }
                tracing::info!(count = records.len(), path = %path.display(), "loaded existing articles");
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            records,
            ids,
        })
    }
}

impl ArticleStore for JsonArrayStore {
    fn exists(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn append(&mut self, article: &Article) -> StorageResult<()> {
        self.records.push(serde_json::to_value(article)?);
        let rendered = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, rendered)?;
        self.ids.insert(article.id.clone());
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sample_article;
    use tempfile::tempdir;

    #[test]
    fn append_produces_valid_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut store = JsonArrayStore::open(&path).unwrap();
        store
            .append(&sample_article("https://example.com/a"))
            .unwrap();
        store
            .append(&sample_article("https://example.com/b"))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn reopen_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let first = sample_article("https://example.com/a");

        {
            let mut store = JsonArrayStore::open(&path).unwrap();
            store.append(&first).unwrap();
        }

        let mut store = JsonArrayStore::open(&path).unwrap();
        assert!(store.exists(&first.id));
        store
            .append(&sample_article("https://example.com/b"))
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_non_array_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(matches!(
            JsonArrayStore::open(&path),
            Err(StorageError::NotAnArray(_))
        ));
    }
}
