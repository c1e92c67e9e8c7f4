//! File-based memory backend: persistent JSON-lines storage.
//!
//! Each line is one JSON-encoded `MemoryRecord`. Records are loaded into
//! memory on creation and the whole file is rewritten on every mutation,
//! under the write lock, via a temp file and rename so readers never see a
//! half-written store. A mutation becomes visible only once its flush has
//! succeeded.
//!
//! Default location: `~/.aru/data/memories.jsonl`

use async_trait::async_trait;
use aru_core::error::MemoryError;
use aru_core::memory::{MemoryBackend, MemoryRecord, MemoryType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct FileBackend {
    path: PathBuf,
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl FileBackend {
    /// Open the store at `path`. A missing file starts empty and is created
    /// on the first write.
    pub fn new(path: PathBuf) -> Self {
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "File memory backend loaded");
        Self {
            path,
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<MemoryRecord> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Vec::new();
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted memory record");
                    None
                }
            })
            .collect()
    }

    /// Rewrite the file from `records`. Callers hold the write lock.
    async fn flush(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize memory record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, &content)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to replace memory file: {e}")))?;
        Ok(())
    }

    /// Apply `change` to a copy of the records, persist it, then publish it.
    async fn commit<T>(&self, change: impl FnOnce(&mut Vec<MemoryRecord>) -> T) -> Result<T, MemoryError> {
        let mut records = self.records.write().await;
        let mut next = records.clone();
        let outcome = change(&mut next);
        self.flush(&next).await?;
        *records = next;
        Ok(outcome)
    }
}

#[async_trait]
impl MemoryBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn add(&self, mut record: MemoryRecord) -> Result<String, MemoryError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        self.commit(|records| match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        })
        .await?;
        Ok(id)
    }

    async fn list(&self, user_id: &str, memory_type: Option<MemoryType>) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| memory_type.is_none_or(|t| r.memory_type == t))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<bool, MemoryError> {
        if !self.records.read().await.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        self.commit(|records| {
            let Some(record) = records.iter_mut().find(|r| r.id == id) else {
                return false;
            };
            record.content = content.to_string();
            if let Some(metadata) = metadata {
                record.metadata.extend(metadata);
            }
            true
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        if !self.records.read().await.iter().any(|r| r.id == id) {
            return Ok(false);
        }
        self.commit(|records| {
            let len_before = records.len();
            records.retain(|r| r.id != id);
            records.len() < len_before
        })
        .await
    }

    async fn count(&self, user_id: &str) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.iter().filter(|r| r.user_id == user_id).count())
    }

    async fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        self.commit(|records| records.retain(|r| r.user_id != user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("memories.jsonl")
    }

    #[tokio::test]
    async fn records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);

        let id = {
            let backend = FileBackend::new(path.clone());
            backend
                .add(MemoryRecord::new("u1", MemoryType::Semantic, "Prefers tea over coffee"))
                .await
                .unwrap()
        };

        let reopened = FileBackend::new(path);
        let record = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(record.content, "Prefers tea over coffee");
        assert_eq!(record.memory_type, MemoryType::Semantic);
        assert!(record.created_at.is_some());
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let good = serde_json::to_string(&MemoryRecord::new("u1", MemoryType::Episodic, "ok")).unwrap();
        std::fs::write(&path, format!("{good}\n{{not json\n\n")).unwrap();

        let backend = FileBackend::new(path);
        assert_eq!(backend.count("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let backend = FileBackend::new(path.clone());
        let id = backend.add(MemoryRecord::new("u1", MemoryType::Semantic, "gone soon")).await.unwrap();
        backend.add(MemoryRecord::new("u1", MemoryType::Semantic, "stays")).await.unwrap();

        assert!(backend.delete(&id).await.unwrap());
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("gone soon"));
        assert!(on_disk.contains("stays"));
    }

    #[tokio::test]
    async fn update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let backend = FileBackend::new(path.clone());
        let id = backend.add(MemoryRecord::new("u1", MemoryType::Semantic, "draft")).await.unwrap();
        backend.update(&id, "final", None).await.unwrap();

        let reopened = FileBackend::new(path);
        assert_eq!(reopened.get(&id).await.unwrap().unwrap().content, "final");
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested").join("m.jsonl"));
        assert_eq!(backend.count("anyone").await.unwrap(), 0);
        backend.add(MemoryRecord::new("u", MemoryType::Episodic, "x")).await.unwrap();
        assert!(backend.path().exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "").unwrap();
        let backend = FileBackend::new(blocker.join("memories.jsonl"));

        let err = backend
            .add(MemoryRecord::new("u1", MemoryType::Semantic, "never stored"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
        assert_eq!(backend.count("u1").await.unwrap(), 0);
        assert!(backend.list("u1", None).await.unwrap().is_empty());
    }
}
