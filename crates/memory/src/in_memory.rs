//! In-memory backend, for tests and ephemeral sessions.

use async_trait::async_trait;
use aru_core::error::MemoryError;
use aru_core::memory::{MemoryBackend, MemoryRecord, MemoryType};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps records in insertion order behind a read-write lock.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str { "in_memory" }

    async fn add(&self, mut record: MemoryRecord) -> Result<String, MemoryError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
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
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.content = content.to_string();
        if let Some(metadata) = metadata {
            record.metadata.extend(metadata);
        }
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut records = self.records.write().await;
        let len_before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < len_before)
    }

    async fn count(&self, user_id: &str) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.iter().filter(|r| r.user_id == user_id).count())
    }

    async fn clear(&self, user_id: &str) -> Result<(), MemoryError> {
        self.records.write().await.retain(|r| r.user_id != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, kind: MemoryType, content: &str) -> MemoryRecord {
        MemoryRecord::new(user, kind, content)
    }

    #[tokio::test]
    async fn add_and_get() {
        let mem = InMemoryBackend::new();
        let id = mem.add(record("u1", MemoryType::Semantic, "Rust is a systems language")).await.unwrap();
        assert!(!id.is_empty());
        let found = mem.get(&id).await.unwrap().unwrap();
        assert_eq!(found.content, "Rust is a systems language");
    }

    #[tokio::test]
    async fn list_is_scoped_by_user_and_type() {
        let mem = InMemoryBackend::new();
        mem.add(record("u1", MemoryType::Semantic, "fact")).await.unwrap();
        mem.add(record("u1", MemoryType::Episodic, "chat")).await.unwrap();
        mem.add(record("u2", MemoryType::Semantic, "other user")).await.unwrap();

        assert_eq!(mem.list("u1", None).await.unwrap().len(), 2);
        let facts = mem.list("u1", Some(MemoryType::Semantic)).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "fact");
    }

    #[tokio::test]
    async fn update_merges_metadata() {
        let mem = InMemoryBackend::new();
        let mut r = record("u1", MemoryType::Semantic, "old");
        r.metadata.insert("category".into(), "idea".into());
        let id = mem.add(r).await.unwrap();

        let mut extra = serde_json::Map::new();
        extra.insert("edited".into(), true.into());
        assert!(mem.update(&id, "new", Some(extra)).await.unwrap());

        let r = mem.get(&id).await.unwrap().unwrap();
        assert_eq!(r.content, "new");
        assert_eq!(r.metadata["category"], "idea");
        assert_eq!(r.metadata["edited"], true);
        assert!(!mem.update("missing", "x", None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let mem = InMemoryBackend::new();
        let id = mem.add(record("u1", MemoryType::Semantic, "a")).await.unwrap();
        mem.add(record("u1", MemoryType::Semantic, "b")).await.unwrap();
        mem.add(record("u2", MemoryType::Semantic, "c")).await.unwrap();

        assert!(mem.delete(&id).await.unwrap());
        assert!(!mem.delete(&id).await.unwrap());
        mem.clear("u1").await.unwrap();
        assert_eq!(mem.count("u1").await.unwrap(), 0);
        assert_eq!(mem.count("u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_records() {
        let mem = InMemoryBackend::new();
        let mut handles = Vec::new();
        for i in 0..20 {
            let mem = mem.clone();
            handles.push(tokio::spawn(async move {
                mem.add(MemoryRecord::new("u1", MemoryType::Episodic, format!("turn {i}"))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(mem.count("u1").await.unwrap(), 20);
    }
}
