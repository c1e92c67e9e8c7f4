//! No-op memory backend: disables long-term memory entirely.

use async_trait::async_trait;
use aru_core::error::MemoryError;
use aru_core::memory::{MemoryBackend, MemoryRecord, MemoryType};

/// Stores nothing and finds nothing.
pub struct NoopMemory;

#[async_trait]
impl MemoryBackend for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn add(&self, _record: MemoryRecord) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn list(&self, _user_id: &str, _memory_type: Option<MemoryType>) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn get(&self, _id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        Ok(None)
    }

    async fn update(
        &self,
        _id: &str,
        _content: &str,
        _metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<bool, MemoryError> {
        Ok(false)
    }

    async fn delete(&self, _id: &str) -> Result<bool, MemoryError> {
        Ok(false)
    }

    async fn count(&self, _user_id: &str) -> Result<usize, MemoryError> {
        Ok(0)
    }

    async fn clear(&self, _user_id: &str) -> Result<(), MemoryError> {
        Ok(())
    }
}
