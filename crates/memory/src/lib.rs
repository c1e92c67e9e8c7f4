//! Memory store implementations for Aru.
//!
//! Backends persist [`MemoryRecord`](aru_core::MemoryRecord)s; the
//! [`MemoryManager`] layers typed writes, keyword ranking and time decay on
//! top of whichever backend is configured.

pub mod noop;
pub mod in_memory;
pub mod file_backend;
pub mod relevance;
pub mod decay;
pub mod manager;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use noop::NoopMemory;
pub use in_memory::InMemoryBackend;
pub use file_backend::FileBackend;
pub use decay::DecayPolicy;
pub use manager::MemoryManager;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use aru_core::error::MemoryError;
use aru_core::memory::MemoryBackend;
use std::path::Path;
use std::sync::Arc;

/// Open the backend named by `kind` ("file", "sqlite", "in_memory", "none").
pub async fn open_backend(kind: &str, path: &Path) -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    match kind {
        "file" => Ok(Arc::new(FileBackend::new(path.to_path_buf()))),
        "in_memory" => Ok(Arc::new(InMemoryBackend::new())),
        "none" => Ok(Arc::new(NoopMemory)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MemoryError::Storage(format!("Failed to create memory directory: {e}"))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(SqliteBackend::new(&url).await?))
        }
        other => Err(MemoryError::Storage(format!("Unsupported memory backend '{other}'"))),
    }
}
