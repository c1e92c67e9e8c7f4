//! Per-session checkpoints of the conversation state.
//!
//! The turn graph loads a session's last state before a turn and saves it
//! afterwards, so a conversation survives across REPL runs.

use async_trait::async_trait;
use aru_core::state::ConversationState;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),

    #[error("Checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, CheckpointError>;

    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, session_id: &str) -> Result<bool, CheckpointError>;

    /// Stored session ids, sorted.
    async fn list(&self) -> Result<Vec<String>, CheckpointError>;
}

/// Session ids become file names, so only a conservative alphabet is allowed.
fn validate_session(session_id: &str) -> Result<(), CheckpointError> {
    let ok = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !session_id.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(CheckpointError::InvalidSession(session_id.to_string()))
    }
}

/// One JSON file per session: `<dir>/<session>.json`.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, CheckpointError> {
        validate_session(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, CheckpointError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError> {
        let path = self.path_for(&state.session_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(state)?;
        // Atomic replace.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(session = %state.session_id, path = %path.display(), "Checkpoint saved");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, CheckpointError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut sessions = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(session) = name.strip_suffix(".json") {
                sessions.push(session.to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, CheckpointError> {
        Ok(self.states.read().await.get(session_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), CheckpointError> {
        validate_session(&state.session_id)?;
        self.states
            .write()
            .await
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.states.write().await.remove(session_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut sessions: Vec<String> = self.states.read().await.keys().cloned().collect();
        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aru_core::message::Message;

    fn state(session: &str) -> ConversationState {
        ConversationState::new_turn(session, "u", vec![Message::assistant("earlier")], "hello")
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints"));

        assert!(store.load("s1").await.unwrap().is_none());
        store.save(&state("s1")).await.unwrap();
        store.save(&state("s2")).await.unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.user_query, "hello");
        assert_eq!(store.list().await.unwrap(), vec!["s1", "s2"]);

        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["s2"]);
    }

    #[tokio::test]
    async fn rejects_path_like_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(matches!(
            store.load("../escape").await,
            Err(CheckpointError::InvalidSession(_))
        ));
        assert!(store.save(&state("a/b")).await.is_err());
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(matches!(store.load("bad").await, Err(CheckpointError::Corrupted(_))));
    }

    #[tokio::test]
    async fn in_memory_store() {
        let store = InMemoryCheckpointStore::new();
        store.save(&state("b")).await.unwrap();
        store.save(&state("a")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);
        assert!(store.load("a").await.unwrap().is_some());
        assert!(store.delete("a").await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());
    }
}
