//! Memory records and the backend trait that persists them.
//!
//! Records are free text tagged as episodic (interactions), semantic
//! (facts and preferences) or procedural (how-to steps), and are always
//! owned by a user. Ranking and decay are computed at read time by
//! `aru-memory`; backends only store and filter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// The kind of a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(MemoryError::InvalidData(format!("unknown memory type '{other}'"))),
        }
    }
}

/// A single memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub user_id: String,

    /// Records imported without a timestamp are never decayed.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Relevance computed by a search; not persisted.
    #[serde(skip)]
    pub score: f32,
}

impl MemoryRecord {
    /// A new record stamped with the current time. The id is assigned by
    /// the backend on insert.
    pub fn new(user_id: impl Into<String>, memory_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            memory_type,
            user_id: user_id.into(),
            created_at: Some(Utc::now()),
            metadata: serde_json::Map::new(),
            score: 0.0,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Age in fractional days relative to `now`, or `None` without a timestamp.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.created_at
            .map(|created| (now - created).num_seconds().max(0) as f64 / 86_400.0)
    }
}

/// Storage for memory records, keyed by user.
///
/// Implementations must tolerate concurrent readers and writers for the
/// same user; writes to one record are last-write-wins.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "none").
    fn name(&self) -> &str;

    /// Insert a record and return its id.
    async fn add(&self, record: MemoryRecord) -> std::result::Result<String, MemoryError>;

    /// Every record owned by `user_id`, optionally restricted to one type.
    async fn list(
        &self,
        user_id: &str,
        memory_type: Option<MemoryType>,
    ) -> std::result::Result<Vec<MemoryRecord>, MemoryError>;

    async fn get(&self, id: &str) -> std::result::Result<Option<MemoryRecord>, MemoryError>;

    /// Replace the content (and merge metadata) of an existing record.
    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> std::result::Result<bool, MemoryError>;

    async fn delete(&self, id: &str) -> std::result::Result<bool, MemoryError>;

    async fn count(&self, user_id: &str) -> std::result::Result<usize, MemoryError>;

    async fn clear(&self, user_id: &str) -> std::result::Result<(), MemoryError>;
}
