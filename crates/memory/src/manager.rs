//! Typed memory operations for a single user.
//!
//! `MemoryManager` is what the router and handlers talk to. It writes
//! episodic, semantic and procedural records, and answers searches by
//! ranking a user's records with [`keyword_score`], keeping the best
//! `limit * 2` candidates, then applying the configured [`DecayPolicy`]
//! before the final sort and truncation.

use crate::decay::DecayPolicy;
use crate::relevance::keyword_score;
use aru_core::error::MemoryError;
use aru_core::event::{DomainEvent, EventBus};
use aru_core::memory::{MemoryBackend, MemoryRecord, MemoryType};
use aru_core::message::{Message, Role};
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rough size of one token in characters.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Clone)]
pub struct MemoryManager {
    backend: Arc<dyn MemoryBackend>,
    user_id: String,
    decay: DecayPolicy,
    events: Option<Arc<EventBus>>,
}

impl MemoryManager {
    pub fn new(backend: Arc<dyn MemoryBackend>, user_id: impl Into<String>, decay: DecayPolicy) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
            decay,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn decay_policy(&self) -> DecayPolicy {
        self.decay
    }

    fn publish(&self, operation: &str, count: usize) {
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::MemoryAccessed {
                operation: operation.into(),
                count,
                timestamp: Utc::now(),
            });
        }
    }

    async fn insert(&self, memory_type: MemoryType, content: String, metadata: Map<String, Value>) -> Result<String, MemoryError> {
        let record = MemoryRecord::new(&self.user_id, memory_type, content).with_metadata(metadata);
        let id = self.backend.add(record).await?;
        debug!(id = %id, kind = %memory_type, "Added memory");
        self.publish("add", 1);
        Ok(id)
    }

    /// Store a conversation exchange as an episodic memory.
    ///
    /// Only user and assistant messages are kept, one `role: text` line each.
    pub async fn add_interaction(&self, messages: &[Message], metadata: Map<String, Value>) -> Result<String, MemoryError> {
        let content = messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        if content.is_empty() {
            return Err(MemoryError::InvalidData("interaction has no user or assistant messages".into()));
        }
        self.insert(MemoryType::Episodic, content, metadata).await
    }

    /// Store a piece of knowledge under `category`.
    pub async fn add_fact(&self, fact: &str, category: &str, mut metadata: Map<String, Value>) -> Result<String, MemoryError> {
        metadata.insert("category".into(), Value::String(category.to_string()));
        self.insert(MemoryType::Semantic, fact.to_string(), metadata).await
    }

    /// Store how-to knowledge as a numbered list of steps.
    pub async fn add_procedure(&self, task: &str, steps: &[String], mut metadata: Map<String, Value>) -> Result<String, MemoryError> {
        let numbered = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        metadata.insert("task".into(), Value::String(task.to_string()));
        self.insert(MemoryType::Procedural, format!("Task: {task}\nSteps:\n{numbered}"), metadata)
            .await
    }

    /// Ranked records relevant to `query`, best first.
    pub async fn search(
        &self,
        query: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
        apply_decay: bool,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let mut candidates: Vec<MemoryRecord> = self
            .backend
            .list(&self.user_id, memory_type)
            .await?
            .into_iter()
            .filter_map(|mut r| {
                r.score = keyword_score(query, &r.content);
                (r.score > 0.0).then_some(r)
            })
            .collect();
        sort_by_score(&mut candidates);
        candidates.truncate(limit.saturating_mul(2));

        let mut results = if apply_decay {
            self.decay.apply(candidates, Utc::now())
        } else {
            candidates
        };
        sort_by_score(&mut results);
        results.truncate(limit);

        debug!(query = %query, found = results.len(), "Memory search");
        self.publish("search", results.len());
        Ok(results)
    }

    pub async fn get_all(&self, memory_type: Option<MemoryType>) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.backend.list(&self.user_id, memory_type).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        self.backend.get(id).await
    }

    pub async fn update(&self, id: &str, content: &str, metadata: Option<Map<String, Value>>) -> Result<bool, MemoryError> {
        self.backend.update(id, content, metadata).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let deleted = self.backend.delete(id).await?;
        if deleted {
            self.publish("delete", 1);
        }
        Ok(deleted)
    }

    pub async fn count(&self) -> Result<usize, MemoryError> {
        self.backend.count(&self.user_id).await
    }

    /// Relevant memories joined by blank lines, within a token budget.
    pub async fn context_for_query(&self, query: &str, max_tokens: usize) -> Result<String, MemoryError> {
        let memories = self.search(query, None, 10, true).await?;
        let mut parts = Vec::new();
        let mut used = 0;
        for memory in &memories {
            let tokens = memory.content.len() / CHARS_PER_TOKEN;
            if used + tokens > max_tokens {
                break;
            }
            parts.push(memory.content.as_str());
            used += tokens;
        }
        Ok(parts.join("\n\n"))
    }

    /// Write every record of this user to `path` as a JSON array.
    pub async fn export_json(&self, path: &Path) -> Result<usize, MemoryError> {
        let records = self.get_all(None).await?;
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize export: {e}")))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MemoryError::Storage(format!("Failed to create export directory: {e}")))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to write {}: {e}", path.display())))?;
        info!("Exported {} memories to {}", records.len(), path.display());
        Ok(records.len())
    }

    /// Load records from a JSON array written by [`export_json`](Self::export_json).
    ///
    /// Imported records get fresh ids and are re-owned by this user; their
    /// timestamps (or lack of one) are kept.
    pub async fn import_json(&self, path: &Path) -> Result<usize, MemoryError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let records: Vec<MemoryRecord> = serde_json::from_str(&json)
            .map_err(|e| MemoryError::InvalidData(format!("{}: {e}", path.display())))?;
        let count = records.len();
        for mut record in records {
            record.id = String::new();
            record.user_id = self.user_id.clone();
            self.backend.add(record).await?;
        }
        info!("Imported {count} memories from {}", path.display());
        self.publish("import", count);
        Ok(count)
    }
}

fn sort_by_score(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}
