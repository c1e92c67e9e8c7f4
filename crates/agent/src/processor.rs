//! Turn processors: the email, calendar and idea handlers.
//!
//! All three share one shape. A [`HandlerProfile`] says what to recall from
//! memory and how to phrase the prompt; [`TurnProcessor`] runs it against
//! the conversation state.

use crate::context::AgentContext;
use crate::prompts::model_conversation;
use crate::tool_loop::ToolLoop;
use aru_core::error::ProviderError;
use aru_core::event::DomainEvent;
use aru_core::memory::{MemoryRecord, MemoryType};
use aru_core::message::Message;
use aru_core::state::{ConversationState, DomainResult, HandlerKind};
use chrono::Utc;
use serde_json::{Map, json};
use tracing::{debug, error, info, warn};

/// Where a handler's memory query comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryQuery {
    Fixed(&'static str),
    /// The user's own words
    UserQuery,
}

#[derive(Debug, Clone)]
pub struct HandlerProfile {
    pub kind: HandlerKind,

    /// Capitalised display name used in error messages ("Email")
    pub name: &'static str,

    /// Task description in the prompt ("idea management")
    pub task: &'static str,

    pub memory_query: MemoryQuery,
    pub memory_type: MemoryType,
    pub memory_limit: usize,
    pub memory_heading: &'static str,
    pub empty_memories: &'static str,

    /// Prefix each recalled memory with `- `
    pub bulleted: bool,

    pub capabilities: &'static [&'static str],

    /// Store the request as an idea when it asks to capture or save one
    pub captures_ideas: bool,
}

impl HandlerProfile {
    pub fn email() -> Self {
        Self {
            kind: HandlerKind::Email,
            name: "Email",
            task: "email",
            memory_query: MemoryQuery::Fixed("email preferences writing style"),
            memory_type: MemoryType::Semantic,
            memory_limit: 3,
            memory_heading: "User Preferences:",
            empty_memories: "No specific preferences stored yet.",
            bulleted: false,
            capabilities: &[
                "Read and categorize emails",
                "Draft replies in the user's style",
                "Send emails",
                "Organize inbox",
            ],
            captures_ideas: false,
        }
    }

    pub fn calendar() -> Self {
        Self {
            kind: HandlerKind::Calendar,
            name: "Calendar",
            task: "calendar",
            memory_query: MemoryQuery::Fixed("calendar meeting preferences"),
            memory_type: MemoryType::Semantic,
            memory_limit: 3,
            memory_heading: "User Preferences:",
            empty_memories: "No specific preferences stored yet.",
            bulleted: false,
            capabilities: &[
                "Schedule meetings",
                "Check availability",
                "Manage events",
                "Set reminders",
            ],
            captures_ideas: false,
        }
    }

    pub fn idea() -> Self {
        Self {
            kind: HandlerKind::Idea,
            name: "Idea",
            task: "idea management",
            memory_query: MemoryQuery::UserQuery,
            memory_type: MemoryType::Semantic,
            memory_limit: 5,
            memory_heading: "Related Ideas:",
            empty_memories: "No related ideas found.",
            bulleted: true,
            capabilities: &[
                "Capture new ideas and notes",
                "Organize thoughts by category",
                "Link related concepts",
                "Retrieve past ideas",
            ],
            captures_ideas: true,
        }
    }

    pub fn for_kind(kind: HandlerKind) -> Self {
        match kind {
            HandlerKind::Email => Self::email(),
            HandlerKind::Calendar => Self::calendar(),
            HandlerKind::Idea => Self::idea(),
        }
    }

    fn query_for<'a>(&self, user_query: &'a str) -> &'a str {
        match self.memory_query {
            MemoryQuery::Fixed(q) => q,
            MemoryQuery::UserQuery => user_query,
        }
    }

    /// Whether `query` asks for an idea to be stored.
    pub fn wants_capture(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        self.captures_ideas && (lower.contains("capture") || lower.contains("save"))
    }

    /// The handler prompt with recalled memory contents inserted verbatim.
    pub fn render_prompt(&self, query: &str, memories: &[MemoryRecord]) -> String {
        let memory_block = if memories.is_empty() {
            self.empty_memories.to_string()
        } else {
            memories
                .iter()
                .map(|m| {
                    if self.bulleted {
                        format!("- {}", m.content)
                    } else {
                        m.content.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let capabilities = self
            .capabilities
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are Aru's {task} specialist.\n\n\
             {heading}\n{memory_block}\n\n\
             Your capabilities:\n{capabilities}\n\n\
             Current request: {query}\n\n\
             Provide a helpful response about the {task} task.",
            task = self.task,
            heading = self.memory_heading,
        )
    }
}

pub struct TurnProcessor {
    profile: HandlerProfile,
    ctx: AgentContext,
    use_tools: bool,
}

impl TurnProcessor {
    pub fn new(profile: HandlerProfile, ctx: AgentContext) -> Self {
        Self {
            profile,
            ctx,
            use_tools: false,
        }
    }

    /// Let the handler call registered tools through the tool loop.
    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.use_tools = enabled;
        self
    }

    pub fn kind(&self) -> HandlerKind {
        self.profile.kind
    }

    pub fn profile(&self) -> &HandlerProfile {
        &self.profile
    }

    async fn recall(&self, user_query: &str) -> Vec<MemoryRecord> {
        let query = self.profile.query_for(user_query);
        match self
            .ctx
            .memory
            .search(query, Some(self.profile.memory_type), self.profile.memory_limit, true)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(handler = %self.profile.kind, error = %e, "Memory recall failed");
                Vec::new()
            }
        }
    }

    async fn respond(&self, prompt: String, state: &ConversationState) -> Result<String, ProviderError> {
        let messages = model_conversation(prompt, &state.messages, &state.user_query);
        if self.use_tools {
            let outcome = ToolLoop::new(self.ctx.clone()).run_messages(messages).await?;
            return Ok(outcome.answer);
        }
        let response = self.ctx.complete(messages).await?;
        Ok(response.message.content)
    }

    async fn capture_idea(&self, query: &str) {
        let mut metadata = Map::new();
        metadata.insert("type".into(), json!("user_idea"));
        match self.ctx.memory.add_fact(query, "idea", metadata).await {
            Ok(id) => debug!(id = %id, "Captured idea"),
            Err(e) => warn!(error = %e, "Failed to store idea"),
        }
    }

    /// Handle the current request and record the outcome on `state`.
    ///
    /// On failure only an error entry is added; the pending routing decision
    /// is cleared either way.
    pub async fn process(&self, state: &mut ConversationState) {
        let kind = self.profile.kind;
        let query = state.user_query.clone();
        let memories = self.recall(&query).await;
        let prompt = self.profile.render_prompt(&query, &memories);

        let success = match self.respond(prompt, state).await {
            Ok(answer) => {
                if self.profile.wants_capture(&query) {
                    self.capture_idea(&query).await;
                }
                info!(session = %state.session_id, handler = %kind, "Handler completed");
                state.set_result(kind, DomainResult::processed(answer.clone()));
                state.messages.push(Message::assistant(answer));
                state.handler_history.push(kind.id().into());
                true
            }
            Err(e) => {
                error!(session = %state.session_id, handler = %kind, error = %e, "Handler failed");
                state.record_error(format!("{} agent error: {e}", self.profile.name));
                false
            }
        };

        state.take_routing();
        self.ctx.events.publish(DomainEvent::HandlerCompleted {
            session_id: state.session_id.clone(),
            handler: kind.id().into(),
            success,
            timestamp: Utc::now(),
        });
    }
}
