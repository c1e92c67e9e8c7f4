//! Per-turn conversation state shared by the router and the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::memory::MemoryRecord;
use crate::message::Message;

/// The specialised handlers a turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    #[serde(rename = "email_agent")]
    Email,
    #[serde(rename = "calendar_agent")]
    Calendar,
    #[serde(rename = "idea_agent")]
    Idea,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 3] = [HandlerKind::Email, HandlerKind::Calendar, HandlerKind::Idea];

    /// Identifier used in routing prompts and handler history.
    pub fn id(&self) -> &'static str {
        match self {
            HandlerKind::Email => "email_agent",
            HandlerKind::Calendar => "calendar_agent",
            HandlerKind::Idea => "idea_agent",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// What the router decided for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingDecision {
    Handler(HandlerKind),
    End,
}

impl RoutingDecision {
    pub const END_ID: &'static str = "end";

    /// Normalise raw model output into a decision.
    ///
    /// Trims whitespace, surrounding quotes and trailing punctuation, and
    /// lower-cases. Returns `None` when the result is not `end` or one of
    /// the `allowed` handlers.
    pub fn parse(raw: &str, allowed: &[HandlerKind]) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace())
            .to_lowercase();
        if cleaned == Self::END_ID {
            return Some(RoutingDecision::End);
        }
        HandlerKind::from_id(&cleaned)
            .filter(|k| allowed.contains(k))
            .map(RoutingDecision::Handler)
    }

    pub fn id(&self) -> &'static str {
        match self {
            RoutingDecision::Handler(kind) => kind.id(),
            RoutingDecision::End => Self::END_ID,
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome recorded by a handler in its result slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    pub status: String,
    pub message: String,
}

impl DomainResult {
    pub const PROCESSED: &'static str = "processed";

    pub fn processed(message: impl Into<String>) -> Self {
        Self {
            status: Self::PROCESSED.into(),
            message: message.into(),
        }
    }
}

/// Mutable record threaded through every step of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub current_task: String,
    pub user_query: String,
    #[serde(default)]
    pub relevant_memories: Vec<MemoryRecord>,

    /// Set by the router, taken by the handler that consumes it.
    #[serde(default)]
    pub routing: Option<RoutingDecision>,

    /// Identifiers of every step run this turn, in order.
    #[serde(default)]
    pub handler_history: Vec<String>,

    #[serde(default)]
    pub email_results: Option<DomainResult>,
    #[serde(default)]
    pub calendar_results: Option<DomainResult>,
    #[serde(default)]
    pub idea_results: Option<DomainResult>,

    #[serde(default)]
    pub errors: Vec<String>,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl ConversationState {
    /// Start a turn: prior history followed by the new user message.
    pub fn new_turn(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        history: Vec<Message>,
        query: impl Into<String>,
    ) -> Self {
        let query = query.into();
        let mut messages = history;
        messages.push(Message::user(query.clone()));
        Self {
            messages,
            current_task: query.clone(),
            user_query: query,
            relevant_memories: Vec::new(),
            routing: None,
            handler_history: Vec::new(),
            email_results: None,
            calendar_results: None,
            idea_results: None,
            errors: Vec::new(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            retry_count: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn result_slot(&self, kind: HandlerKind) -> Option<&DomainResult> {
        match kind {
            HandlerKind::Email => self.email_results.as_ref(),
            HandlerKind::Calendar => self.calendar_results.as_ref(),
            HandlerKind::Idea => self.idea_results.as_ref(),
        }
    }

    pub fn set_result(&mut self, kind: HandlerKind, result: DomainResult) {
        let slot = match kind {
            HandlerKind::Email => &mut self.email_results,
            HandlerKind::Calendar => &mut self.calendar_results,
            HandlerKind::Idea => &mut self.idea_results,
        };
        *slot = Some(result);
    }

    /// Consume the pending routing decision.
    pub fn take_routing(&mut self) -> Option<RoutingDecision> {
        self.routing.take()
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_decisions() {
        let all = HandlerKind::ALL;
        assert_eq!(RoutingDecision::parse("  Calendar_Agent\n", &all), Some(RoutingDecision::Handler(HandlerKind::Calendar)));
        assert_eq!(RoutingDecision::parse("'end'.", &all), Some(RoutingDecision::End));
        assert_eq!(RoutingDecision::parse("email_agent", &all), Some(RoutingDecision::Handler(HandlerKind::Email)));
    }

    #[test]
    fn parse_strips_quotes_backticks_and_periods() {
        let all = HandlerKind::ALL;
        let idea = Some(RoutingDecision::Handler(HandlerKind::Idea));
        assert_eq!(RoutingDecision::parse("\"idea_agent\"", &all), idea);
        assert_eq!(RoutingDecision::parse("`idea_agent`", &all), idea);
        assert_eq!(RoutingDecision::parse("idea_agent.", &all), idea);
        assert_eq!(RoutingDecision::parse(" ' IDEA_AGENT ' ", &all), idea);
        assert_eq!(RoutingDecision::parse("```end```", &all), Some(RoutingDecision::End));
        // Inner punctuation is kept, so this is not a handler id.
        assert_eq!(RoutingDecision::parse("idea.agent", &all), None);
    }

    #[test]
    fn parse_rejects_unknown_and_empty() {
        let all = HandlerKind::ALL;
        assert_eq!(RoutingDecision::parse("weather_agent", &all), None);
        assert_eq!(RoutingDecision::parse("", &all), None);
        assert_eq!(RoutingDecision::parse("I think email_agent", &all), None);
    }

    #[test]
    fn parse_rejects_handlers_not_allowed() {
        assert_eq!(RoutingDecision::parse("idea_agent", &[HandlerKind::Email]), None);
    }

    #[test]
    fn new_turn_appends_user_message() {
        let state = ConversationState::new_turn("s1", "u1", vec![Message::assistant("earlier")], "hello");
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "hello");
        assert_eq!(state.user_query, "hello");
        assert!(state.routing.is_none());
    }

    #[test]
    fn routing_is_taken_once() {
        let mut state = ConversationState::new_turn("s", "u", vec![], "q");
        state.routing = Some(RoutingDecision::Handler(HandlerKind::Idea));
        assert!(state.take_routing().is_some());
        assert!(state.take_routing().is_none());
    }

    #[test]
    fn result_slots_are_per_handler() {
        let mut state = ConversationState::new_turn("s", "u", vec![], "q");
        state.set_result(HandlerKind::Calendar, DomainResult::processed("ok"));
        assert_eq!(state.result_slot(HandlerKind::Calendar).unwrap().status, "processed");
        assert!(state.result_slot(HandlerKind::Email).is_none());
    }
}
