//! Prompt text for the supervisor and for direct replies.

use aru_core::memory::MemoryRecord;
use aru_core::message::{Message, Role};
use aru_core::state::HandlerKind;

/// Final instruction appended after the conversation history.
pub const ROUTING_QUESTION: &str = "Based on the conversation, which agent should handle this? Or should we end?";

/// Prefix of the assistant message the router leaves in the history.
pub const ROUTING_PREFIX: &str = "Routing to: ";

/// System prompt for turns the router ends without involving a handler.
pub const DIRECT_REPLY_PROMPT: &str = "You are Aru, a helpful personal assistant. \
You can help with emails, calendar and scheduling, and capturing ideas. \
Answer the user's last message directly and concisely.";

/// Whether `message` is the router's announcement rather than a reply.
pub fn is_routing_announcement(message: &Message) -> bool {
    message.role == Role::Assistant && message.content.starts_with(ROUTING_PREFIX)
}

/// A model request: `system`, then the history without routing
/// announcements. The request always ends on a user turn; when the history
/// does not, `user_query` is repeated.
pub fn model_conversation(system: impl Into<String>, history: &[Message], user_query: &str) -> Vec<Message> {
    let mut messages = vec![Message::system(system)];
    messages.extend(history.iter().filter(|m| !is_routing_announcement(m)).cloned());
    if messages.last().is_some_and(|m| m.role != Role::User) {
        messages.push(Message::user(user_query));
    }
    messages
}

fn agent_summary(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Email => "Handles reading, categorizing, drafting, and sending emails",
        HandlerKind::Calendar => "Manages calendar, schedules meetings, checks availability",
        HandlerKind::Idea => "Captures ideas, notes, organizes thoughts",
    }
}

fn decision_rule(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Email => "If the query is about emails (read, draft, send, organize)",
        HandlerKind::Calendar => "If about calendar/scheduling/meetings",
        HandlerKind::Idea => "If about saving ideas, notes, brainstorming",
    }
}

/// The supervisor's system prompt, listing only the handlers it may pick.
///
/// Recalled memories, when there are any, are appended as a
/// `Relevant past context:` block.
pub fn supervisor_prompt(allowed: &[HandlerKind], memories: &[MemoryRecord]) -> String {
    let mut prompt = String::from(
        "You are Aru's supervisor agent. Your role is to:\n\
         1. Analyze user requests and determine which specialized agent should handle them\n\
         2. Consider relevant memories and user preferences\n\
         3. Coordinate between multiple agents if needed\n\
         4. Decide when the task is complete\n\nAvailable Agents:\n",
    );
    for kind in allowed {
        prompt.push_str(&format!("- {}: {}\n", kind.id(), agent_summary(*kind)));
    }

    prompt.push_str("\nDecision Rules:\n");
    for kind in allowed {
        prompt.push_str(&format!("- {} → {}\n", decision_rule(*kind), kind.id()));
    }
    prompt.push_str(
        "- If task is complete or query is general chat → end\n\n\
         Consider user's past preferences from memory when making decisions.\n\n\
         Respond with ONLY the agent name or 'end', nothing else.",
    );

    if !memories.is_empty() {
        prompt.push_str("\n\nRelevant past context:\n");
        let bullets: Vec<String> = memories.iter().map(|m| format!("- {}", m.content)).collect();
        prompt.push_str(&bullets.join("\n"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use aru_core::memory::MemoryType;

    #[test]
    fn conversation_drops_announcements_and_ends_on_user() {
        let history = vec![
            Message::user("Plan my week"),
            Message::assistant("Routing to: calendar_agent"),
        ];
        let messages = model_conversation("system", &history, "Plan my week");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn trailing_reply_repeats_the_request() {
        let history = vec![
            Message::user("Email Sam and book a call"),
            Message::assistant("Routing to: email_agent"),
            Message::assistant("Drafted."),
            Message::assistant("Routing to: calendar_agent"),
        ];
        let messages = model_conversation("system", &history, "Email Sam and book a call");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[3].content, "Email Sam and book a call");
    }

    #[test]
    fn lists_only_allowed_handlers() {
        let prompt = supervisor_prompt(&[HandlerKind::Email, HandlerKind::Idea], &[]);
        assert!(prompt.contains("- email_agent:"));
        assert!(prompt.contains("- idea_agent:"));
        assert!(!prompt.contains("calendar_agent"));
        assert!(prompt.contains("Respond with ONLY the agent name or 'end', nothing else."));
        assert!(!prompt.contains("Relevant past context"));
    }

    #[test]
    fn memories_are_bulleted() {
        let memories = vec![
            MemoryRecord::new("u", MemoryType::Semantic, "Prefers morning meetings"),
            MemoryRecord::new("u", MemoryType::Episodic, "Asked about the offsite"),
        ];
        let prompt = supervisor_prompt(&HandlerKind::ALL, &memories);
        assert!(prompt.ends_with(
            "Relevant past context:\n- Prefers morning meetings\n- Asked about the offsite"
        ));
    }
}
