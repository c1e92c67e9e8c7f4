//! Supervisor: decides which handler runs next, or that the turn is over.

use crate::context::AgentContext;
use crate::prompts::{ROUTING_PREFIX, ROUTING_QUESTION, supervisor_prompt};
use aru_core::event::DomainEvent;
use aru_core::memory::MemoryRecord;
use aru_core::message::Message;
use aru_core::state::{ConversationState, HandlerKind, RoutingDecision};
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// History entry recorded for every routing step.
pub const SUPERVISOR_ID: &str = "supervisor";

pub struct Supervisor {
    ctx: AgentContext,
    allowed: Vec<HandlerKind>,
}

impl Supervisor {
    /// A supervisor that may route to any of `allowed`.
    pub fn new(ctx: AgentContext, allowed: Vec<HandlerKind>) -> Self {
        Self { ctx, allowed }
    }

    pub fn allowed(&self) -> &[HandlerKind] {
        &self.allowed
    }

    async fn recall(&self, query: &str) -> Vec<MemoryRecord> {
        match self
            .ctx
            .memory
            .search(query, None, self.ctx.settings.memory_recall_limit, true)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Memory recall failed, routing without context");
                Vec::new()
            }
        }
    }

    /// Run one routing step.
    ///
    /// Never fails: a model error is recorded on the state and ends the
    /// turn, and output that names no allowed handler is treated as `end`.
    pub async fn route(&self, state: &mut ConversationState) -> RoutingDecision {
        let memories = self.recall(&state.user_query).await;

        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(Message::system(supervisor_prompt(&self.allowed, &memories)));
        messages.extend(state.messages.iter().cloned());
        messages.push(Message::user(ROUTING_QUESTION));

        let decision = match self.ctx.complete(messages).await {
            Ok(response) => {
                let raw = response.message.content;
                RoutingDecision::parse(&raw, &self.allowed).unwrap_or_else(|| {
                    warn!(output = %raw.trim(), "Router returned an unknown handler, ending turn");
                    RoutingDecision::End
                })
            }
            Err(e) => {
                error!(session = %state.session_id, error = %e, "Supervisor model call failed");
                state.record_error(format!("Supervisor error: {e}"));
                self.ctx.events.publish(DomainEvent::ErrorOccurred {
                    context: SUPERVISOR_ID.into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return RoutingDecision::End;
            }
        };

        debug!(memories = memories.len(), "Routing context recalled");
        info!(session = %state.session_id, decision = %decision, "Routed");

        state
            .messages
            .push(Message::assistant(format!("{ROUTING_PREFIX}{decision}")));
        state.handler_history.push(SUPERVISOR_ID.into());
        state.relevant_memories = memories;
        state.routing = Some(decision);

        self.ctx.events.publish(DomainEvent::RouteDecided {
            session_id: state.session_id.clone(),
            decision: decision.id().into(),
            timestamp: Utc::now(),
        });
        decision
    }
}
