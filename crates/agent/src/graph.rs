//! The turn graph: router → handler → router … → memory update.
//!
//! One [`TurnGraph::run_turn`] call is one user turn. Steps run strictly in
//! sequence; every step records its own failures on the conversation state,
//! so a turn always completes with a report.

use crate::checkpoint::CheckpointStore;
use crate::context::AgentContext;
use crate::processor::{HandlerProfile, TurnProcessor};
use crate::prompts::{DIRECT_REPLY_PROMPT, is_routing_announcement, model_conversation};
use crate::router::Supervisor;
use crate::tool_loop::ToolLoop;
use aru_core::error::ProviderError;
use aru_core::message::{Message, Role};
use aru_core::state::{ConversationState, HandlerKind, RoutingDecision};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The reply to show the user, if any step produced one
    pub answer: Option<String>,
    pub handler_history: Vec<String>,
    pub errors: Vec<String>,
    pub state: ConversationState,
}

impl TurnReport {
    /// Handler path of the turn, e.g. `supervisor → calendar_agent → supervisor`.
    pub fn path(&self) -> String {
        self.handler_history.join(" → ")
    }
}

pub struct TurnGraph {
    ctx: AgentContext,
    supervisor: Supervisor,
    processors: Vec<TurnProcessor>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    use_tools: bool,
}

impl TurnGraph {
    /// A graph with the email, calendar and idea handlers registered.
    pub fn new(ctx: AgentContext) -> Self {
        Self::with_handlers(ctx, &HandlerKind::ALL)
    }

    /// A graph with only `kinds` registered; the router cannot pick others.
    pub fn with_handlers(ctx: AgentContext, kinds: &[HandlerKind]) -> Self {
        let processors = kinds
            .iter()
            .map(|kind| TurnProcessor::new(HandlerProfile::for_kind(*kind), ctx.clone()))
            .collect();
        Self {
            supervisor: Supervisor::new(ctx.clone(), kinds.to_vec()),
            ctx,
            processors,
            checkpoints: None,
            use_tools: false,
        }
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Let handlers and direct replies call registered tools.
    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.use_tools = enabled;
        self.processors = self
            .processors
            .into_iter()
            .map(|p| p.with_tools(enabled))
            .collect();
        self
    }

    /// Handlers the supervisor may route to.
    pub fn handlers(&self) -> &[HandlerKind] {
        self.supervisor.allowed()
    }

    fn processor(&self, kind: HandlerKind) -> Option<&TurnProcessor> {
        self.processors.iter().find(|p| p.kind() == kind)
    }

    async fn load_history(&self, session_id: &str) -> (Vec<Message>, Option<String>) {
        let Some(store) = &self.checkpoints else {
            return (Vec::new(), None);
        };
        match store.load(session_id).await {
            Ok(Some(state)) => {
                debug!(session = %session_id, messages = state.messages.len(), "Resumed from checkpoint");
                (state.messages, None)
            }
            Ok(None) => (Vec::new(), None),
            Err(e) => {
                warn!(session = %session_id, error = %e, "Failed to load checkpoint");
                (Vec::new(), Some(format!("Checkpoint load failed: {e}")))
            }
        }
    }

    /// Reply to a turn the router ended before any handler answered.
    async fn direct_reply(&self, state: &ConversationState) -> Result<String, ProviderError> {
        let messages = model_conversation(DIRECT_REPLY_PROMPT, &state.messages, &state.user_query);
        if self.use_tools {
            let outcome = ToolLoop::new(self.ctx.clone()).run_messages(messages).await?;
            return Ok(outcome.answer);
        }
        Ok(self.ctx.complete(messages).await?.message.content)
    }

    /// Store the turn's exchange as an episodic memory.
    async fn update_memory(&self, state: &mut ConversationState, turn_start: usize) {
        let exchange: Vec<Message> = state.messages[turn_start..]
            .iter()
            .filter(|m| !is_routing_announcement(m))
            .cloned()
            .collect();
        let mut metadata = Map::new();
        metadata.insert("task".into(), Value::String(state.current_task.clone()));
        metadata.insert("agents_used".into(), json!(state.handler_history));

        if let Err(e) = self.ctx.memory.add_interaction(&exchange, metadata).await {
            warn!(session = %state.session_id, error = %e, "Memory update failed");
            state.record_error(format!("Memory update failed: {e}"));
        }
    }

    /// Run one user turn for `session_id`.
    pub async fn run_turn(&self, session_id: &str, input: &str) -> TurnReport {
        let (history, load_error) = self.load_history(session_id).await;
        let turn_start = history.len();
        let mut state = ConversationState::new_turn(session_id, self.ctx.memory.user_id(), history, input);
        if let Some(e) = load_error {
            state.record_error(e);
        }
        info!(session = %session_id, "Turn started");

        let mut steps = 0;
        loop {
            if steps >= self.ctx.settings.max_routing_steps {
                warn!(session = %session_id, steps, "Routing step limit reached");
                break;
            }
            steps += 1;

            match self.supervisor.route(&mut state).await {
                RoutingDecision::End => break,
                RoutingDecision::Handler(kind) => match self.processor(kind) {
                    Some(processor) => processor.process(&mut state).await,
                    None => {
                        // Unreachable while the supervisor only allows registered handlers.
                        state.take_routing();
                        break;
                    }
                },
            }
        }

        let answered = state.messages[turn_start..]
            .iter()
            .any(|m| m.role == Role::Assistant && !is_routing_announcement(m));
        if !answered && state.routing == Some(RoutingDecision::End) {
            match self.direct_reply(&state).await {
                Ok(reply) => state.messages.push(Message::assistant(reply)),
                Err(e) => {
                    error!(session = %session_id, error = %e, "Direct reply failed");
                    state.record_error(format!("Reply error: {e}"));
                }
            }
        }
        state.take_routing();

        self.update_memory(&mut state, turn_start).await;

        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.save(&state).await {
                warn!(session = %session_id, error = %e, "Failed to save checkpoint");
                state.record_error(format!("Checkpoint save failed: {e}"));
            }
        }

        let answer = state.messages[turn_start..]
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !is_routing_announcement(m))
            .map(|m| m.content.clone());
        info!(
            session = %session_id,
            path = %state.handler_history.join(" → "),
            errors = state.errors.len(),
            "Turn finished"
        );

        TurnReport {
            answer,
            handler_history: state.handler_history.clone(),
            errors: state.errors.clone(),
            state,
        }
    }
}
