//! The agentic tool loop.
//!
//! The model is offered every registered tool. Whenever it answers with tool
//! calls, each call is dispatched through the [`ToolBridge`](aru_tools::ToolBridge),
//! its text result is appended as a tool message, and the model is asked
//! again. The loop ends on the first answer without tool calls, or after
//! `max_iterations` model round-trips.

use crate::context::AgentContext;
use aru_core::error::ProviderError;
use aru_core::message::Message;
use tracing::{debug, info, warn};

/// Answer used when the iteration cap is hit and the model produced no text.
pub const ITERATION_CAP_NOTICE: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
}

#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub answer: String,

    /// Model round-trips made
    pub iterations: usize,

    /// Tool calls dispatched across all iterations
    pub tool_calls: usize,

    /// Full exchange, seed messages included
    pub messages: Vec<Message>,

    pub hit_cap: bool,
}

pub struct ToolLoop {
    ctx: AgentContext,
    max_iterations: usize,
}

impl ToolLoop {
    pub fn new(ctx: AgentContext) -> Self {
        let max_iterations = ctx.settings.max_tool_iterations;
        Self { ctx, max_iterations }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Seed the exchange with an optional system prompt, prior history and
    /// the user's input, then run it.
    pub async fn run(
        &self,
        system: Option<&str>,
        history: &[Message],
        input: &str,
    ) -> Result<ToolLoopOutcome, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.extend(history.iter().cloned());
        messages.push(Message::user(input));
        self.run_messages(messages).await
    }

    /// Run the loop over an already seeded message list.
    ///
    /// A model failure ends the loop with that error; tool failures never
    /// do, they reach the model as `Error: ...` text.
    pub async fn run_messages(&self, mut messages: Vec<Message>) -> Result<ToolLoopOutcome, ProviderError> {
        let definitions = self.ctx.tool_definitions().await;
        let mut state = LoopState::AwaitingModel;
        let mut iterations = 0;
        let mut tool_calls = 0;
        let mut hit_cap = false;
        let mut last_text = String::new();

        while state != LoopState::Done {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.max_iterations {
                        warn!(iterations, "Max tool iterations reached");
                        hit_cap = true;
                        LoopState::Done
                    } else {
                        iterations += 1;
                        debug!(iteration = iterations, "Tool loop iteration");
                        let response = self
                            .ctx
                            .complete_with_tools(messages.clone(), definitions.clone())
                            .await?;
                        last_text = response.message.content.clone();
                        let next = if response.message.has_tool_calls() {
                            LoopState::ExecutingTools
                        } else {
                            LoopState::Done
                        };
                        messages.push(response.message);
                        next
                    }
                }
                LoopState::ExecutingTools => {
                    let calls = messages
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    for call in &calls {
                        debug!(tool = %call.name, id = %call.id, "Dispatching tool call");
                        let result = self.ctx.bridge.execute_call(call).await;
                        messages.push(Message::tool_result(&call.id, result));
                    }
                    tool_calls += calls.len();
                    LoopState::AwaitingModel
                }
                LoopState::Done => LoopState::Done,
            };
        }

        let answer = if hit_cap && last_text.trim().is_empty() {
            ITERATION_CAP_NOTICE.to_string()
        } else {
            last_text
        };
        info!(iterations, tool_calls, hit_cap, "Tool loop finished");

        Ok(ToolLoopOutcome {
            answer,
            iterations,
            tool_calls,
            messages,
            hit_cap,
        })
    }
}
