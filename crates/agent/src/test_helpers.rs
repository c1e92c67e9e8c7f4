//! Shared test helpers: a scripted provider and a ready-made context.

use crate::context::AgentContext;
use aru_core::error::ProviderError;
use aru_core::message::{Message, MessageToolCall};
use aru_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use aru_core::tool::ToolRegistry;
use aru_memory::{DecayPolicy, InMemoryBackend, MemoryManager};
use aru_tools::ToolBridge;
use std::sync::{Arc, Mutex};

/// A provider that replays scripted responses in order and records every
/// request it receives.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain-text responses, one per call.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        let responses = self.responses.lock().unwrap();
        match responses.get(call) {
            Some(response) => response.clone(),
            None => panic!(
                "SequentialMockProvider: no more responses (call #{call}, have {})",
                responses.len()
            ),
        }
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls("", tool_calls),
        usage: None,
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn in_memory_manager() -> MemoryManager {
    MemoryManager::new(Arc::new(InMemoryBackend::new()), "test_user", DecayPolicy::default())
}

/// A context around `provider` with in-memory storage and `registry`.
pub fn test_context(provider: Arc<SequentialMockProvider>, registry: ToolRegistry) -> AgentContext {
    let bridge = ToolBridge::new(registry.into_shared());
    AgentContext::new(provider, "mock-model", in_memory_manager(), bridge)
}
