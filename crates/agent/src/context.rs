//! The explicit context every turn step is handed.
//!
//! There is no process-global state: the router, the turn processors and
//! the tool loop all receive an [`AgentContext`] holding the model endpoint,
//! the memory manager, the tool bridge and the event bus.

use aru_config::AgentSettings;
use aru_core::error::ProviderError;
use aru_core::event::EventBus;
use aru_core::message::Message;
use aru_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use aru_memory::MemoryManager;
use aru_tools::ToolBridge;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AgentContext {
    pub provider: Arc<dyn Provider>,

    /// Bare model id sent with every request
    pub model: String,

    pub temperature: f32,
    pub memory: MemoryManager,
    pub bridge: ToolBridge,
    pub events: Arc<EventBus>,
    pub settings: AgentSettings,
}

impl AgentContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        memory: MemoryManager,
        bridge: ToolBridge,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            memory,
            bridge,
            events: Arc::new(EventBus::default()),
            settings: AgentSettings::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// One model round-trip without tool declarations.
    pub async fn complete(&self, messages: Vec<Message>) -> Result<ProviderResponse, ProviderError> {
        self.complete_with_tools(messages, Vec::new()).await
    }

    pub async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Calling model"
        );
        let request = ProviderRequest::new(&self.model, messages)
            .with_tools(tools)
            .with_temperature(self.temperature);
        self.provider.complete(request).await
    }

    /// Declarations for every tool currently in the shared registry.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.bridge.registry().read().await.definitions()
    }
}
