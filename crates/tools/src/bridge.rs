//! The tool-invocation bridge.
//!
//! [`ToolBridge::execute`] is the single entry point the model loop uses to
//! run a tool. It always returns text: results are flattened by
//! [`normalize_output`], and every failure (unknown tool, bad arguments,
//! executor or transport error, tool-reported failure) becomes a string
//! starting with [`ERROR_MARKER`].

use aru_core::error::ToolError;
use aru_core::event::{DomainEvent, EventBus};
use aru_core::message::MessageToolCall;
use aru_core::tool::{Capability, SharedToolRegistry, ToolContent, ToolOutput, ToolTransport};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Prefix of every failed tool result.
pub const ERROR_MARKER: &str = "Error:";

const EMPTY_OUTPUT: &str = "(no output)";

/// Flatten a tool result into one string.
///
/// Text segments are joined with newlines. Images are summarised by mime
/// type, resources contribute their text or their uri, and unrecognised
/// segments are dropped.
pub fn normalize_output(output: &ToolOutput) -> String {
    let parts: Vec<String> = output
        .content
        .iter()
        .filter_map(|segment| match segment {
            ToolContent::Text { text } => Some(text.clone()),
            ToolContent::Image { mime_type, .. } => Some(format!("[image: {mime_type}]")),
            ToolContent::Resource { text: Some(text), .. } => Some(text.clone()),
            ToolContent::Resource { uri, .. } => Some(format!("[resource: {uri}]")),
            ToolContent::Unknown => None,
        })
        .collect();

    if parts.is_empty() {
        EMPTY_OUTPUT.to_string()
    } else {
        parts.join("\n")
    }
}

fn error_text(message: impl std::fmt::Display) -> String {
    format!("{ERROR_MARKER} {message}")
}

#[derive(Clone)]
pub struct ToolBridge {
    registry: SharedToolRegistry,
    transport: Option<Arc<dyn ToolTransport>>,
    events: Option<Arc<EventBus>>,
}

impl ToolBridge {
    pub fn new(registry: SharedToolRegistry) -> Self {
        Self {
            registry,
            transport: None,
            events: None,
        }
    }

    /// Route remote capabilities through `transport`.
    pub fn with_transport(mut self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &SharedToolRegistry {
        &self.registry
    }

    /// Run `name` with `arguments` and return its text result.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> String {
        let started = Instant::now();
        let outcome = self.dispatch(name, arguments).await;
        let elapsed = started.elapsed();

        let (success, text) = match outcome {
            Ok(output) if output.success => (true, normalize_output(&output)),
            Ok(output) => (false, error_text(normalize_output(&output))),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool invocation failed");
                (false, error_text(e))
            }
        };

        debug!(tool = %name, success, elapsed_ms = elapsed.as_millis() as u64, "Tool executed");
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: name.to_string(),
                success,
                duration_ms: elapsed.as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
        text
    }

    /// Run a model-issued tool call, decoding its JSON argument string first.
    pub async fn execute_call(&self, call: &MessageToolCall) -> String {
        match call.parsed_arguments() {
            Ok(arguments) => self.execute(&call.name, arguments).await,
            Err(e) => error_text(ToolError::InvalidArguments(e.to_string())),
        }
    }

    async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        // Clone the capability so the registry lock is not held across the call.
        let capability = {
            let registry = self.registry.read().await;
            registry
                .get(name)
                .map(|d| d.capability.clone())
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?
        };

        match capability {
            Capability::Builtin(tool) => tool.execute(arguments).await,
            Capability::Remote { server, tool } => {
                let transport = self.transport.as_ref().ok_or_else(|| ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: "no tool transport configured".into(),
                })?;
                Ok(transport.call_tool(&server, &tool, arguments).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aru_core::error::TransportError;
    use aru_core::tool::{RemoteTool, ServerSpec, Tool, ToolRegistry};
    use serde_json::json;
    use std::path::PathBuf;
    use tokio::sync::Mutex;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str { "explode" }
        fn description(&self) -> &str { "Always fails" }
        fn parameters_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "explode".into(),
                reason: "boom".into(),
            })
        }
    }

    /// Transport that records calls and answers with canned content.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, String)>>,
        connected: bool,
    }

    #[async_trait]
    impl ToolTransport for RecordingTransport {
        async fn connect(&self, _spec: &ServerSpec) -> Result<bool, TransportError> {
            Ok(true)
        }
        async fn list_tools(&self, _server: &str) -> Result<Vec<RemoteTool>, TransportError> {
            Ok(vec![])
        }
        async fn call_tool(&self, server: &str, tool: &str, _args: serde_json::Value) -> Result<ToolOutput, TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected(server.to_string()));
            }
            self.calls.lock().await.push((server.to_string(), tool.to_string()));
            Ok(ToolOutput {
                success: true,
                content: vec![
                    ToolContent::Text { text: "line one".into() },
                    ToolContent::Image { mime_type: "image/png".into(), data: "AAAA".into() },
                    ToolContent::Text { text: "line two".into() },
                ],
            })
        }
        async fn disconnect(&self, _server: &str) -> Result<bool, TransportError> {
            Ok(true)
        }
        async fn is_connected(&self, _server: &str) -> bool {
            self.connected
        }
    }

    fn remote_registry() -> SharedToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_server_tools(
            "web",
            vec![RemoteTool {
                name: "search".into(),
                description: "Search the web".into(),
                input_schema: json!({"type": "object"}),
            }],
            true,
        );
        registry.into_shared()
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_text() {
        let bridge = ToolBridge::new(ToolRegistry::new().into_shared());
        let out = bridge.execute("does_not_exist", json!({})).await;
        assert_eq!(out, "Error: Tool 'does_not_exist' not found");
    }

    #[tokio::test]
    async fn executor_failure_is_caught() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let bridge = ToolBridge::new(registry.into_shared());
        let out = bridge.execute("explode", json!({})).await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("boom"));
    }

    #[tokio::test]
    async fn missing_file_returns_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = ToolBridge::new(crate::builtin_registry(dir.path().to_path_buf()).into_shared());
        let out = bridge.execute("read_file", json!({"path": "no/such/file.txt"})).await;
        assert_eq!(out, "Error: File not found: no/such/file.txt");
    }

    #[tokio::test]
    async fn builtin_success_is_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let bridge = ToolBridge::new(crate::builtin_registry(PathBuf::from(dir.path())).into_shared());
        assert_eq!(bridge.execute("read_file", json!({"path": "a.txt"})).await, "alpha");
    }

    #[tokio::test]
    async fn remote_tool_uses_unprefixed_name_and_normalizes() {
        let transport = Arc::new(RecordingTransport { connected: true, ..Default::default() });
        let bridge = ToolBridge::new(remote_registry()).with_transport(transport.clone());

        let out = bridge.execute("web_search", json!({"q": "rust"})).await;
        assert_eq!(out, "line one\n[image: image/png]\nline two");
        assert_eq!(transport.calls.lock().await[0], ("web".to_string(), "search".to_string()));
    }

    #[tokio::test]
    async fn disconnected_server_returns_error_text() {
        let transport = Arc::new(RecordingTransport::default());
        let bridge = ToolBridge::new(remote_registry()).with_transport(transport);
        let out = bridge.execute("web_search", json!({})).await;
        assert_eq!(out, "Error: Not connected to server: web");
    }

    #[tokio::test]
    async fn remote_tool_without_transport_is_error_text() {
        let bridge = ToolBridge::new(remote_registry());
        let out = bridge.execute("web_search", json!({})).await;
        assert!(out.starts_with(ERROR_MARKER));
    }

    #[tokio::test]
    async fn malformed_call_arguments_are_error_text() {
        let bridge = ToolBridge::new(ToolRegistry::new().into_shared());
        let call = MessageToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            arguments: "{oops".into(),
        };
        assert!(bridge.execute_call(&call).await.starts_with("Error: Invalid tool arguments"));
    }

    #[tokio::test]
    async fn tool_execution_publishes_event() {
        let bus = Arc::new(EventBus::new(4));
        let mut rx = bus.subscribe();
        let bridge = ToolBridge::new(ToolRegistry::new().into_shared()).with_events(bus);
        bridge.execute("ghost", json!({})).await;
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "ghost");
                assert!(!success);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn normalize_handles_resources_and_empties() {
        let output = ToolOutput {
            success: true,
            content: vec![
                ToolContent::Resource { uri: "file:///a".into(), mime_type: None, text: Some("inline".into()) },
                ToolContent::Resource { uri: "file:///b".into(), mime_type: None, text: None },
                ToolContent::Unknown,
            ],
        };
        assert_eq!(normalize_output(&output), "inline\n[resource: file:///b]");

        let empty = ToolOutput { success: true, content: vec![] };
        assert_eq!(normalize_output(&empty), "(no output)");
    }
}
