//! Tool capabilities, descriptors, and the registry the model loop reads.
//!
//! A tool is either a builtin (an in-process [`Tool`] implementation) or a
//! remote tool exposed by a tool server over a [`ToolTransport`]. Both are
//! recorded in the [`ToolRegistry`] as a [`ToolDescriptor`] whose
//! [`Capability`] says how to reach it; callers dispatch by matching on the
//! variant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::error::{ToolError, TransportError};
use crate::provider::ToolDefinition;

/// One segment of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        mime_type: String,
        data: String,
    },
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// The result of running a tool, before it is flattened to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub content: Vec<ToolContent>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// A result the tool itself reports as failed.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: vec![ToolContent::Text { text: message.into() }],
        }
    }
}

/// An in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError>;
}

/// Identity of a tool-serving process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A tool as advertised by a tool server, before registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Connection-level operations against tool servers.
///
/// At most one live connection exists per server name. Calling a tool on a
/// server that is not connected yields [`TransportError::NotConnected`].
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Connect to the server. Returns `true` once a session is live,
    /// including when one already was.
    async fn connect(&self, spec: &ServerSpec) -> std::result::Result<bool, TransportError>;

    async fn list_tools(&self, server: &str) -> std::result::Result<Vec<RemoteTool>, TransportError>;

    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, TransportError>;

    /// Tear the session down. Returns `false` if there was none.
    async fn disconnect(&self, server: &str) -> std::result::Result<bool, TransportError>;

    async fn is_connected(&self, server: &str) -> bool;
}

/// How a registered tool is reached.
#[derive(Clone)]
pub enum Capability {
    Builtin(Arc<dyn Tool>),
    Remote {
        server: String,
        /// The server's own (unprefixed) name for the tool
        tool: String,
    },
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Builtin(tool) => f.debug_tuple("Builtin").field(&tool.name()).finish(),
            Capability::Remote { server, tool } => f
                .debug_struct("Remote")
                .field("server", server)
                .field("tool", tool)
                .finish(),
        }
    }
}

/// A registered, invocable tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Name exposed to the model (remote tools are prefixed with the server)
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    /// Owning server, `None` for builtins
    pub server: Option<String>,
    pub capability: Capability,
}

impl ToolDescriptor {
    pub fn builtin(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.parameters_schema(),
            server: None,
            capability: Capability::Builtin(tool),
        }
    }

    pub fn remote(server: &str, tool: RemoteTool, namespaced: bool) -> Self {
        let name = if namespaced {
            format!("{server}_{}", tool.name)
        } else {
            tool.name.clone()
        };
        Self {
            name,
            description: tool.description,
            input_schema: tool.input_schema,
            server: Some(server.to_string()),
            capability: Capability::Remote {
                server: server.to_string(),
                tool: tool.name,
            },
        }
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// Registry of every tool the model can call.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

/// The registry as shared between the tool-server manager (writer) and
/// the model loop (reader).
pub type SharedToolRegistry = Arc<tokio::sync::RwLock<ToolRegistry>>;

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedToolRegistry {
        Arc::new(tokio::sync::RwLock::new(self))
    }

    /// Register a builtin tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let descriptor = ToolDescriptor::builtin(tool);
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    /// Replace the full tool set of `server` with `tools`.
    ///
    /// Registering the same server twice leaves exactly one descriptor per
    /// tool. Returns the registered names.
    pub fn register_server_tools(
        &mut self,
        server: &str,
        tools: Vec<RemoteTool>,
        namespaced: bool,
    ) -> Vec<String> {
        self.unregister_server(server);
        let mut names = Vec::with_capacity(tools.len());
        for tool in tools {
            let descriptor = ToolDescriptor::remote(server, tool, namespaced);
            names.push(descriptor.name.clone());
            self.tools.insert(descriptor.name.clone(), descriptor);
        }
        names
    }

    /// Drop every tool owned by `server`. Returns how many were removed.
    pub fn unregister_server(&mut self, server: &str) -> usize {
        let before = self.tools.len();
        self.tools.retain(|_, d| d.server.as_deref() != Some(server));
        before - self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors().into_iter().map(|d| d.to_definition()).collect()
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut all: Vec<&ToolDescriptor> = self.tools.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors().into_iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(arguments["text"].as_str().unwrap_or("")))
        }
    }

    fn remote(name: &str) -> RemoteTool {
        RemoteTool {
            name: name.into(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn register_and_lookup_builtin() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let d = registry.get("echo").unwrap();
        assert!(d.server.is_none());
        assert!(matches!(d.capability, Capability::Builtin(_)));
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn server_tools_are_namespaced() {
        let mut registry = ToolRegistry::new();
        let names = registry.register_server_tools("filesystem", vec![remote("read_file")], true);
        assert_eq!(names, vec!["filesystem_read_file"]);

        let d = registry.get("filesystem_read_file").unwrap();
        match &d.capability {
            Capability::Remote { server, tool } => {
                assert_eq!(server, "filesystem");
                assert_eq!(tool, "read_file");
            }
            other => panic!("expected remote capability, got {other:?}"),
        }
    }

    #[test]
    fn registering_server_twice_is_idempotent() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let tools = vec![remote("read_file"), remote("write_file")];
        registry.register_server_tools("filesystem", tools.clone(), true);
        let first: Vec<String> = registry.names().iter().map(|s| s.to_string()).collect();

        registry.register_server_tools("filesystem", tools, true);
        let second: Vec<String> = registry.names().iter().map(|s| s.to_string()).collect();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn reregistering_drops_tools_the_server_no_longer_lists() {
        let mut registry = ToolRegistry::new();
        registry.register_server_tools("fs", vec![remote("a"), remote("b")], true);
        registry.register_server_tools("fs", vec![remote("a")], true);
        assert_eq!(registry.names(), vec!["fs_a"]);
    }

    #[test]
    fn unregister_server_keeps_other_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register_server_tools("fs", vec![remote("a")], true);
        registry.register_server_tools("web", vec![remote("search")], true);

        assert_eq!(registry.unregister_server("fs"), 1);
        assert_eq!(registry.names(), vec!["echo", "web_search"]);
    }

    #[test]
    fn definitions_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register_server_tools("z", vec![remote("t")], true);
        registry.register(Arc::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "z_t");
    }

    #[test]
    fn tool_content_tags_by_type() {
        let json = serde_json::json!({"type": "audio", "data": "..."});
        let content: ToolContent = serde_json::from_value(json).unwrap();
        assert_eq!(content, ToolContent::Unknown);

        let json = serde_json::json!({"type": "image", "mime_type": "image/png", "data": "AAA"});
        let content: ToolContent = serde_json::from_value(json).unwrap();
        assert!(matches!(content, ToolContent::Image { .. }));
    }
}
