//! Stdio connections to MCP tool servers.
//!
//! [`McpClient`] spawns each server as a child process through rmcp and
//! keeps at most one live session per server name, together with the tool
//! list the server advertised at connect time. The session map is never
//! locked while a server is being awaited.

use async_trait::async_trait;
use aru_core::error::TransportError;
use aru_core::tool::{RemoteTool, ServerSpec, ToolContent, ToolOutput, ToolTransport};
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, RawContent},
    service::{Peer, RoleClient, RunningService},
    transport::TokioChildProcess,
};
use std::collections::{BTreeMap, HashMap};
use tokio::{process::Command, sync::Mutex};
use tracing::{debug, info, warn};

/// A live session plus the tools it listed when it came up.
struct ServerConnection {
    spec: ServerSpec,
    service: RunningService<RoleClient, ()>,
    tools: Vec<RemoteTool>,
}

#[derive(Default)]
pub struct McpClient {
    connections: Mutex<HashMap<String, ServerConnection>>,
}

impl McpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every server with a live session, sorted.
    pub async fn connected_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Launch parameters of a live session.
    pub async fn server_spec(&self, server: &str) -> Option<ServerSpec> {
        self.connections.lock().await.get(server).map(|c| c.spec.clone())
    }

    /// A handle for requests to `server`, usable after the map is unlocked.
    async fn peer(&self, server: &str) -> Result<Peer<RoleClient>, TransportError> {
        self.connections
            .lock()
            .await
            .get(server)
            .map(|c| c.service.peer().clone())
            .ok_or_else(|| TransportError::NotConnected(server.to_string()))
    }

    /// Close every session.
    pub async fn disconnect_all(&self) {
        let drained: Vec<(String, ServerConnection)> = self.connections.lock().await.drain().collect();
        for (name, connection) in drained {
            close(&name, connection).await;
        }
    }
}

async fn close(name: &str, connection: ServerConnection) {
    if let Err(e) = connection.service.cancel().await {
        warn!(server = %name, error = %e, "MCP session did not shut down cleanly");
    } else {
        info!(server = %name, "Disconnected from MCP server");
    }
}

/// Substitute `${VAR}` references with values from `lookup`.
///
/// Unset variables expand to the empty string.
pub fn expand_env_value(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                match lookup(var) {
                    Some(v) => out.push_str(&v),
                    None => debug!(var, "Environment variable for MCP server is unset"),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn expanded_env(env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    env.iter()
        .map(|(k, v)| (k.clone(), expand_env_value(v, |var| std::env::var(var).ok())))
        .collect()
}

fn convert_tool(tool: &rmcp::model::Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.to_string(),
        description: tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        input_schema: serde_json::Value::Object(tool.input_schema.as_ref().clone()),
    }
}

/// Map MCP result content onto [`ToolContent`] segments.
pub(crate) fn convert_content(content: &[rmcp::model::Content]) -> Vec<ToolContent> {
    content
        .iter()
        .map(|c| match &c.raw {
            RawContent::Text(t) => ToolContent::Text { text: t.text.clone() },
            _ => serde_json::to_value(c)
                .map(|v| content_from_value(&v))
                .unwrap_or(ToolContent::Unknown),
        })
        .collect()
}

fn content_from_value(value: &serde_json::Value) -> ToolContent {
    let str_field = |v: &serde_json::Value, key: &str| v.get(key).and_then(|s| s.as_str()).map(str::to_string);

    match value.get("type").and_then(|t| t.as_str()) {
        Some("text") => ToolContent::Text {
            text: str_field(value, "text").unwrap_or_default(),
        },
        Some("image") => ToolContent::Image {
            mime_type: str_field(value, "mimeType").unwrap_or_else(|| "application/octet-stream".into()),
            data: str_field(value, "data").unwrap_or_default(),
        },
        Some("resource") => {
            let resource = value.get("resource").unwrap_or(value);
            match str_field(resource, "uri") {
                Some(uri) => ToolContent::Resource {
                    uri,
                    mime_type: str_field(resource, "mimeType"),
                    text: str_field(resource, "text"),
                },
                None => ToolContent::Unknown,
            }
        }
        _ => ToolContent::Unknown,
    }
}

#[async_trait]
impl ToolTransport for McpClient {
    async fn connect(&self, spec: &ServerSpec) -> Result<bool, TransportError> {
        if self.connections.lock().await.contains_key(&spec.name) {
            debug!(server = %spec.name, "MCP server already connected");
            return Ok(true);
        }

        info!(server = %spec.name, command = %spec.command, "Connecting to MCP server");
        let failed = |reason: String| TransportError::ConnectFailed {
            server: spec.name.clone(),
            reason,
        };

        let mut command = Command::new(&spec.command);
        command.args(&spec.args).envs(expanded_env(&spec.env));

        let transport = TokioChildProcess::new(command).map_err(|e| failed(e.to_string()))?;
        let service: RunningService<RoleClient, ()> =
            ().serve(transport).await.map_err(|e| failed(e.to_string()))?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools.iter().map(convert_tool).collect::<Vec<_>>(),
            Err(e) => {
                let _ = service.cancel().await;
                return Err(failed(format!("listing tools: {e}")));
            }
        };

        let connection = ServerConnection {
            spec: spec.clone(),
            service,
            tools,
        };
        let tool_count = connection.tools.len();
        let raced = {
            let mut connections = self.connections.lock().await;
            if connections.contains_key(&spec.name) {
                Some(connection)
            } else {
                connections.insert(spec.name.clone(), connection);
                None
            }
        };
        // A concurrent connect to the same name won; keep its session.
        if let Some(duplicate) = raced {
            close(&spec.name, duplicate).await;
            return Ok(true);
        }

        info!(server = %spec.name, tools = tool_count, "Connected to MCP server");
        Ok(true)
    }

    async fn list_tools(&self, server: &str) -> Result<Vec<RemoteTool>, TransportError> {
        self.connections
            .lock()
            .await
            .get(server)
            .map(|c| c.tools.clone())
            .ok_or_else(|| TransportError::NotConnected(server.to_string()))
    }

    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, TransportError> {
        let call_failed = |reason: String| TransportError::CallFailed {
            server: server.to_string(),
            tool: tool.to_string(),
            reason,
        };

        let arguments = match arguments {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => return Err(call_failed(format!("arguments must be a JSON object, got {other}"))),
        };

        let peer = self.peer(server).await?;

        debug!(server, tool, "Calling MCP tool");
        let mut params = CallToolRequestParams::new(tool.to_string());
        params.arguments = arguments;
        let result = peer
            .call_tool(params)
            .await
            .map_err(|e| call_failed(e.to_string()))?;

        Ok(ToolOutput {
            success: result.is_error != Some(true),
            content: convert_content(&result.content),
        })
    }

    async fn disconnect(&self, server: &str) -> Result<bool, TransportError> {
        let removed = self.connections.lock().await.remove(server);
        match removed {
            Some(connection) => {
                close(server, connection).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_connected(&self, server: &str) -> bool {
        self.connections.lock().await.contains_key(server)
    }
}
