//! Configured tool servers and their registration into the tool registry.

use aru_config::{McpServerConfig, McpSettings};
use aru_core::error::TransportError;
use aru_core::tool::{SharedToolRegistry, ToolTransport};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-server result of a bulk connect.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectReport {
    pub server: String,
    /// Names registered for the server, empty on failure
    pub tools: Vec<String>,
    pub error: Option<String>,
}

impl ConnectReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct McpManager {
    settings: McpSettings,
    transport: Arc<dyn ToolTransport>,
    registry: SharedToolRegistry,
    namespaced: bool,
}

impl McpManager {
    pub fn new(settings: McpSettings, transport: Arc<dyn ToolTransport>, registry: SharedToolRegistry) -> Self {
        Self {
            settings,
            transport,
            registry,
            namespaced: true,
        }
    }

    /// Register remote tools under their bare names instead of `<server>_<tool>`.
    pub fn with_namespacing(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn transport(&self) -> Arc<dyn ToolTransport> {
        self.transport.clone()
    }

    pub fn configured_servers(&self) -> &[McpServerConfig] {
        &self.settings.servers
    }

    /// Connect to `config` and (re)register its tools. Returns the registered names.
    pub async fn connect_server(&self, config: &McpServerConfig) -> Result<Vec<String>, TransportError> {
        self.transport.connect(&config.to_spec()).await?;
        let tools = self.transport.list_tools(&config.name).await?;
        let names = self
            .registry
            .write()
            .await
            .register_server_tools(&config.name, tools, self.namespaced);
        info!(server = %config.name, tools = names.len(), "Registered MCP tools");
        Ok(names)
    }

    /// Connect to a configured server, refusing unknown or disabled ones.
    pub async fn connect_by_name(&self, name: &str) -> Result<Vec<String>, TransportError> {
        let config = self
            .settings
            .server(name)
            .ok_or_else(|| TransportError::UnknownServer(name.to_string()))?;
        if !config.enabled {
            warn!(server = %name, "Refusing to connect to disabled MCP server");
            return Err(TransportError::Disabled(name.to_string()));
        }
        self.connect_server(config).await
    }

    /// Connect every enabled server marked `auto_connect`.
    pub async fn connect_auto(&self) -> Vec<ConnectReport> {
        let servers: Vec<McpServerConfig> = self.settings.auto_connect_servers().cloned().collect();
        self.connect_each(&servers).await
    }

    /// Connect every enabled server.
    pub async fn connect_all_enabled(&self) -> Vec<ConnectReport> {
        let servers: Vec<McpServerConfig> =
            self.settings.servers.iter().filter(|s| s.enabled).cloned().collect();
        self.connect_each(&servers).await
    }

    async fn connect_each(&self, servers: &[McpServerConfig]) -> Vec<ConnectReport> {
        let mut reports = Vec::with_capacity(servers.len());
        for config in servers {
            let report = match self.connect_server(config).await {
                Ok(tools) => ConnectReport {
                    server: config.name.clone(),
                    tools,
                    error: None,
                },
                Err(e) => {
                    error!(server = %config.name, error = %e, "Failed to connect MCP server");
                    ConnectReport {
                        server: config.name.clone(),
                        tools: vec![],
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Close the session to `name` and drop its tools from the registry.
    pub async fn disconnect(&self, name: &str) -> Result<bool, TransportError> {
        let removed = self.registry.write().await.unregister_server(name);
        let was_connected = self.transport.disconnect(name).await?;
        if was_connected {
            info!(server = %name, removed, "Disconnected MCP server");
        }
        Ok(was_connected)
    }

    /// Configured servers that currently have a live session.
    pub async fn connected_servers(&self) -> Vec<String> {
        let mut connected = Vec::new();
        for server in &self.settings.servers {
            if self.transport.is_connected(&server.name).await {
                connected.push(server.name.clone());
            }
        }
        connected
    }

    /// Human-readable list of every registered remote tool.
    pub async fn tools_description(&self) -> String {
        let registry = self.registry.read().await;
        let remote: Vec<_> = registry
            .descriptors()
            .into_iter()
            .filter_map(|d| d.server.as_deref().map(|server| (d, server)))
            .collect();

        if remote.is_empty() {
            return "No MCP tools available.".to_string();
        }

        let mut lines = vec!["Available MCP Tools:".to_string()];
        for (descriptor, server) in remote {
            lines.push(format!("- {} ({server}): {}", descriptor.name, descriptor.description));
        }
        lines.join("\n")
    }

    /// Disconnect every live session.
    pub async fn shutdown(&self) {
        info!("Shutting down MCP connections");
        for name in self.connected_servers().await {
            if let Err(e) = self.disconnect(&name).await {
                warn!(server = %name, error = %e, "Error while disconnecting MCP server");
            }
        }
    }
}
