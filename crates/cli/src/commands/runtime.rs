//! Wiring of config into live components.

use anyhow::{Context, anyhow};
use aru_agent::{AgentContext, CheckpointStore, FileCheckpointStore};
use aru_config::AppConfig;
use aru_core::event::EventBus;
use aru_core::tool::{SharedToolRegistry, ToolRegistry};
use aru_mcp::{McpClient, McpManager};
use aru_memory::{DecayPolicy, MemoryManager, open_backend};
use aru_tools::ToolBridge;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a chat session needs, built once at startup.
pub struct Runtime {
    pub config: AppConfig,
    pub ctx: AgentContext,
    pub registry: SharedToolRegistry,
    pub mcp: McpManager,
    pub events: Arc<EventBus>,
    pub checkpoints: Option<Arc<dyn CheckpointStore>>,
}

/// Open the configured memory backend for the configured user.
pub async fn open_memory(config: &AppConfig, events: Option<Arc<EventBus>>) -> anyhow::Result<MemoryManager> {
    let path = config.memory_path();
    let backend = open_backend(&config.memory.backend, &path)
        .await
        .with_context(|| format!("opening {} memory at {}", config.memory.backend, path.display()))?;
    let decay = DecayPolicy::new(config.memory.decay_days, config.memory.relevance_threshold);
    let manager = MemoryManager::new(backend, &config.user_id, decay);
    Ok(match events {
        Some(bus) => manager.with_events(bus),
        None => manager,
    })
}

fn tool_base_dir(config: &AppConfig) -> PathBuf {
    config
        .tools
        .base_dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The tool registry plus an MCP manager that feeds it.
pub fn tool_stack(config: &AppConfig) -> (SharedToolRegistry, Arc<McpClient>, McpManager) {
    let mut registry = ToolRegistry::new();
    if config.tools.builtin_filesystem {
        aru_tools::register_builtins(&mut registry, tool_base_dir(config));
    }
    let registry = registry.into_shared();
    let client = Arc::new(McpClient::new());
    let mcp = McpManager::new(config.mcp.clone(), client.clone(), registry.clone())
        .with_namespacing(config.tools.namespace_remote);
    (registry, client, mcp)
}

impl Runtime {
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let events = Arc::new(EventBus::default());

        let providers = aru_providers::build_from_config(&config);
        let (provider, model) = providers
            .resolve_default()
            .ok_or_else(|| anyhow!("no provider registered for model '{}'", config.default_model))?;
        info!(provider = %provider.name(), model = %model, "Using model");

        let memory = open_memory(&config, Some(events.clone())).await?;

        let (registry, client, mcp) = tool_stack(&config);
        let bridge = ToolBridge::new(registry.clone())
            .with_transport(client)
            .with_events(events.clone());

        let ctx = AgentContext::new(provider, model, memory, bridge)
            .with_temperature(config.default_temperature)
            .with_events(events.clone())
            .with_settings(config.agent.clone());

        let checkpoints: Option<Arc<dyn CheckpointStore>> = if config.checkpoints.enabled {
            Some(Arc::new(FileCheckpointStore::new(config.checkpoint_dir())))
        } else {
            None
        };

        Ok(Self {
            config,
            ctx,
            registry,
            mcp,
            events,
            checkpoints,
        })
    }

    /// Connect auto-connect servers; failures are reported, not fatal.
    pub async fn connect_auto(&self) {
        for report in self.mcp.connect_auto().await {
            match &report.error {
                None => println!("  Connected to {} ({} tools)", report.server, report.tools.len()),
                Some(e) => {
                    warn!(server = %report.server, error = %e, "Auto-connect failed");
                    eprintln!("  Could not connect to {}: {e}", report.server);
                }
            }
        }
    }
}
