//! Configuration loading, validation, and management for Aru.
//!
//! Loads configuration from `~/.aru/config.toml` with environment
//! variable overrides. Every problem found here is a [`ConfigError`] and is
//! fatal at startup: a process that cannot reach its model endpoint has
//! nothing useful to do.

use aru_core::tool::ServerSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.aru/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model in `provider/model-id` form
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Owner of every memory written by this process
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Per-provider credentials and endpoints, keyed by provider prefix
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub mcp: McpSettings,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,
}

fn default_model() -> String {
    "anthropic/claude-3-5-sonnet-20241022".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_log_level() -> String {
    "info".into()
}
fn default_user_id() -> String {
    "default_user".into()
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("log_level", &self.log_level)
            .field("user_id", &self.user_id)
            .field("data_dir", &self.data_dir)
            .field("providers", &self.providers)
            .field("memory", &self.memory)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("mcp", &self.mcp)
            .field("checkpoints", &self.checkpoints)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "file", "sqlite", "in_memory" or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Store location; defaults under the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Days until a record decays to the score floor
    #[serde(default = "default_decay_days")]
    pub decay_days: f64,

    /// Decayed scores below this are dropped from search results
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_decay_days() -> f64 {
    90.0
}
fn default_relevance_threshold() -> f32 {
    0.3
}
fn default_search_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            decay_days: default_decay_days(),
            relevance_threshold: default_relevance_threshold(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model round-trips allowed in one tool loop
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Router invocations allowed in one turn
    #[serde(default = "default_max_routing_steps")]
    pub max_routing_steps: usize,

    /// Memories the router pulls in as context
    #[serde(default = "default_memory_recall_limit")]
    pub memory_recall_limit: usize,

    /// Print the handler path after each turn
    #[serde(default)]
    pub debug: bool,
}

fn default_max_tool_iterations() -> usize {
    5
}
fn default_max_routing_steps() -> usize {
    4
}
fn default_memory_recall_limit() -> usize {
    3
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            max_routing_steps: default_max_routing_steps(),
            memory_recall_limit: default_memory_recall_limit(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Register the builtin filesystem tools
    #[serde(default = "default_true")]
    pub builtin_filesystem: bool,

    /// Directory the builtin filesystem tools are confined to;
    /// defaults to the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Prefix remote tool names with their server name
    #[serde(default = "default_true")]
    pub namespace_remote: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtin_filesystem: true,
            base_dir: None,
            namespace_remote: true,
        }
    }
}

/// One tool server the MCP manager may launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl McpServerConfig {
    pub fn to_spec(&self) -> ServerSpec {
        ServerSpec {
            name: self.name.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSettings {
    #[serde(default = "default_mcp_servers")]
    pub servers: Vec<McpServerConfig>,
}

fn npx_server(name: &str, package: &str, env_key: Option<&str>, description: &str) -> McpServerConfig {
    let mut env = BTreeMap::new();
    if let Some(key) = env_key {
        env.insert(key.to_string(), format!("${{{key}}}"));
    }
    McpServerConfig {
        name: name.into(),
        command: "npx".into(),
        args: vec!["-y".into(), package.into()],
        env,
        enabled: false,
        auto_connect: false,
        description: Some(description.into()),
    }
}

fn default_mcp_servers() -> Vec<McpServerConfig> {
    let mut filesystem = npx_server(
        "filesystem",
        "@modelcontextprotocol/server-filesystem",
        None,
        "File system access tools",
    );
    filesystem.args.push(".".into());
    filesystem.enabled = true;

    vec![
        filesystem,
        npx_server(
            "web-search",
            "@modelcontextprotocol/server-brave-search",
            Some("BRAVE_API_KEY"),
            "Web search via Brave Search API",
        ),
        npx_server(
            "github",
            "@modelcontextprotocol/server-github",
            Some("GITHUB_TOKEN"),
            "GitHub repository access",
        ),
        npx_server("sqlite", "@modelcontextprotocol/server-sqlite", None, "SQLite database access"),
    ]
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            servers: default_mcp_servers(),
        }
    }
}

impl McpSettings {
    pub fn server(&self, name: &str) -> Option<&McpServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    pub fn auto_connect_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.servers.iter().filter(|s| s.enabled && s.auto_connect)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Providers that need no credential.
const KEYLESS_PROVIDERS: &[&str] = &["ollama"];

/// Environment variable holding the key for a provider prefix.
pub fn credential_env_var(provider: &str) -> Option<&'static str> {
    match provider {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

/// Split `provider/model-id` on the first slash.
///
/// A bare model id without a prefix is treated as an OpenAI model.
pub fn split_model(spec: &str) -> (&str, &str) {
    match spec.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => (provider, model),
        _ => ("openai", spec),
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.aru/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ARU_MODEL`, `ARU_LOG_LEVEL`, `ARU_USER_ID`
    /// - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `ARU_API_KEY` (applies to the default model's provider)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Takes the lookup as a closure so tests don't mutate process env.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(model) = env("ARU_MODEL") {
            self.default_model = model;
        }
        if let Some(level) = env("ARU_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(user) = env("ARU_USER_ID") {
            self.user_id = user;
        }

        for provider in ["anthropic", "openai", "openrouter"] {
            let Some(var) = credential_env_var(provider) else { continue };
            if let Some(key) = env(var) {
                let entry = self.providers.entry(provider.to_string()).or_default();
                if entry.api_key.is_none() {
                    entry.api_key = Some(key);
                }
            }
        }

        if let Some(key) = env("ARU_API_KEY") {
            let provider = self.default_provider().to_string();
            self.providers.entry(provider).or_default().api_key = Some(key);
        }
    }

    /// The provider prefix of `default_model`.
    pub fn default_provider(&self) -> &str {
        split_model(&self.default_model).0
    }

    /// The key configured for a provider, if any.
    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    /// Fail if the default model's provider needs a key and has none.
    pub fn check_credentials(&self) -> Result<(), ConfigError> {
        let provider = self.default_provider();
        if KEYLESS_PROVIDERS.contains(&provider) || self.api_key_for(provider).is_some() {
            return Ok(());
        }
        // Custom endpoints declared in config may run without auth
        if credential_env_var(provider).is_none()
            && self.providers.get(provider).is_some_and(|p| p.api_url.is_some())
        {
            return Ok(());
        }
        Err(ConfigError::MissingCredential {
            provider: provider.to_string(),
            env_var: credential_env_var(provider).unwrap_or("ARU_API_KEY").to_string(),
        })
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".aru")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Where the memory backend keeps its data.
    pub fn memory_path(&self) -> PathBuf {
        if let Some(path) = &self.memory.path {
            return path.clone();
        }
        let file = match self.memory.backend.as_str() {
            "sqlite" => "memory.db",
            _ => "memories.jsonl",
        };
        self.data_dir().join(file)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.checkpoints
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("checkpoints"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError("default_model must not be empty".into()));
        }

        if !matches!(self.memory.backend.as_str(), "file" | "sqlite" | "in_memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{}'",
                self.memory.backend
            )));
        }

        if !(self.memory.decay_days > 0.0) {
            return Err(ConfigError::ValidationError("memory.decay_days must be > 0".into()));
        }

        if !(0.0..=1.0).contains(&self.memory.relevance_threshold) {
            return Err(ConfigError::ValidationError(
                "memory.relevance_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_tool_iterations == 0 || self.agent.max_routing_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent iteration limits must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for server in &self.mcp.servers {
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate MCP server name '{}'",
                    server.name
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            log_level: default_log_level(),
            user_id: default_user_id(),
            data_dir: None,
            providers: HashMap::new(),
            memory: MemoryConfig::default(),
            agent: AgentSettings::default(),
            tools: ToolsConfig::default(),
            mcp: McpSettings::default(),
            checkpoints: CheckpointConfig::default(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors. All of them stop the process at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key for provider '{provider}' (set {env_var} or providers.{provider}.api_key)")]
    MissingCredential { provider: String, env_var: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider(), "anthropic");
        assert_eq!(config.agent.max_tool_iterations, 5);
        assert!((config.memory.decay_days - 90.0).abs() < f64::EPSILON);
        assert!((config.memory.relevance_threshold - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.mcp.servers.len(), 4);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.memory.relevance_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_server_names_rejected() {
        let mut config = AppConfig::default();
        let dup = config.mcp.servers[0].clone();
        config.mcp.servers.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.user_id, "default_user");
    }

    #[test]
    fn load_from_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
default_model = "ollama/llama3"

[memory]
backend = "sqlite"
decay_days = 30

[[mcp.servers]]
name = "notes"
command = "notes-server"
auto_connect = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider(), "ollama");
        assert_eq!(config.memory.backend, "sqlite");
        assert!(config.memory_path().ends_with("memory.db"));
        assert_eq!(config.mcp.servers.len(), 1);
        assert!(config.mcp.servers[0].enabled);
        assert_eq!(config.mcp.auto_connect_servers().count(), 1);
    }

    #[test]
    fn unparseable_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn missing_credential_is_fatal() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(no_env);
        let err = config.check_credentials().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn env_key_satisfies_credential_check() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| (k == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string()));
        assert!(config.check_credentials().is_ok());
        assert_eq!(config.api_key_for("anthropic"), Some("sk-test"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| (k == "ARU_MODEL").then(|| "ollama/llama3".to_string()));
        assert!(config.check_credentials().is_ok());
    }

    #[test]
    fn aru_api_key_applies_to_default_provider() {
        let mut config = AppConfig::default();
        config.default_model = "openrouter/meta-llama/llama-3-70b".into();
        config.apply_env_overrides(|k| (k == "ARU_API_KEY").then(|| "or-key".to_string()));
        assert_eq!(config.api_key_for("openrouter"), Some("or-key"));
    }

    #[test]
    fn split_model_on_first_slash() {
        assert_eq!(split_model("openrouter/meta-llama/llama-3"), ("openrouter", "meta-llama/llama-3"));
        assert_eq!(split_model("gpt-4o"), ("openai", "gpt-4o"));
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig { api_key: Some("sk-secret".into()), api_url: None },
        );
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_servers_match_expectations() {
        let settings = McpSettings::default();
        let fs = settings.server("filesystem").unwrap();
        assert!(fs.enabled);
        assert!(!settings.server("github").unwrap().enabled);
        assert_eq!(fs.to_spec().command, "npx");
    }
}
