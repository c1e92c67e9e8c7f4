//! Error types for the Aru domain.
//!
//! Each external collaborator (model endpoint, memory store, tool server)
//! has its own error enum. None of them are fatal: the turn loop catches
//! them and records a message on the conversation state. Only
//! configuration problems stop the process, and those live in `aru-config`.

use thiserror::Error;

/// The top-level error type for all Aru operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to a model endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures reading or writing the memory store.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Memory not found: {0}")]
    NotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid memory data: {0}")]
    InvalidData(String),
}

/// Failures resolving or executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("{tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Path rejected: {0}")]
    PathRejected(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures on a tool-server connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected to server: {0}")]
    NotConnected(String),

    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Server '{0}' is disabled")]
    Disabled(String),

    #[error("Failed to connect to {server}: {reason}")]
    ConnectFailed { server: String, reason: String },

    #[error("Call to {server}/{tool} failed: {reason}")]
    CallFailed {
        server: String,
        tool: String,
        reason: String,
    },
}
