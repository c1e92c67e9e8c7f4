//! # Aru MCP
//!
//! Connections to Model Context Protocol tool servers. [`McpClient`] is the
//! stdio [`ToolTransport`](aru_core::ToolTransport) implementation;
//! [`McpManager`] maps configured servers onto it and keeps the shared tool
//! registry in step with what is connected.

pub mod client;
pub mod manager;

pub use client::{McpClient, expand_env_value};
pub use manager::{ConnectReport, McpManager};
