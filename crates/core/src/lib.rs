//! # Aru Core
//!
//! Domain types, traits, and error definitions for the Aru assistant runtime.
//! Every other crate depends inward on this one: the model endpoint, memory
//! store, and tool transports are all traits defined here and implemented
//! elsewhere, so the routing and tool-loop logic can be tested against
//! scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod state;
pub mod event;

pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{
    Capability, Tool, ToolContent, ToolDescriptor, ToolOutput, ToolRegistry,
    ToolTransport,
};
pub use memory::{MemoryBackend, MemoryRecord, MemoryType};
pub use state::{ConversationState, DomainResult, HandlerKind, RoutingDecision};
pub use event::{DomainEvent, EventBus};
