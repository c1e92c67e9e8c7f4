//! # Aru Agent
//!
//! The turn loop of the assistant:
//!
//! 1. The [`Supervisor`] asks the model which handler should take the turn
//! 2. A [`TurnProcessor`] (email, calendar or idea) answers it, optionally
//!    calling tools through the [`ToolLoop`]
//! 3. Control returns to the supervisor until it decides to end
//! 4. The exchange is stored in memory and the session is checkpointed
//!
//! [`TurnGraph`] wires these steps together. Every step receives an
//! explicit [`AgentContext`]; nothing is global.

pub mod checkpoint;
pub mod context;
pub mod graph;
pub mod processor;
pub mod prompts;
pub mod router;
pub mod tool_loop;

#[cfg(test)]
mod test_helpers;

pub use checkpoint::{CheckpointError, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use context::AgentContext;
pub use graph::{TurnGraph, TurnReport};
pub use processor::{HandlerProfile, MemoryQuery, TurnProcessor};
pub use router::Supervisor;
pub use tool_loop::{LoopState, ToolLoop, ToolLoopOutcome};
