//! # FleetPilot Core
//!
//! Domain types, traits, and error definitions for the FleetPilot console
//! copilot. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is defined as a trait or a small
//! shared cell here. Implementations live in their respective crates. This
//! enables:
//! - Swapping LLM backends via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentPhase, AgentStatus};
pub use context::{
    AgentContext, ConsoleShell, ContextProvider, OperatorIdentity, PageContextGuard,
    PageContextSlot, PageContextSource, PageRoute, RouteState, SystemSnapshot, page_source,
};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageId, Role, Transcript};
pub use provider::{FragmentReceiver, Provider, ProviderRequest};
pub use tool::{Tool, ToolCall, ToolOutcome, ToolRegistry};
