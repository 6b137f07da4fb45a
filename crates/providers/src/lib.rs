//! LLM Provider implementations for FleetPilot.
//!
//! All providers implement the `fleetpilot_core::Provider` trait and yield
//! plain text fragments. The router selects the correct provider based on
//! configuration.

pub mod console_stream;
pub mod openai_compat;
pub mod router;

pub use console_stream::ConsoleStreamProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
