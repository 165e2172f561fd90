//! AI-backed agents
//!
//! An AI agent is an ordinary bus agent whose handler is an [`AiHandler`]:
//! - [`AgentProfile`] - role, system prompt and model parameters
//! - [`AiHandler`] - builds prompts, calls the provider under a retry policy, routes replies
//! - [`ReplyRoute`] - reply to the sender or forward to a next hop

pub mod ai;
pub mod profile;

pub use ai::{AiHandler, ReplyRoute, SharedHistory};
pub use profile::{AgentProfile, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
