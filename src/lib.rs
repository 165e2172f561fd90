pub mod core;
pub mod runtime;

// Agents backed by a completion provider
pub mod agent;
pub mod conversation;
pub mod llm;

// Build pipelines driving the agents
pub mod pipeline;

// Optional components
pub mod cli;
pub mod config;
pub mod logging;
