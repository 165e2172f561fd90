//! Conversation history kept by AI-backed agents

pub mod history;

pub use history::{ConversationHistory, RetentionPolicy, Role, Turn};
