//! Completion service clients
//!
//! AI-backed agents only see the [`CompletionProvider`] trait. Concrete
//! providers:
//! - [`OpenAiProvider`] - OpenAI-compatible chat completions
//! - [`AnthropicProvider`] - Anthropic Messages API
//! - [`OfflineProvider`] - mock responses, no network
//! - [`FallbackProvider`] - primary then secondary
//! - [`ScriptedProvider`] - queued replies/failures for tests and dry runs

pub mod anthropic;
pub mod auth;
pub mod fallback;
pub mod offline;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use auth::AuthConfig;
pub use fallback::FallbackProvider;
pub use offline::OfflineProvider;
pub use openai::OpenAiProvider;
pub use provider::CompletionProvider;
pub use retry::{complete_with_retry, RetryPolicy};
pub use scripted::ScriptedProvider;
pub use types::{Completion, CompletionRequest, Usage, DEFAULT_MAX_TOKENS};
