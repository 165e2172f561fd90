//! Completion provider trait
//!
//! Abstracts the hosted language-model API so that AI-backed agents can be
//! wired to OpenAI, Anthropic, an offline stub or a scripted test double
//! interchangeably.

use std::sync::Arc;

use anyhow::Result;

use super::types::{Completion, CompletionRequest};

/// A text-completion capability injected into AI-backed agents.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion request.
    ///
    /// Transport and API errors are returned as-is; retrying is the caller's
    /// decision (see [`super::retry`]).
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Get the provider name (e.g., "openai", "anthropic").
    fn provider_name(&self) -> &str;
}

#[async_trait::async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        (**self).complete(request).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}
