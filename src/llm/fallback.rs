//! Primary/secondary provider pair

use std::sync::Arc;

use anyhow::{Context, Result};

use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest};

/// Tries the primary provider and falls back to the secondary on error
pub struct FallbackProvider {
    primary: Arc<dyn CompletionProvider>,
    secondary: Arc<dyn CompletionProvider>,
    name: String,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn CompletionProvider>, secondary: Arc<dyn CompletionProvider>) -> Self {
        let name = format!("{}+{}", primary.provider_name(), secondary.provider_name());
        Self {
            primary,
            secondary,
            name,
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for FallbackProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        match self.primary.complete(request).await {
            Ok(completion) => Ok(completion),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.provider_name(),
                    secondary = self.secondary.provider_name(),
                    "Primary provider failed, falling back: {:#}",
                    e
                );
                self.secondary.complete(request).await.with_context(|| {
                    format!(
                        "{} failed after {} failed with: {:#}",
                        self.secondary.provider_name(),
                        self.primary.provider_name(),
                        e
                    )
                })
            }
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;
    use crate::llm::ScriptedProvider;

    fn request() -> CompletionRequest {
        CompletionRequest::new("m").with_turns([Turn::user("hi")])
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = Arc::new(ScriptedProvider::new().then_reply("from primary"));
        let secondary = Arc::new(ScriptedProvider::new().then_reply("from secondary"));
        let provider = FallbackProvider::new(primary.clone(), secondary.clone());

        let completion = provider.complete(&request()).await.unwrap();
        assert_eq!(completion.text, "from primary");
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let primary = Arc::new(ScriptedProvider::new().then_fail("401 Unauthorized"));
        let secondary = Arc::new(ScriptedProvider::new().then_reply("from secondary"));
        let provider = FallbackProvider::new(primary.clone(), secondary.clone());

        let completion = provider.complete(&request()).await.unwrap();
        assert_eq!(completion.text, "from secondary");
        assert_eq!(primary.call_count(), 1);
        assert_eq!(secondary.call_count(), 1);
        assert_eq!(provider.provider_name(), "scripted+scripted");
    }

    #[tokio::test]
    async fn test_both_fail() {
        let primary = Arc::new(ScriptedProvider::new().then_fail("down"));
        let secondary = Arc::new(ScriptedProvider::new().then_fail("also down"));
        let provider = FallbackProvider::new(primary, secondary);

        let err = provider.complete(&request()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("also down"));
    }
}
