//! Network-free provider used when no API key is configured

use anyhow::Result;

use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest};

/// Deterministic mock completions
///
/// Lets the pipelines run end to end without credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OfflineProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let prompt = request.last_user_text().unwrap_or_default();
        tracing::debug!(model = %request.model, "[Offline] Returning mock response");
        Ok(Completion::new(
            format!(
                "[Mock Response from {}]: I would respond to: {}",
                request.model, prompt
            ),
            request.model.clone(),
        ))
    }

    fn provider_name(&self) -> &str {
        "offline"
    }
}
