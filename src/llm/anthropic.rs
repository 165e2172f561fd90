//! Anthropic Messages API client
//!
//! System instructions travel out of band (`system` field); system-role turns
//! in the request are folded into it because the API only accepts
//! user/assistant messages.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Role;

use super::auth::AuthConfig;
use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest, Usage};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn build_messages_request(request: &CompletionRequest) -> MessagesRequest<'_> {
    let messages = request
        .turns
        .iter()
        .filter(|t| t.role != Role::System)
        .map(|t| WireMessage {
            role: t.role.as_str(),
            content: &t.content,
        })
        .collect();

    MessagesRequest {
        model: &request.model,
        max_tokens: request.max_tokens,
        messages,
        system: request.merged_system(),
        temperature: request.temperature,
    }
}

fn parse_messages_response(body: &str) -> Result<Completion> {
    let response: MessagesResponse =
        serde_json::from_str(body).context("Failed to parse Anthropic response")?;

    // Extract text from content blocks
    let text = response
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    Ok(Completion {
        text,
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
    })
}

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: Client,
    auth: AuthConfig,
}

impl AnthropicProvider {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }

    /// Create a new Anthropic provider from environment variables
    ///
    /// Reads `ANTHROPIC_API_KEY` (required) and `ANTHROPIC_BASE_URL` (optional).
    pub fn from_env() -> Result<Self> {
        tracing::info!("Creating Anthropic provider from environment");
        let auth = AuthConfig::from_env("ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL")
            .context("Failed to create Anthropic client. Make sure ANTHROPIC_API_KEY is set")?;
        Ok(Self::new(auth))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.auth.base_url_or(DEFAULT_API_BASE))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        tracing::info!("Sending message to Anthropic API");
        tracing::debug!("Model: {}", request.model);
        tracing::debug!("Conversation length: {} turns", request.turns.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.auth.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&build_messages_request(request))
            .send()
            .await
            .context("Failed to send message")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read Anthropic response body")?;

        if !status.is_success() {
            tracing::error!("Anthropic API error: {} - {}", status, response_text);
            anyhow::bail!("Anthropic API error ({}): {}", status, response_text);
        }

        let completion = parse_messages_response(&response_text)?;
        tracing::info!("Extracted text response, length: {} chars", completion.text.len());
        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[test]
    fn test_system_turns_fold_into_system_field() {
        let request = CompletionRequest::new("claude-haiku-4-5")
            .with_system("You review code")
            .with_turns([
                Turn::system("Context: Message from writer of type code_review_request"),
                Turn::user("def f(): pass"),
            ]);

        let json = serde_json::to_value(build_messages_request(&request)).unwrap();
        assert_eq!(
            json["system"],
            "You review code\n\nContext: Message from writer of type code_review_request"
        );
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_joins_text_blocks() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "model": "claude-haiku-4-5",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Looks "},
                {"type": "text", "text": "good."}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 3}
        }"#;

        let completion = parse_messages_response(body).unwrap();
        assert_eq!(completion.text, "Looks good.");
        assert_eq!(completion.usage.unwrap().output_tokens, 3);
    }
}
