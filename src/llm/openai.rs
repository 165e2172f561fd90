//! OpenAI-compatible chat completions client
//!
//! Talks to `POST {base}/chat/completions`. Any server that speaks the same
//! protocol (Ollama, LM Studio, vLLM) works by pointing `OPENAI_BASE_URL` at it.
//!
//! ```ignore
//! // From environment variables
//! let llm = OpenAiProvider::from_env()?;
//!
//! // Local model server
//! let llm = OpenAiProvider::new(AuthConfig::with_base_url("unused", "http://localhost:11434/v1"));
//! ```

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::auth::AuthConfig;
use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest, Usage};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn build_chat_request(request: &CompletionRequest) -> ChatRequest<'_> {
    let mut messages = Vec::with_capacity(request.turns.len() + 1);
    if let Some(system) = &request.system {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.extend(request.turns.iter().map(|turn| ChatMessage {
        role: turn.role.as_str(),
        content: &turn.content,
    }));

    ChatRequest {
        model: &request.model,
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn parse_chat_response(body: &str, requested_model: &str) -> Result<Completion> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse OpenAI response")?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI response contained no message content")?;

    Ok(Completion {
        text,
        model: response.model.unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

// ============================================================================
// OpenAiProvider
// ============================================================================

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    client: Client,
    auth: AuthConfig,
}

impl OpenAiProvider {
    /// Create a provider with explicit credentials
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }

    /// Create a provider from environment variables
    ///
    /// Reads from:
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_BASE_URL` (optional)
    pub fn from_env() -> Result<Self> {
        tracing::info!("Creating OpenAI provider from environment");
        Ok(Self::new(AuthConfig::from_env("OPENAI_API_KEY", "OPENAI_BASE_URL")?))
    }

    /// Use a custom HTTP client (timeouts, proxies)
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.auth.base_url_or(DEFAULT_API_BASE))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = build_chat_request(request);
        tracing::debug!(
            model = %request.model,
            turns = request.turns.len(),
            "[OpenAI] Sending chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.auth.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read OpenAI response body")?;

        if !status.is_success() {
            tracing::error!("[OpenAI] API error: {} - {}", status, response_text);
            anyhow::bail!("OpenAI API error ({}): {}", status, response_text);
        }

        let completion = parse_chat_response(&response_text, &request.model)?;
        tracing::debug!(chars = completion.text.len(), "[OpenAI] Completion received");
        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
