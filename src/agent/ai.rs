//! AI-backed message handler
//!
//! `AiHandler` turns each accepted message into a completion request:
//! system prompt, a context line naming the sender and kind, the retained
//! history, then the message text as the new user turn. The completion is
//! sent to the original sender or to a configured next hop.
//!
//! ```ignore
//! let writer = AiHandler::new(AgentProfile::code_writer(), provider.clone())
//!     .accepting([MessageKind::CodeRequest])
//!     .with_reply_kind(MessageKind::CodeResponse)
//!     .with_retry(RetryPolicy::default());
//! let writer = bus.spawn_agent("CodeWriter", writer).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::conversation::{ConversationHistory, RetentionPolicy, Turn};
use crate::core::{AgentId, Message, MessageKind};
use crate::llm::{complete_with_retry, CompletionProvider, CompletionRequest, RetryPolicy};
use crate::runtime::{AgentContext, MessageHandler};

use super::profile::AgentProfile;

/// History shared between a handler and whoever wants to inspect it
pub type SharedHistory = Arc<Mutex<ConversationHistory>>;

/// Where an AI agent sends its completions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyRoute {
    /// Back to whoever sent the request
    #[default]
    ToSender,
    /// On to a fixed agent
    ToAgent(AgentId),
}

/// Message handler backed by a completion provider
pub struct AiHandler {
    profile: AgentProfile,
    provider: Arc<dyn CompletionProvider>,
    accepts: HashSet<MessageKind>,
    reply_kind: MessageKind,
    route: ReplyRoute,
    retry: RetryPolicy,
    history: SharedHistory,
}

impl AiHandler {
    /// Create a handler that answers questions, queries and untyped messages
    pub fn new(profile: AgentProfile, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            profile,
            provider,
            accepts: [MessageKind::Question, MessageKind::Query, MessageKind::Default]
                .into_iter()
                .collect(),
            reply_kind: MessageKind::AiResponse,
            route: ReplyRoute::ToSender,
            retry: RetryPolicy::default(),
            history: Arc::new(Mutex::new(ConversationHistory::default())),
        }
    }

    /// Replace the set of kinds sent to the provider
    pub fn accepting(mut self, kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        self.accepts = kinds.into_iter().collect();
        self
    }

    /// Add one kind to the accepted set
    pub fn also_accepting(mut self, kind: MessageKind) -> Self {
        self.accepts.insert(kind);
        self
    }

    pub fn with_reply_kind(mut self, kind: MessageKind) -> Self {
        self.reply_kind = kind;
        self
    }

    pub fn with_route(mut self, route: ReplyRoute) -> Self {
        self.route = route;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Start from an empty history with the given retention policy
    pub fn with_retention(mut self, policy: RetentionPolicy) -> Self {
        self.history = Arc::new(Mutex::new(ConversationHistory::new(policy)));
        self
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Handle on the conversation history
    ///
    /// Take it before the handler is moved into an agent.
    pub fn history(&self) -> SharedHistory {
        self.history.clone()
    }

    pub fn accepts(&self, kind: &MessageKind) -> bool {
        self.accepts.contains(kind)
    }

    fn destination(&self, message: &Message) -> AgentId {
        match &self.route {
            ReplyRoute::ToSender => message.sender().clone(),
            ReplyRoute::ToAgent(id) => id.clone(),
        }
    }

    fn build_request(&self, context: String, history: &ConversationHistory, prompt: &str) -> CompletionRequest {
        let mut request = CompletionRequest::new(self.profile.model.as_str())
            .with_max_tokens(self.profile.max_tokens)
            .with_system(self.profile.system_prompt.as_str())
            .with_turns(
                std::iter::once(Turn::system(context))
                    .chain(history.turns().iter().cloned())
                    .chain(std::iter::once(Turn::user(prompt))),
            );
        request.temperature = self.profile.temperature;
        request
    }

    async fn respond(&self, ctx: &AgentContext, message: &Message) -> Result<()> {
        let prompt = message.payload().to_prompt_text();
        let sender = ctx
            .bus()
            .name_of(message.sender())
            .await
            .unwrap_or_else(|| message.sender().to_string());
        let context = format!("Context: Message from {} of type {}", sender, message.kind());

        let request = {
            let history = self.history.lock().await;
            self.build_request(context, &history, &prompt)
        };
        let destination = self.destination(message);

        tracing::info!(
            agent = %ctx.name(),
            role = %self.profile.role,
            model = %self.profile.model,
            kind = %message.kind(),
            "Requesting completion"
        );

        match complete_with_retry(self.provider.as_ref(), &request, &self.retry).await {
            Ok(completion) => {
                self.history
                    .lock()
                    .await
                    .push_exchange(prompt, completion.text.clone());

                tracing::debug!(
                    agent = %ctx.name(),
                    to = %destination.short(),
                    chars = completion.text.len(),
                    "Sending completion"
                );
                ctx.send(&destination, completion.text, self.reply_kind.clone())
                    .await?;
                Ok(())
            }
            Err(err) => {
                let notice = json!({
                    "agent": ctx.name(),
                    "request_kind": message.kind().as_str(),
                    "error": err.to_string(),
                });
                if let Err(send_err) = ctx.send(&destination, notice, MessageKind::Failure).await {
                    tracing::warn!(agent = %ctx.name(), error = %send_err, "Could not report failure");
                }
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl MessageHandler for AiHandler {
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()> {
        ctx.record(message.clone()).await;

        if !self.accepts(message.kind()) {
            tracing::debug!(
                agent = %ctx.name(),
                kind = %message.kind(),
                unrecognized = message.kind().is_unrecognized(),
                "Kind not handled by this agent, recorded only"
            );
            return Ok(());
        }

        self.respond(ctx, &message).await
    }
}

impl std::fmt::Debug for AiHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiHandler")
            .field("role", &self.profile.role)
            .field("model", &self.profile.model)
            .field("provider", &self.provider.provider_name())
            .field("reply_kind", &self.reply_kind)
            .field("route", &self.route)
            .finish()
    }
}
