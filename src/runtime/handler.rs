//! Message handlers
//!
//! A handler is invoked once per message taken from an agent's inbox. It owns
//! whatever state it needs (`&mut self`) because only the agent's own receive
//! loop ever calls it.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::{Message, MessageKind};

use super::channels::ReplySender;
use super::context::AgentContext;

/// Per-message behavior of an agent
#[async_trait]
pub trait MessageHandler: Send {
    /// Handle one message
    ///
    /// Errors are logged by the receive loop and do not stop it.
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()>;
}

/// Boxed handler as stored in an agent's handler slot
pub type BoxedHandler = Box<dyn MessageHandler>;

// ============================================================================
// Built-in handlers
// ============================================================================

/// Default handler: records the message in the agent's log and nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordingHandler;

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()> {
        tracing::debug!(
            agent = %ctx.name(),
            from = %message.sender().short(),
            kind = %message.kind(),
            "Recorded message"
        );
        ctx.record(message).await;
        Ok(())
    }
}

/// Replies to every sender with an `Ack` carrying the original payload
///
/// Incoming `Ack`s are only recorded, so two echo agents never ping-pong.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()> {
        ctx.record(message.clone()).await;
        if *message.kind() == MessageKind::Ack {
            return Ok(());
        }
        ctx.reply(&message, message.payload().clone(), MessageKind::Ack)
            .await?;
        Ok(())
    }
}

/// Forwards every message into a channel so a driver can await it
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    tx: ReplySender,
}

impl ForwardHandler {
    pub fn new(tx: ReplySender) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MessageHandler for ForwardHandler {
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()> {
        ctx.record(message.clone()).await;
        self.tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("reply receiver for {} dropped", ctx.name()))
    }
}

/// Handler backed by an async closure
pub struct FnHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: FnMut(AgentContext, Arc<Message>) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&mut self, ctx: &AgentContext, message: Arc<Message>) -> Result<()> {
        (self.func)(ctx.clone(), message).await
    }
}

/// Create a handler from an async closure
///
/// # Example
///
/// ```ignore
/// agent.set_handler(handler_fn(|ctx, msg| async move {
///     ctx.reply(&msg, "got it", MessageKind::Ack).await?;
///     Ok(())
/// })).await;
/// ```
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: FnMut(AgentContext, Arc<Message>) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    FnHandler { func }
}
