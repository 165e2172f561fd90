//! Agent - an addressable unit with an inbox and a handler
//!
//! An `Agent` is constructed against an explicit [`MessageBus`], registered on
//! it, then either driven directly with [`Agent::run`] or moved into a tokio
//! task with [`Agent::spawn`], which returns an [`AgentHandle`].
//!
//! The receive loop keeps taking messages while the running flag is set and
//! parks when the inbox is empty. Once the flag is cleared it drains whatever
//! is already queued and exits, so in-flight replies are not lost.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;

use crate::core::{AgentId, BusResult, Message, MessageKind, Payload};

use super::bus::MessageBus;
use super::channels::{create_inbox, InboxReceiver, InboxSender, RunningFlag};
use super::context::{new_message_log, AgentContext, MessageLog};
use super::handle::AgentHandle;
use super::handler::{BoxedHandler, MessageHandler, RecordingHandler};

/// Shared slot holding an agent's current handler
pub(crate) type HandlerSlot = Arc<Mutex<BoxedHandler>>;

/// Counters reported when a receive loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Messages the handler processed without error
    pub handled: usize,
    /// Messages whose handler returned an error or panicked
    pub failed: usize,
}

impl LoopStats {
    /// Total messages taken from the inbox
    pub fn total(&self) -> usize {
        self.handled + self.failed
    }
}

/// An agent that has not been started yet
pub struct Agent {
    id: AgentId,
    name: String,
    bus: MessageBus,
    inbox_tx: InboxSender,
    inbox_rx: InboxReceiver,
    running: Arc<RunningFlag>,
    handler: HandlerSlot,
    log: MessageLog,
}

impl Agent {
    /// Create an agent with a generated identity and default name
    pub fn new(bus: &MessageBus) -> Self {
        let id = AgentId::generate();
        let name = format!("Agent-{}", id.short());
        Self::build(bus, id, name)
    }

    /// Create an agent with a generated identity and a display name
    pub fn named(bus: &MessageBus, name: impl Into<String>) -> Self {
        Self::build(bus, AgentId::generate(), name.into())
    }

    /// Create an agent with an explicit identity and display name
    pub fn with_id(bus: &MessageBus, id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self::build(bus, id.into(), name.into())
    }

    fn build(bus: &MessageBus, id: AgentId, name: String) -> Self {
        let (inbox_tx, inbox_rx) = create_inbox();
        Self {
            id,
            name,
            bus: bus.clone(),
            inbox_tx,
            inbox_rx,
            running: Arc::new(RunningFlag::new()),
            handler: Arc::new(Mutex::new(Box::new(RecordingHandler))),
            log: new_message_log(),
        }
    }

    /// Replace the default handler (builder style)
    pub fn with_handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Arc::new(Mutex::new(Box::new(handler)));
        self
    }

    /// Replace the handler
    pub async fn set_handler(&self, handler: impl MessageHandler + 'static) {
        *self.handler.lock().await = Box::new(handler);
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender half of the inbox, handed to the bus on registration
    pub(crate) fn inbox_sender(&self) -> InboxSender {
        self.inbox_tx.clone()
    }

    /// Send a direct message from this agent via the bus
    pub async fn send(
        &self,
        to: &AgentId,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<()> {
        self.bus.send_to_agent(&self.id, to, payload, kind).await
    }

    /// Take the next queued message without waiting
    ///
    /// Useful for drivers that poll an agent they never start.
    pub fn try_receive(&mut self) -> Option<Arc<Message>> {
        self.inbox_rx.try_recv().ok()
    }

    /// Messages recorded by the handler so far
    pub async fn received(&self) -> Vec<Arc<Message>> {
        self.log.lock().await.clone()
    }

    /// Run the receive loop on the current task until stopped and drained
    ///
    /// Without a handle nothing can clear the running flag, so this returns
    /// only once every inbox sender is gone (the agent was unregistered).
    pub async fn run(self) -> LoopStats {
        self.running.start();
        self.receive_loop().await
    }

    /// Move the agent into its own task and return a handle to it
    pub fn spawn(self) -> AgentHandle {
        self.running.start();

        let handle_parts = (
            self.id.clone(),
            self.name.clone(),
            self.bus.clone(),
            self.running.clone(),
            self.handler.clone(),
            self.log.clone(),
        );

        tracing::info!(agent = %self.name, id = %self.id.short(), "Agent started");
        let task = tokio::spawn(self.receive_loop());

        let (id, name, bus, running, handler, log) = handle_parts;
        AgentHandle::new(id, name, bus, running, handler, log, task)
    }

    async fn receive_loop(self) -> LoopStats {
        let Agent {
            id,
            name,
            bus,
            inbox_tx,
            mut inbox_rx,
            running,
            handler,
            log,
        } = self;

        // Only the bus keeps the inbox open from here on
        drop(inbox_tx);

        let ctx = AgentContext::new(id, name, bus, log);
        let mut stats = LoopStats::default();
        let mut closed = false;

        loop {
            let next = if running.is_running() {
                tokio::select! {
                    biased;
                    message = inbox_rx.recv() => message,
                    _ = running.stopped() => continue,
                }
            } else {
                // Refuse new sends, then hand every accepted message to the handler
                if !closed {
                    inbox_rx.close();
                    closed = true;
                }
                inbox_rx.recv().await
            };

            let Some(message) = next else {
                break;
            };

            dispatch(&ctx, &handler, message, &mut stats).await;
        }

        tracing::info!(
            agent = %ctx.name(),
            handled = stats.handled,
            failed = stats.failed,
            "Agent stopped"
        );

        stats
    }
}

/// Invoke the handler for one message, containing any error or panic
async fn dispatch(
    ctx: &AgentContext,
    handler: &HandlerSlot,
    message: Arc<Message>,
    stats: &mut LoopStats,
) {
    let kind = message.kind().clone();
    let mut handler = handler.lock().await;

    let outcome = AssertUnwindSafe(handler.handle(ctx, message))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => stats.handled += 1,
        Ok(Err(e)) => {
            stats.failed += 1;
            tracing::error!(agent = %ctx.name(), kind = %kind, error = %e, "Handler failed");
        }
        Err(panic) => {
            stats.failed += 1;
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(agent = %ctx.name(), kind = %kind, panic = %reason, "Handler panicked");
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
