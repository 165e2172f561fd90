//! AgentContext - what a handler sees while processing a message
//!
//! The context carries the agent's identity, a clone of the bus it is
//! registered on, and the agent's message log. Handlers use it to reply,
//! forward, publish and broadcast without holding a reference to the agent.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::{AgentId, BusResult, Message, MessageKind, Payload};

use super::bus::MessageBus;

/// Messages recorded by an agent (shared with its handle)
pub type MessageLog = Arc<Mutex<Vec<Arc<Message>>>>;

/// Create an empty message log
pub fn new_message_log() -> MessageLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Handler-side view of an agent
#[derive(Clone)]
pub struct AgentContext {
    id: AgentId,
    name: String,
    bus: MessageBus,
    log: MessageLog,
}

impl AgentContext {
    pub fn new(id: AgentId, name: impl Into<String>, bus: MessageBus, log: MessageLog) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            log,
        }
    }

    /// Identity of the agent this context belongs to
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Display name of the agent
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus the agent is registered on
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Send a direct message from this agent
    pub async fn send(
        &self,
        to: &AgentId,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<()> {
        self.bus.send_to_agent(&self.id, to, payload, kind).await
    }

    /// Send a direct message back to the sender of `message`
    pub async fn reply(
        &self,
        message: &Message,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<()> {
        self.send(message.sender(), payload, kind).await
    }

    /// Publish to a topic from this agent
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<usize> {
        self.bus.publish(&self.id, topic, payload, kind).await
    }

    /// Broadcast to every other registered agent
    pub async fn broadcast(
        &self,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<usize> {
        self.bus.broadcast(&self.id, payload, kind).await
    }

    /// Append a message to this agent's log
    pub async fn record(&self, message: Arc<Message>) {
        self.log.lock().await.push(message);
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
