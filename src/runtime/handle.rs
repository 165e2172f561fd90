//! AgentHandle - External interface for a running agent
//!
//! The `AgentHandle` is what drivers (pipelines, tests, the CLI) use to
//! interact with an agent after it was spawned. It provides methods to:
//! - Send, publish and broadcast as the agent
//! - Replace the agent's handler
//! - Read the agent's message log
//! - Stop the agent and wait for its loop to drain

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::{AgentId, BusResult, FrameworkError, FrameworkResult, Message, MessageKind, Payload};

use super::agent::{HandlerSlot, LoopStats};
use super::bus::MessageBus;
use super::channels::RunningFlag;
use super::context::MessageLog;
use super::handler::MessageHandler;

/// Handle for interacting with a running agent
///
/// It can be cloned and shared across tasks. Only one clone can `join`.
#[derive(Clone)]
pub struct AgentHandle {
    id: AgentId,
    name: String,
    bus: MessageBus,
    running: Arc<RunningFlag>,
    handler: HandlerSlot,
    log: MessageLog,
    task: Arc<Mutex<Option<JoinHandle<LoopStats>>>>,
}

impl AgentHandle {
    /// Create a new agent handle
    ///
    /// This is called by `Agent::spawn()`, not directly.
    pub(crate) fn new(
        id: AgentId,
        name: String,
        bus: MessageBus,
        running: Arc<RunningFlag>,
        handler: HandlerSlot,
        log: MessageLog,
        task: JoinHandle<LoopStats>,
    ) -> Self {
        Self {
            id,
            name,
            bus,
            running,
            handler,
            log,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Messaging as this agent
    // =========================================================================

    /// Send a direct message from this agent
    pub async fn send(
        &self,
        to: &AgentId,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<()> {
        self.bus.send_to_agent(&self.id, to, payload, kind).await
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

    /// Broadcast from this agent to every other registered agent
    pub async fn broadcast(
        &self,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<usize> {
        self.bus.broadcast(&self.id, payload, kind).await
    }

    // =========================================================================
    // Handler and log
    // =========================================================================

    /// Replace the handler
    ///
    /// Waits for the message currently being handled, if any; the new handler
    /// sees every message after it.
    pub async fn set_handler(&self, handler: impl MessageHandler + 'static) {
        *self.handler.lock().await = Box::new(handler);
    }

    /// Snapshot of the messages recorded by the agent
    pub async fn received(&self) -> Vec<Arc<Message>> {
        self.log.lock().await.clone()
    }

    /// Recorded messages of one kind
    pub async fn received_of(&self, kind: &MessageKind) -> Vec<Arc<Message>> {
        self.log
            .lock()
            .await
            .iter()
            .filter(|m| m.kind() == kind)
            .cloned()
            .collect()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Whether the running flag is still set
    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Clear the running flag
    ///
    /// The loop still handles every message already queued before exiting.
    pub fn stop(&self) {
        tracing::debug!(agent = %self.name, "Stop requested");
        self.running.stop();
    }

    /// Wait for the receive loop to exit
    pub async fn join(&self) -> FrameworkResult<LoopStats> {
        let task = self.task.lock().await.take().ok_or_else(|| {
            FrameworkError::other(format!("Agent {} was already joined", self.name))
        })?;

        task.await
            .map_err(|e| FrameworkError::other(format!("Agent {} task failed: {}", self.name, e)))
    }

    /// Stop the agent and wait for it to drain
    pub async fn shutdown(&self) -> FrameworkResult<LoopStats> {
        self.stop();
        self.join().await
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::agent::Agent;
    use crate::runtime::handler::{EchoHandler, RecordingHandler};

    #[tokio::test]
    async fn test_join_twice_fails() {
        let bus = MessageBus::new();
        let agent = Agent::with_id(&bus, "a", "A");
        bus.register(&agent).await.unwrap();

        let handle = agent.spawn();
        assert!(handle.is_running());
        handle.shutdown().await.unwrap();
        assert!(!handle.is_running());

        let err = handle.join().await.unwrap_err();
        assert!(err.to_string().contains("already joined"));
    }

    #[tokio::test]
    async fn test_set_handler_on_running_agent() {
        let bus = MessageBus::new();
        let driver = Agent::with_id(&bus, "driver", "Driver");
        let worker = Agent::with_id(&bus, "worker", "Worker").with_handler(RecordingHandler);
        bus.register(&driver).await.unwrap();
        bus.register(&worker).await.unwrap();

        let driver = driver.spawn();
        let worker = worker.spawn();

        worker.set_handler(EchoHandler).await;
        driver.send(worker.id(), "hello", MessageKind::Question).await.unwrap();

        worker.shutdown().await.unwrap();
        driver.shutdown().await.unwrap();

        let acks = driver.received_of(&MessageKind::Ack).await;
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].text(), "hello");
    }

    #[tokio::test]
    async fn test_publish_and_broadcast_from_handle() {
        let bus = MessageBus::new();
        let a = Agent::with_id(&bus, "a", "A");
        let mut b = Agent::with_id(&bus, "b", "B");
        bus.register(&a).await.unwrap();
        bus.register(&b).await.unwrap();
        bus.subscribe(b.id(), "news").await.unwrap();

        let a = a.spawn();
        assert_eq!(a.publish("news", "extra", MessageKind::Default).await.unwrap(), 1);
        assert_eq!(a.broadcast("all hands", MessageKind::Broadcast).await.unwrap(), 1);

        assert_eq!(b.try_receive().unwrap().text(), "extra");
        assert_eq!(b.try_receive().unwrap().text(), "all hands");
        a.shutdown().await.unwrap();
    }
}
