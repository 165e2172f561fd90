//! The set of agents a pipeline run talks to
//!
//! Every run gets a fresh bus with a coordinator agent whose handler
//! forwards everything it receives to a [`ReplyWaiter`]. Requests go out as
//! the coordinator, so specialist replies route back to it.

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AgentProfile, AiHandler};
use crate::core::{AgentId, FrameworkResult, MessageKind, Payload};
use crate::llm::CompletionProvider;
use crate::runtime::{create_reply_channel, AgentHandle, ForwardHandler, MessageBus};

use super::config::{BuildConfig, TaskCategory};
use super::waiter::ReplyWaiter;

/// Upper bound on how long shutdown waits for an agent to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the handler for one specialist role
pub(crate) fn specialist(
    config: &BuildConfig,
    provider: Arc<dyn CompletionProvider>,
    base: AgentProfile,
    category: TaskCategory,
    request: MessageKind,
    reply: MessageKind,
) -> AiHandler {
    AiHandler::new(config.profile(base, category), provider)
        .accepting([request])
        .with_reply_kind(reply)
        .with_retry(config.retry)
        .with_retention(config.retention)
}

pub(crate) struct Crew {
    bus: MessageBus,
    coordinator: AgentHandle,
    members: Vec<AgentHandle>,
    waiter: ReplyWaiter,
    grace: Duration,
}

impl Crew {
    pub async fn start(config: &BuildConfig) -> FrameworkResult<Self> {
        let bus = MessageBus::new();
        let (tx, rx) = create_reply_channel();
        let coordinator = bus
            .spawn_agent("Coordinator", ForwardHandler::new(tx))
            .await?;

        Ok(Self {
            bus,
            coordinator,
            members: Vec::new(),
            waiter: ReplyWaiter::new(rx, config.step_timeout, config.poll_interval),
            grace: config.step_timeout.min(SHUTDOWN_GRACE),
        })
    }

    /// Spawn a specialist and return its identity
    pub async fn hire(&mut self, name: &str, handler: AiHandler) -> FrameworkResult<AgentId> {
        let handle = self.bus.spawn_agent(name, handler).await?;
        let id = handle.id().clone();
        self.members.push(handle);
        Ok(id)
    }

    /// Send a request as the coordinator and wait for the matching reply
    pub async fn ask(
        &mut self,
        to: &AgentId,
        payload: impl Into<Payload>,
        request: MessageKind,
        reply: MessageKind,
        step: &str,
    ) -> FrameworkResult<String> {
        tracing::debug!(step, kind = %request, "Sending request");
        self.coordinator.send(to, payload, request).await?;
        let message = self.waiter.expect(to, &reply, step).await?;
        Ok(message.payload().to_prompt_text())
    }

    /// Stop every agent and wait a bounded time for each loop to drain
    ///
    /// An agent still blocked on a completion call past the grace period is
    /// left to finish on its own.
    pub async fn dismiss(self) {
        for handle in self.members.iter().chain(std::iter::once(&self.coordinator)) {
            handle.stop();
        }

        for handle in self.members.iter().chain(std::iter::once(&self.coordinator)) {
            match tokio::time::timeout(self.grace, handle.join()).await {
                Ok(Ok(stats)) => {
                    tracing::debug!(agent = handle.name(), handled = stats.handled, failed = stats.failed, "Agent stopped")
                }
                Ok(Err(e)) => tracing::warn!(agent = handle.name(), error = %e, "Agent did not stop cleanly"),
                Err(_) => tracing::warn!(
                    agent = handle.name(),
                    grace_secs = self.grace.as_secs_f64(),
                    "Agent still busy after shutdown grace period"
                ),
            }
        }
    }
}

impl Drop for Crew {
    fn drop(&mut self) {
        // a run that bails early still clears every running flag
        for handle in &self.members {
            handle.stop();
        }
        self.coordinator.stop();
    }
}
