//! MessageBus - in-process router between agents
//!
//! The bus owns two tables behind a single lock:
//! - the directory, mapping each registered identity to its inbox sender
//! - the topic table, mapping each topic to its subscriber identities
//!
//! Registration changes take the write lock. Deliveries hold the read lock
//! while enqueuing, so a message is never routed to an agent that is halfway
//! through being removed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::{AgentId, BusError, BusResult, Message, MessageKind, Payload};

use super::agent::Agent;
use super::channels::InboxSender;
use super::handle::AgentHandle;
use super::handler::MessageHandler;

struct Mailbox {
    name: String,
    inbox: InboxSender,
}

#[derive(Default)]
struct Directory {
    agents: HashMap<AgentId, Mailbox>,
    topics: HashMap<String, HashSet<AgentId>>,
}

/// Router for direct, broadcast and topic delivery
///
/// Cheap to clone; clones share the same directory. Construct one per driver
/// run and hand it to every agent at construction time.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Arc<RwLock<Directory>>,
}

impl MessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Register an agent
    ///
    /// Fails with `DuplicateIdentity` if the identity is already taken.
    pub async fn register(&self, agent: &Agent) -> BusResult<()> {
        let mut dir = self.inner.write().await;
        if dir.agents.contains_key(agent.id()) {
            return Err(BusError::DuplicateIdentity(agent.id().clone()));
        }

        dir.agents.insert(
            agent.id().clone(),
            Mailbox {
                name: agent.name().to_string(),
                inbox: agent.inbox_sender(),
            },
        );

        tracing::info!(agent = %agent.name(), id = %agent.id().short(), "Registered agent");
        Ok(())
    }

    /// Create, register and spawn a named agent in one step
    pub async fn spawn_agent(
        &self,
        name: impl Into<String>,
        handler: impl MessageHandler + 'static,
    ) -> BusResult<AgentHandle> {
        let agent = Agent::named(self, name).with_handler(handler);
        self.register(&agent).await?;
        Ok(agent.spawn())
    }

    /// Remove an agent and every subscription that references it
    ///
    /// Returns `false` if the agent was not registered.
    pub async fn unregister(&self, agent_id: &AgentId) -> bool {
        let mut dir = self.inner.write().await;
        let Some(mailbox) = dir.agents.remove(agent_id) else {
            return false;
        };

        dir.topics.retain(|_, subscribers| {
            subscribers.remove(agent_id);
            !subscribers.is_empty()
        });

        tracing::info!(agent = %mailbox.name, id = %agent_id.short(), "Unregistered agent");
        true
    }

    /// Whether an identity is registered
    pub async fn contains(&self, agent_id: &AgentId) -> bool {
        self.inner.read().await.agents.contains_key(agent_id)
    }

    /// All registered identities (unordered)
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        self.inner.read().await.agents.keys().cloned().collect()
    }

    /// Display name of a registered agent
    pub async fn name_of(&self, agent_id: &AgentId) -> Option<String> {
        self.inner
            .read()
            .await
            .agents
            .get(agent_id)
            .map(|m| m.name.clone())
    }

    /// Number of registered agents
    pub async fn len(&self) -> usize {
        self.inner.read().await.agents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Send a direct message
    ///
    /// Fire-and-forget: returns as soon as the message is queued. Fails with
    /// `UnknownRecipient` without enqueuing anything if `to` is not registered.
    pub async fn send_to_agent(
        &self,
        from: &AgentId,
        to: &AgentId,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<()> {
        let dir = self.inner.read().await;
        let mailbox = dir
            .agents
            .get(to)
            .ok_or_else(|| BusError::UnknownRecipient(to.clone()))?;

        let message = Message::direct(from.clone(), to.clone(), payload, kind.into());
        tracing::debug!(
            from = %from.short(),
            to = %mailbox.name,
            kind = %message.kind(),
            "Direct message"
        );

        mailbox
            .inbox
            .send(Arc::new(message))
            .map_err(|_| BusError::InboxClosed(to.clone()))
    }

    /// Send to every registered agent except the sender
    ///
    /// Returns the number of inboxes reached. Agents whose loop has already
    /// exited are skipped.
    pub async fn broadcast(
        &self,
        from: &AgentId,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<usize> {
        let payload = payload.into();
        let kind = kind.into();
        let dir = self.inner.read().await;

        let mut delivered = 0;
        for (id, mailbox) in dir.agents.iter().filter(|(id, _)| *id != from) {
            let message = Message::direct(from.clone(), id.clone(), payload.clone(), kind.clone());
            if mailbox.inbox.send(Arc::new(message)).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(to = %mailbox.name, "Skipping closed inbox during broadcast");
            }
        }

        tracing::debug!(from = %from.short(), kind = %kind, delivered, "Broadcast");
        Ok(delivered)
    }

    // =========================================================================
    // Topics
    // =========================================================================

    /// Subscribe a registered agent to a topic
    ///
    /// Subscribing twice is harmless. Fails with `UnknownAgent` if the agent is
    /// not registered.
    pub async fn subscribe(&self, agent_id: &AgentId, topic: &str) -> BusResult<()> {
        let mut dir = self.inner.write().await;
        if !dir.agents.contains_key(agent_id) {
            return Err(BusError::UnknownAgent(agent_id.clone()));
        }

        if dir
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(agent_id.clone())
        {
            tracing::debug!(agent = %agent_id.short(), topic, "Subscribed");
        }
        Ok(())
    }

    /// Remove a subscription
    ///
    /// Returns `false` if there was nothing to remove.
    pub async fn unsubscribe(&self, agent_id: &AgentId, topic: &str) -> bool {
        let mut dir = self.inner.write().await;
        let Some(subscribers) = dir.topics.get_mut(topic) else {
            return false;
        };

        let removed = subscribers.remove(agent_id);
        if subscribers.is_empty() {
            dir.topics.remove(topic);
        }
        removed
    }

    /// Publish to every current subscriber of a topic
    ///
    /// A topic with no subscribers is a no-op returning `Ok(0)`. All
    /// subscribers share one `Arc<Message>`.
    pub async fn publish(
        &self,
        from: &AgentId,
        topic: &str,
        payload: impl Into<Payload>,
        kind: impl Into<MessageKind>,
    ) -> BusResult<usize> {
        let dir = self.inner.read().await;
        let Some(subscribers) = dir.topics.get(topic) else {
            tracing::debug!(topic, "No subscribers for topic");
            return Ok(0);
        };

        let message = Arc::new(Message::topic(from.clone(), topic, payload, kind.into()));

        let mut delivered = 0;
        for id in subscribers {
            let Some(mailbox) = dir.agents.get(id) else {
                continue;
            };
            if mailbox.inbox.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(to = %mailbox.name, topic, "Skipping closed inbox during publish");
            }
        }

        tracing::debug!(from = %from.short(), topic, delivered, "Published");
        Ok(delivered)
    }

    /// Current subscribers of a topic
    pub async fn subscribers(&self, topic: &str) -> Vec<AgentId> {
        self.inner
            .read()
            .await
            .topics
            .get(topic)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Topics that have at least one subscriber
    pub async fn topics(&self) -> Vec<String> {
        self.inner.read().await.topics.keys().cloned().collect()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn registered(bus: &MessageBus, id: &str) -> Agent {
        let agent = Agent::with_id(bus, id, id);
        bus.register(&agent).await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_register_duplicate_identity() {
        let bus = MessageBus::new();
        let _first = registered(&bus, "writer").await;
        let second = Agent::with_id(&bus, "writer", "Another Writer");

        let err = bus.register(&second).await.unwrap_err();
        assert_eq!(err, BusError::DuplicateIdentity(AgentId::from("writer")));
        assert_eq!(bus.len().await, 1);
        assert_eq!(bus.name_of(&AgentId::from("writer")).await.as_deref(), Some("writer"));
    }

    #[tokio::test]
    async fn test_unknown_recipient_never_enqueues() {
        let bus = MessageBus::new();
        let mut a = registered(&bus, "a").await;
        let mut b = registered(&bus, "b").await;

        let err = bus
            .send_to_agent(a.id(), &AgentId::from("nobody"), "hello", MessageKind::Default)
            .await
            .unwrap_err();
        assert_eq!(err, BusError::UnknownRecipient(AgentId::from("nobody")));

        assert!(a.try_receive().is_none());
        assert!(b.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_send_to_agent_delivers() {
        let bus = MessageBus::new();
        let a = registered(&bus, "a").await;
        let mut b = registered(&bus, "b").await;

        bus.send_to_agent(a.id(), b.id(), "ping", "question").await.unwrap();

        let msg = b.try_receive().unwrap();
        assert_eq!(msg.text(), "ping");
        assert_eq!(*msg.kind(), MessageKind::Question);
        assert_eq!(msg.sender(), a.id());
        assert_eq!(msg.recipient(), Some(b.id()));
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let bus = MessageBus::new();
        let mut a = registered(&bus, "a").await;
        let mut b = registered(&bus, "b").await;
        let mut c = registered(&bus, "c").await;

        let delivered = bus
            .broadcast(a.id(), "standup", MessageKind::Broadcast)
            .await
            .unwrap();
        assert_eq!(delivered, 2);

        assert!(a.try_receive().is_none());
        let to_b = b.try_receive().unwrap();
        let to_c = c.try_receive().unwrap();
        assert_eq!(to_b.recipient(), Some(b.id()));
        assert_eq!(to_c.recipient(), Some(c.id()));
        assert!(b.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_agent() {
        let bus = MessageBus::new();
        let err = bus
            .subscribe(&AgentId::from("ghost"), "builds")
            .await
            .unwrap_err();
        assert_eq!(err, BusError::UnknownAgent(AgentId::from("ghost")));
        assert!(bus.topics().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = MessageBus::new();
        let a = registered(&bus, "a").await;

        let delivered = tokio::time::timeout(
            Duration::from_millis(100),
            bus.publish(a.id(), "empty-topic", "anyone?", MessageKind::Default),
        )
        .await
        .expect("publish must not block")
        .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_topic_fanout_scenario() {
        let bus = MessageBus::new();
        let ci = registered(&bus, "ci").await;
        let mut writer = registered(&bus, "writer").await;
        let mut tester = registered(&bus, "tester").await;
        let mut bystander = registered(&bus, "bystander").await;

        bus.subscribe(writer.id(), "builds").await.unwrap();
        bus.subscribe(tester.id(), "builds").await.unwrap();
        // Duplicate subscription must not double-deliver
        bus.subscribe(tester.id(), "builds").await.unwrap();

        let delivered = bus
            .publish(ci.id(), "builds", "build #1 finished", MessageKind::Default)
            .await
            .unwrap();
        assert_eq!(delivered, 2);

        for agent in [&mut writer, &mut tester] {
            let msg = agent.try_receive().expect("subscriber gets one copy");
            assert_eq!(msg.topic_name(), Some("builds"));
            assert_eq!(msg.text(), "build #1 finished");
            assert!(agent.try_receive().is_none());
        }
        assert!(bystander.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_unregister_clears_subscriptions() {
        let bus = MessageBus::new();
        let writer = registered(&bus, "writer").await;
        let tester = registered(&bus, "tester").await;

        bus.subscribe(writer.id(), "builds").await.unwrap();
        bus.subscribe(writer.id(), "reviews").await.unwrap();
        bus.subscribe(tester.id(), "builds").await.unwrap();

        assert!(bus.unregister(writer.id()).await);
        assert!(!bus.unregister(writer.id()).await);

        assert_eq!(bus.subscribers("builds").await, vec![tester.id().clone()]);
        assert!(bus.subscribers("reviews").await.is_empty());
        assert_eq!(bus.topics().await, vec!["builds".to_string()]);
        assert!(!bus.contains(writer.id()).await);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = MessageBus::new();
        let mut writer = registered(&bus, "writer").await;

        bus.subscribe(writer.id(), "builds").await.unwrap();
        assert!(bus.unsubscribe(writer.id(), "builds").await);
        assert!(!bus.unsubscribe(writer.id(), "builds").await);

        let delivered = bus
            .publish(writer.id(), "builds", "nobody home", MessageKind::Default)
            .await
            .unwrap();
        assert_eq!(delivered, 0);
        assert!(writer.try_receive().is_none());
    }

    #[tokio::test]
    async fn test_publisher_receives_own_message_when_subscribed() {
        let bus = MessageBus::new();
        let mut writer = registered(&bus, "writer").await;
        bus.subscribe(writer.id(), "builds").await.unwrap();

        let delivered = bus
            .publish(writer.id(), "builds", "self", MessageKind::Default)
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert!(writer.try_receive().is_some());
    }

    #[tokio::test]
    async fn test_inbox_closed_after_loop_exit() {
        let bus = MessageBus::new();
        let a = registered(&bus, "a").await;
        let b = registered(&bus, "b").await;
        let b_id = b.id().clone();

        let handle = b.spawn();
        handle.shutdown().await.unwrap();

        let err = bus
            .send_to_agent(a.id(), &b_id, "late", MessageKind::Default)
            .await
            .unwrap_err();
        assert_eq!(err, BusError::InboxClosed(b_id));
    }
}
