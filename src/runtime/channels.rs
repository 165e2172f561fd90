//! Channel type definitions for agent communication
//!
//! Every agent owns exactly one inbox:
//! - **Inbox channel** (unbounded mpsc): the bus holds the sender, the agent's
//!   receive loop holds the receiver. One producer handle per registration, one
//!   consumer, FIFO per sender.
//! - **Reply channel** (unbounded mpsc): used by drivers that want to await
//!   messages delivered to a coordinator agent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::core::Message;

// ============================================================================
// Channel Type Aliases
// ============================================================================

/// Sender half of an agent inbox (held by the bus)
pub type InboxSender = mpsc::UnboundedSender<Arc<Message>>;

/// Receiver half of an agent inbox (held by the agent's receive loop)
pub type InboxReceiver = mpsc::UnboundedReceiver<Arc<Message>>;

/// Sender half of a reply channel (held by a forwarding handler)
pub type ReplySender = mpsc::UnboundedSender<Arc<Message>>;

/// Receiver half of a reply channel (held by the driver)
pub type ReplyReceiver = mpsc::UnboundedReceiver<Arc<Message>>;

// ============================================================================
// Channel Creation
// ============================================================================

/// Create a new inbox channel pair
pub fn create_inbox() -> (InboxSender, InboxReceiver) {
    mpsc::unbounded_channel()
}

/// Create a new reply channel pair
pub fn create_reply_channel() -> (ReplySender, ReplyReceiver) {
    mpsc::unbounded_channel()
}

// ============================================================================
// Running flag
// ============================================================================

/// Lifecycle flag shared between an agent's receive loop and its driver
///
/// Clearing the flag wakes a loop that is parked on an empty inbox. A wakeup
/// issued while the loop is busy is stored and consumed on its next wait.
#[derive(Debug, Default)]
pub struct RunningFlag {
    running: AtomicBool,
    wake: Notify,
}

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolves after the next `stop()` (or immediately if one is pending)
    pub async fn stopped(&self) {
        self.wake.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AgentId, MessageKind};
    use std::time::Duration;

    fn msg(text: &str) -> Arc<Message> {
        Arc::new(Message::direct(
            AgentId::from("a"),
            AgentId::from("b"),
            text,
            MessageKind::Default,
        ))
    }

    #[tokio::test]
    async fn test_inbox_is_fifo() {
        let (tx, mut rx) = create_inbox();

        tx.send(msg("one")).unwrap();
        tx.send(msg("two")).unwrap();
        tx.send(msg("three")).unwrap();

        assert_eq!(rx.recv().await.unwrap().text(), "one");
        assert_eq!(rx.recv().await.unwrap().text(), "two");
        assert_eq!(rx.recv().await.unwrap().text(), "three");
    }

    #[tokio::test]
    async fn test_inbox_close() {
        let (tx, mut rx) = create_inbox();

        // Drop sender
        drop(tx);

        // Receiver should get None
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_wakes_waiter() {
        let flag = Arc::new(RunningFlag::new());
        flag.start();
        assert!(flag.is_running());

        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.stopped().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert!(!flag.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_wait_is_not_lost() {
        let flag = RunningFlag::new();
        flag.start();
        flag.stop();

        tokio::time::timeout(Duration::from_secs(1), flag.stopped())
            .await
            .expect("stored wakeup should resolve immediately");
    }
}
