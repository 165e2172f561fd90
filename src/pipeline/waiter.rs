//! Awaiting replies addressed to a pipeline's coordinator agent

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::core::{AgentId, FrameworkError, FrameworkResult, Message, MessageKind};
use crate::runtime::ReplyReceiver;

/// Receives the coordinator's forwarded messages and matches them to requests
///
/// Every request a pipeline sends produces exactly one reply (the expected
/// kind or `Failure`). When a wait times out the late reply is remembered as
/// stale and dropped on arrival, so it cannot be mistaken for the answer to
/// the next request sent to the same agent.
pub struct ReplyWaiter {
    rx: ReplyReceiver,
    timeout: Duration,
    poll_interval: Duration,
    stale: HashMap<AgentId, usize>,
}

impl ReplyWaiter {
    pub fn new(rx: ReplyReceiver, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            rx,
            timeout,
            poll_interval,
            stale: HashMap::new(),
        }
    }

    /// Wait for the next `kind` reply from `from`
    ///
    /// A `Failure` from `from` ends the wait with its error text. Messages
    /// from other agents or of other kinds are logged and skipped.
    pub async fn expect(
        &mut self,
        from: &AgentId,
        kind: &MessageKind,
        step: &str,
    ) -> FrameworkResult<Arc<Message>> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let tick = self.poll_interval.max(Duration::from_millis(10));
        let mut progress = interval_at(started + tick, tick);
        progress.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let message = tokio::select! {
                message = self.rx.recv() => message.ok_or(FrameworkError::ChannelClosed)?,
                _ = sleep_until(deadline) => {
                    *self.stale.entry(from.clone()).or_default() += 1;
                    tracing::warn!(step, timeout_secs = self.timeout.as_secs_f64(), "Step timed out");
                    return Err(FrameworkError::timeout(step));
                }
                _ = progress.tick() => {
                    tracing::debug!(step, elapsed_secs = started.elapsed().as_secs(), "Still waiting");
                    continue;
                }
            };

            if message.sender() == from && self.take_stale(from) {
                tracing::debug!(step, kind = %message.kind(), "Dropping late reply from an earlier step");
                continue;
            }

            if message.sender() != from {
                tracing::debug!(step, from = %message.sender().short(), kind = %message.kind(), "Skipping reply from another agent");
                continue;
            }

            match message.kind() {
                k if k == kind => return Ok(message),
                MessageKind::Failure => {
                    let reason = message
                        .payload()
                        .field("error")
                        .map(str::to_string)
                        .unwrap_or_else(|| message.payload().to_prompt_text());
                    return Err(FrameworkError::other(format!("{} failed: {}", step, reason)));
                }
                other => {
                    tracing::debug!(step, kind = %other, "Skipping unexpected reply kind");
                }
            }
        }
    }

    fn take_stale(&mut self, from: &AgentId) -> bool {
        match self.stale.get_mut(from) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::create_reply_channel;
    use serde_json::json;

    fn msg(from: &str, kind: MessageKind, text: &str) -> Arc<Message> {
        Arc::new(Message::direct(
            AgentId::from(from),
            AgentId::from("coordinator"),
            text,
            kind,
        ))
    }

    #[tokio::test]
    async fn test_skips_unexpected_then_matches() {
        let (tx, rx) = create_reply_channel();
        let mut waiter = ReplyWaiter::new(rx, Duration::from_secs(5), Duration::from_millis(50));
        let writer = AgentId::from("writer");

        tx.send(msg("reviewer", MessageKind::CodeReview, "lgtm")).unwrap();
        tx.send(msg("writer", MessageKind::Ack, "ok")).unwrap();
        tx.send(msg("writer", MessageKind::CodeResponse, "print(1)")).unwrap();

        let reply = waiter
            .expect(&writer, &MessageKind::CodeResponse, "code_gen_main.py")
            .await
            .unwrap();
        assert_eq!(reply.text(), "print(1)");
    }

    #[tokio::test]
    async fn test_failure_ends_wait() {
        let (tx, rx) = create_reply_channel();
        let mut waiter = ReplyWaiter::new(rx, Duration::from_secs(5), Duration::from_millis(50));

        tx.send(Arc::new(Message::direct(
            AgentId::from("writer"),
            AgentId::from("coordinator"),
            json!({"error": "Completion failed after 3 attempt(s): 429"}),
            MessageKind::Failure,
        )))
        .unwrap();

        let err = waiter
            .expect(&AgentId::from("writer"), &MessageKind::CodeResponse, "code_gen_app.py")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "code_gen_app.py failed: Completion failed after 3 attempt(s): 429"
        );
    }

    #[tokio::test]
    async fn test_late_reply_is_dropped_after_timeout() {
        let (tx, rx) = create_reply_channel();
        let mut waiter = ReplyWaiter::new(rx, Duration::from_millis(30), Duration::from_millis(10));
        let writer = AgentId::from("writer");

        let err = waiter
            .expect(&writer, &MessageKind::CodeResponse, "code_gen_a.py")
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Timeout(_)));

        tx.send(msg("writer", MessageKind::CodeResponse, "late a")).unwrap();
        tx.send(msg("writer", MessageKind::CodeResponse, "fresh b")).unwrap();

        let reply = waiter
            .expect(&writer, &MessageKind::CodeResponse, "code_gen_b.py")
            .await
            .unwrap();
        assert_eq!(reply.text(), "fresh b");
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (tx, rx) = create_reply_channel();
        drop(tx);
        let mut waiter = ReplyWaiter::new(rx, Duration::from_secs(1), Duration::from_millis(50));
        let err = waiter
            .expect(&AgentId::from("writer"), &MessageKind::Plan, "plan")
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::ChannelClosed));
    }
}
