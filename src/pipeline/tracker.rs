//! Named completion events
//!
//! Pipelines mark each step (`code_gen_app.py`, `review_app.py`) as it
//! finishes; observers holding a clone of the tracker can wait on any of
//! them with a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::core::{FrameworkError, FrameworkResult};

/// Set of named one-shot completion events
#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: Arc<RwLock<HashMap<String, watch::Sender<bool>>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending task
    ///
    /// Creating a task that already exists leaves its state untouched.
    pub async fn create(&self, task_id: impl Into<String>) {
        self.tasks
            .write()
            .await
            .entry(task_id.into())
            .or_insert_with(|| watch::channel(false).0);
    }

    /// Mark a task complete and wake its waiters
    ///
    /// Returns `false` for a task that was never created.
    pub async fn complete(&self, task_id: &str) -> bool {
        match self.tasks.read().await.get(task_id) {
            Some(tx) => {
                tx.send_replace(true);
                true
            }
            None => {
                tracing::debug!(task = task_id, "Completion for unknown task ignored");
                false
            }
        }
    }

    pub async fn is_complete(&self, task_id: &str) -> bool {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|tx| *tx.borrow())
            .unwrap_or(false)
    }

    /// Ids of every completed task, sorted
    pub async fn completed(&self) -> Vec<String> {
        let mut done: Vec<String> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|(_, tx)| *tx.borrow())
            .map(|(id, _)| id.clone())
            .collect();
        done.sort();
        done
    }

    /// Wait until `task_id` completes
    pub async fn wait(&self, task_id: &str, timeout: Duration) -> FrameworkResult<()> {
        let mut rx = self
            .tasks
            .read()
            .await
            .get(task_id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| FrameworkError::other(format!("Unknown task: {}", task_id)))?;

        let outcome = match tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(FrameworkError::ChannelClosed),
            Err(_) => Err(FrameworkError::timeout(task_id)),
        };
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_wakes_waiter() {
        let tracker = TaskTracker::new();
        tracker.create("code_gen_app.py").await;

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                tracker
                    .wait("code_gen_app.py", Duration::from_secs(5))
                    .await
            })
        };

        assert!(tracker.complete("code_gen_app.py").await);
        waiter.await.unwrap().unwrap();
        assert!(tracker.is_complete("code_gen_app.py").await);
    }

    #[tokio::test]
    async fn test_wait_on_already_completed() {
        let tracker = TaskTracker::new();
        tracker.create("plan").await;
        tracker.complete("plan").await;
        tracker.wait("plan", Duration::from_millis(10)).await.unwrap();

        // re-creating does not reset
        tracker.create("plan").await;
        assert!(tracker.is_complete("plan").await);
    }

    #[tokio::test]
    async fn test_timeout_and_unknown() {
        let tracker = TaskTracker::new();
        tracker.create("review_app.py").await;

        let err = tracker
            .wait("review_app.py", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::Timeout(_)));

        assert!(tracker.wait("missing", Duration::from_millis(20)).await.is_err());
        assert!(!tracker.complete("missing").await);

        tracker.complete("review_app.py").await;
        assert_eq!(tracker.completed().await, vec!["review_app.py"]);
    }
}
