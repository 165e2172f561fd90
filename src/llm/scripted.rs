//! In-memory provider with scripted outcomes
//!
//! Replays a queue of replies and failures in order, then falls back to an
//! optional responder closure (or an error once both are exhausted). Every
//! request is recorded so tests can assert on the prompts an agent built.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;

use super::provider::CompletionProvider;
use super::types::{Completion, CompletionRequest};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

enum Step {
    Reply(String),
    Fail(String),
}

/// Deterministic provider for tests and dry runs
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(text.into()));
        self
    }

    /// Queue a failure
    pub fn then_fail(self, error: impl Into<String>) -> Self {
        self.push(Step::Fail(error.into()));
        self
    }

    /// Answer every request past the queue with `responder`
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn push(&self, step: Step) {
        lock(&self.steps).push_back(step);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        lock(&self.requests).push(request.clone());

        let step = lock(&self.steps).pop_front();
        let text = match step {
            Some(Step::Reply(text)) => text,
            Some(Step::Fail(error)) => anyhow::bail!(error),
            None => match &self.responder {
                Some(responder) => responder(request)?,
                None => anyhow::bail!("scripted provider has no reply left"),
            },
        };
        Ok(Completion::new(text, request.model.clone()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[tokio::test]
    async fn test_queue_then_responder() {
        let provider = ScriptedProvider::new()
            .then_fail("first fails")
            .then_reply("second")
            .with_responder(|req| Ok(format!("echo: {}", req.last_user_text().unwrap_or(""))));
        let request = CompletionRequest::new("m").with_turns([Turn::user("ping")]);

        assert!(provider.complete(&request).await.is_err());
        assert_eq!(provider.complete(&request).await.unwrap().text, "second");
        assert_eq!(provider.complete(&request).await.unwrap().text, "echo: ping");
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.requests()[0].model, "m");
    }

    #[tokio::test]
    async fn test_exhausted_without_responder() {
        let provider = ScriptedProvider::new();
        let request = CompletionRequest::new("m");
        assert!(provider.complete(&request).await.is_err());
    }
}
