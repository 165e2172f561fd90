//! Turn history with retention policies
//!
//! Each AI agent keeps its own [`ConversationHistory`]. After every append
//! the [`RetentionPolicy`] evicts the oldest turns until the history fits.

use serde::{Deserialize, Serialize};

/// Approximate characters per token used by [`RetentionPolicy::MaxTokens`]
const CHARS_PER_TOKEN: usize = 4;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single (role, text) entry in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// Create a new user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    fn estimated_tokens(&self) -> usize {
        self.content.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

/// How much history an AI agent keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "limit")]
pub enum RetentionPolicy {
    /// Keep everything
    #[default]
    Unbounded,
    /// Keep at most this many turns
    MaxTurns(usize),
    /// Keep at most this many estimated tokens
    MaxTokens(usize),
}

/// Ordered conversation turns owned by one AI agent
///
/// Exchanges are appended as (user, assistant) pairs. Eviction removes the
/// oldest turns first, a whole pair at a time, so the history never starts
/// with an orphaned assistant reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    policy: RetentionPolicy,
}

impl ConversationHistory {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            turns: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record a completed request/reply exchange
    pub fn push_exchange(&mut self, request: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(Turn::user(request));
        self.turns.push(Turn::assistant(reply));
        self.enforce();
    }

    /// Append a single turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.enforce();
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Estimated token count of everything retained
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(Turn::estimated_tokens).sum()
    }

    fn enforce(&mut self) {
        loop {
            let over = match self.policy {
                RetentionPolicy::Unbounded => false,
                RetentionPolicy::MaxTurns(max) => self.turns.len() > max,
                RetentionPolicy::MaxTokens(max) => self.estimated_tokens() > max,
            };
            if !over || self.turns.is_empty() {
                break;
            }
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let pair = self.turns.len() >= 2
            && self.turns[0].role == Role::User
            && self.turns[1].role == Role::Assistant;
        let count = if pair { 2 } else { 1 };
        self.turns.drain(..count);
        tracing::debug!(evicted = count, remaining = self.turns.len(), "Trimmed conversation history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_keeps_everything() {
        let mut history = ConversationHistory::default();
        for i in 0..10 {
            history.push_exchange(format!("q{}", i), format!("a{}", i));
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.turns()[0], Turn::user("q0"));
    }

    #[test]
    fn test_max_turns_evicts_oldest_pairs() {
        let mut history = ConversationHistory::new(RetentionPolicy::MaxTurns(4));
        history.push_exchange("q1", "a1");
        history.push_exchange("q2", "a2");
        history.push_exchange("q3", "a3");

        assert_eq!(
            history.turns(),
            &[
                Turn::user("q2"),
                Turn::assistant("a2"),
                Turn::user("q3"),
                Turn::assistant("a3"),
            ]
        );
    }

    #[test]
    fn test_odd_turn_limit_never_leaves_orphan_reply() {
        let mut history = ConversationHistory::new(RetentionPolicy::MaxTurns(3));
        history.push_exchange("q1", "a1");
        history.push_exchange("q2", "a2");

        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].role, Role::User);
    }

    #[test]
    fn test_max_tokens() {
        // Each 8-char turn is two estimated tokens
        let mut history = ConversationHistory::new(RetentionPolicy::MaxTokens(5));
        history.push_exchange("aaaaaaaa", "bbbbbbbb");
        assert_eq!(history.estimated_tokens(), 4);

        history.push_exchange("cccccccc", "dddddddd");
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].content, "cccccccc");
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&RetentionPolicy::MaxTurns(10)).unwrap();
        assert_eq!(json, r#"{"policy":"max_turns","limit":10}"#);
        let back: RetentionPolicy = serde_json::from_str(r#"{"policy":"unbounded"}"#).unwrap();
        assert_eq!(back, RetentionPolicy::Unbounded);
    }
}
