//! Message envelope exchanged between agents
//!
//! A [`Message`] is immutable once built and travels through the bus as an
//! `Arc<Message>`, so a topic fan-out shares one allocation across inboxes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Process-unique agent identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in log lines and default names
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&AgentId> for AgentId {
    fn from(id: &AgentId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Message kind
// ============================================================================

/// Kind tag used for handler dispatch
///
/// Kinds known to the framework are variants; anything else parses to
/// [`MessageKind::Other`] so handlers always have an explicit fallback branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Default,
    Broadcast,
    Ack,
    Question,
    Query,
    AiResponse,
    CodeRequest,
    CodeResponse,
    CodeReviewRequest,
    CodeReview,
    TestRequest,
    TestResponse,
    PlanRequest,
    Plan,
    InferTasksRequest,
    InferTasksResponse,
    /// The sender could not produce a reply (carries the error text)
    Failure,
    /// Unrecognized kind
    Other(String),
}

impl MessageKind {
    /// Stable snake_case label
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Default => "default",
            MessageKind::Broadcast => "broadcast",
            MessageKind::Ack => "ack",
            MessageKind::Question => "question",
            MessageKind::Query => "query",
            MessageKind::AiResponse => "ai_response",
            MessageKind::CodeRequest => "code_request",
            MessageKind::CodeResponse => "code_response",
            MessageKind::CodeReviewRequest => "code_review_request",
            MessageKind::CodeReview => "code_review",
            MessageKind::TestRequest => "test_request",
            MessageKind::TestResponse => "test_response",
            MessageKind::PlanRequest => "generate_plan_request",
            MessageKind::Plan => "plan",
            MessageKind::InferTasksRequest => "infer_tasks_request",
            MessageKind::InferTasksResponse => "infer_tasks_response",
            MessageKind::Failure => "failure",
            MessageKind::Other(label) => label,
        }
    }

    /// Whether this kind is one the framework does not know
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, MessageKind::Other(_))
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Default
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "default" => MessageKind::Default,
            "broadcast" => MessageKind::Broadcast,
            "ack" => MessageKind::Ack,
            "question" => MessageKind::Question,
            "query" => MessageKind::Query,
            "ai_response" => MessageKind::AiResponse,
            "code_request" => MessageKind::CodeRequest,
            "code_response" => MessageKind::CodeResponse,
            "code_review_request" => MessageKind::CodeReviewRequest,
            "code_review" => MessageKind::CodeReview,
            "test_request" => MessageKind::TestRequest,
            "test_response" => MessageKind::TestResponse,
            "generate_plan_request" => MessageKind::PlanRequest,
            "plan" => MessageKind::Plan,
            "infer_tasks_request" => MessageKind::InferTasksRequest,
            "infer_tasks_response" => MessageKind::InferTasksResponse,
            "failure" => MessageKind::Failure,
            other => MessageKind::Other(other.to_string()),
        })
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(MessageKind::from(label.as_str()))
    }
}

// ============================================================================
// Payload and target
// ============================================================================

/// Message content - opaque text or structured JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    /// Text content, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Json(Value::String(s)) => Some(s),
            Payload::Json(_) => None,
        }
    }

    /// Structured content, if this is a JSON payload
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    /// Look up a string field of a JSON object payload
    pub fn field(&self, key: &str) -> Option<&str> {
        self.as_json()?.get(key)?.as_str()
    }

    /// Render the payload as prompt text
    ///
    /// Text is returned as-is; JSON is pretty-printed.
    pub fn to_prompt_text(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Json(Value::String(s)) => s.clone(),
            Payload::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Payload::Json(v)
    }
}

/// Where a message is addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A single registered agent
    Agent(AgentId),
    /// Every current subscriber of a topic
    Topic(String),
}

// ============================================================================
// Message
// ============================================================================

/// An immutable message between agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    sender: AgentId,
    target: Target,
    payload: Payload,
    kind: MessageKind,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Build a direct message
    pub fn direct(
        sender: AgentId,
        recipient: AgentId,
        payload: impl Into<Payload>,
        kind: MessageKind,
    ) -> Self {
        Self::new(sender, Target::Agent(recipient), payload.into(), kind)
    }

    /// Build a topic message
    pub fn topic(
        sender: AgentId,
        topic: impl Into<String>,
        payload: impl Into<Payload>,
        kind: MessageKind,
    ) -> Self {
        Self::new(sender, Target::Topic(topic.into()), payload.into(), kind)
    }

    fn new(sender: AgentId, target: Target, payload: Payload, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            target,
            payload,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sender(&self) -> &AgentId {
        &self.sender
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Direct recipient, if this is not a topic message
    pub fn recipient(&self) -> Option<&AgentId> {
        match &self.target {
            Target::Agent(id) => Some(id),
            Target::Topic(_) => None,
        }
    }

    /// Topic name, if this is a topic message
    pub fn topic_name(&self) -> Option<&str> {
        match &self.target {
            Target::Topic(t) => Some(t),
            Target::Agent(_) => None,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Payload as text, or an empty string for structured payloads
    pub fn text(&self) -> &str {
        self.payload.as_text().unwrap_or_default()
    }
}
