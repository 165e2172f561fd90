//! Framework error types

use thiserror::Error;

use super::message::AgentId;

/// Wiring errors raised synchronously by the message bus.
///
/// These indicate a programming mistake (an identity that was never
/// registered, or registered twice) and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// An agent with this identity is already registered
    #[error("Duplicate agent identity: {0}")]
    DuplicateIdentity(AgentId),

    /// Direct message to an identity that is not registered
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AgentId),

    /// Topic operation on an identity that is not registered
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// Recipient is registered but its receive loop has exited
    #[error("Inbox closed for agent: {0}")]
    InboxClosed(AgentId),
}

/// Errors that can occur in the agent framework
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// Bus-level wiring error
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The completion service failed on every allowed attempt
    #[error("Completion failed after {attempts} attempt(s): {source}")]
    CompletionFailure {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// A pipeline step did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    ChannelClosed,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl FrameworkError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        FrameworkError::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>) -> Self {
        FrameworkError::Timeout(what.into())
    }

    /// Whether a pipeline may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FrameworkError::CompletionFailure { .. } | FrameworkError::Timeout(_)
        )
    }
}

/// Result type alias for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Result type alias for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;
