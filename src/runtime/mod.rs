//! Agent runtime and communication
//!
//! This module provides the in-process messaging core:
//! - `MessageBus` - Directory of agents plus topic table; direct, broadcast and pub/sub delivery
//! - `Agent` - Identity, inbox and handler; runs a receive loop as a tokio task
//! - `AgentHandle` - External interface for a spawned agent
//! - `MessageHandler` - Per-message behavior, with recording/echo/forward built-ins
//!
//! Each agent owns its inbox receiver; the bus only ever holds the sender half.

pub mod agent;
pub mod bus;
pub mod channels;
pub mod context;
pub mod handle;
pub mod handler;

pub use agent::{Agent, LoopStats};
pub use bus::MessageBus;
pub use channels::{create_reply_channel, ReplyReceiver, ReplySender, RunningFlag};
pub use context::{AgentContext, MessageLog};
pub use handle::AgentHandle;
pub use handler::{
    handler_fn, BoxedHandler, EchoHandler, FnHandler, ForwardHandler, MessageHandler,
    RecordingHandler,
};
