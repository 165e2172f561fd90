//! Core types for the agent framework
//!
//! This module provides the fundamental types used throughout the framework:
//! - `AgentId` - Process-unique agent identity
//! - `Message` / `MessageKind` / `Payload` - The envelope agents exchange
//! - `BusError` / `FrameworkError` - Error types

pub mod error;
pub mod message;

pub use error::{BusError, BusResult, FrameworkError, FrameworkResult};
pub use message::{AgentId, Message, MessageKind, Payload, Target};
