//! Command channel interface
//!
//! A channel delivers operator commands and carries replies back. Operator
//! authentication happens inside the channel: anything it yields from
//! [`CommandChannel::receive`] comes from the authorized operator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Conversation a reply should be delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command received from the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// Where replies go
    pub chat: ChatId,

    /// Sender identity as reported by the transport
    pub sender: String,

    /// Raw command text
    pub text: String,
}

impl InboundCommand {
    pub fn new(chat: ChatId, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat,
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Errors from channel operations
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Transport for operator commands
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Wait for the next authorized command.
    ///
    /// Returns `Ok(None)` once the channel is closed for good. Must be
    /// cancel-safe: dropping the future never loses a command.
    async fn receive(&self) -> ChannelResult<Option<InboundCommand>>;

    /// Send a reply into a conversation
    async fn reply(&self, chat: ChatId, text: &str) -> ChannelResult<()>;

    /// Send an unsolicited message to the operator (startup, shutdown)
    async fn notify_operator(&self, text: &str) -> ChannelResult<()>;
}
