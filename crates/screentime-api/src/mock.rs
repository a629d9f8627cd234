//! Scripted command channel for testing

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{ChannelError, ChannelResult, ChatId, CommandChannel, InboundCommand};

/// Chat used by [`MockChannel::push`]
pub const MOCK_OPERATOR_CHAT: ChatId = ChatId(1);

/// Command channel fed from a queue. Closes once the queue is drained.
#[derive(Default)]
pub struct MockChannel {
    inbound: Mutex<VecDeque<InboundCommand>>,
    replies: Arc<Mutex<Vec<(ChatId, String)>>>,

    /// Configure replies to fail
    pub fail_replies: Mutex<bool>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command from the operator
    pub fn push(&self, text: &str) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(InboundCommand::new(MOCK_OPERATOR_CHAT, "operator", text));
    }

    /// Replies sent so far, in order
    pub fn replies(&self) -> Vec<(ChatId, String)> {
        self.replies.lock().unwrap().clone()
    }

    /// Text of the most recent reply
    pub fn last_reply(&self) -> Option<String> {
        self.replies.lock().unwrap().last().map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl CommandChannel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn receive(&self) -> ChannelResult<Option<InboundCommand>> {
        Ok(self.inbound.lock().unwrap().pop_front())
    }

    async fn reply(&self, chat: ChatId, text: &str) -> ChannelResult<()> {
        if *self.fail_replies.lock().unwrap() {
            return Err(ChannelError::Transport("Mock reply failure".into()));
        }
        self.replies.lock().unwrap().push((chat, text.to_string()));
        Ok(())
    }

    async fn notify_operator(&self, _text: &str) -> ChannelResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_then_closes() {
        let channel = MockChannel::new();
        channel.push("/status");

        let first = channel.receive().await.unwrap().unwrap();
        assert_eq!(first.text, "/status");
        assert_eq!(first.chat, MOCK_OPERATOR_CHAT);
        assert!(channel.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_replies() {
        let channel = MockChannel::new();
        channel.reply(ChatId(7), "hello").await.unwrap();
        assert_eq!(channel.replies(), vec![(ChatId(7), "hello".to_string())]);
        assert_eq!(channel.last_reply().as_deref(), Some("hello"));

        *channel.fail_replies.lock().unwrap() = true;
        assert!(channel.reply(ChatId(7), "again").await.is_err());
    }
}
