//! Telegram Bot API channel
//!
//! Commands arrive through `getUpdates` long polling and replies go out with
//! `sendMessage`. Only messages from the configured administrator are
//! yielded; anyone else gets an "access denied" reply.

use async_trait::async_trait;
use reqwest::Client;
use screentime_api::{ChannelError, ChannelResult, ChatId, CommandChannel, InboundCommand};
use screentime_config::TelegramConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reply to messages from anyone but the administrator
pub const ACCESS_DENIED: &str = "Access denied. You are not the administrator.";

/// Slack on top of the long polling timeout before the request is abandoned
const REQUEST_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Sorted result of one `getUpdates` batch
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Offset that acknowledges every update in the batch
    pub next_offset: Option<i64>,

    /// Commands from the administrator, in arrival order
    pub accepted: Vec<InboundCommand>,

    /// Chats that must be told access is denied
    pub denied: Vec<(ChatId, i64)>,
}

/// Split a batch of updates into accepted commands and rejected senders.
///
/// Updates without text (stickers, joins, edits) are acknowledged and
/// dropped.
pub fn sort_updates(updates: Vec<Update>, admin_id: i64) -> UpdateBatch {
    let mut batch = UpdateBatch::default();

    for update in updates {
        batch.next_offset = Some(batch.next_offset.map_or(update.update_id + 1, |o| {
            o.max(update.update_id + 1)
        }));

        let Some(message) = update.message else {
            continue;
        };
        let Some(text) = message.text else {
            continue;
        };
        let chat = ChatId(message.chat.id);

        match message.from {
            Some(from) if from.id == admin_id => {
                let sender = from.username.unwrap_or_else(|| from.id.to_string());
                batch.accepted.push(InboundCommand::new(chat, sender, text));
            }
            Some(from) => batch.denied.push((chat, from.id)),
            // Channel posts carry no sender
            None => batch.denied.push((chat, 0)),
        }
    }

    batch
}

#[derive(Default)]
struct PollState {
    offset: i64,
    pending: VecDeque<InboundCommand>,
}

pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
    state: Mutex<PollState>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> ChannelResult<Self> {
        let client = Client::builder()
            .timeout(config.poll_timeout + REQUEST_GRACE)
            .build()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, method: &str, body: &B) -> ChannelResult<T> {
        // Errors from reqwest include the URL, which carries the token
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::Decode(e.without_url().to_string()))?;

        if !body.ok {
            return Err(ChannelError::Api {
                code: body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: body.description.unwrap_or_else(|| status.to_string()),
            });
        }

        body.result
            .ok_or_else(|| ChannelError::Decode(format!("{} returned no result", method)))
    }

    async fn send(&self, chat: ChatId, text: &str) -> ChannelResult<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id: chat.0, text })
            .await?;
        debug!(chat = %chat, "Message sent");
        Ok(())
    }
}

#[async_trait]
impl CommandChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn receive(&self) -> ChannelResult<Option<InboundCommand>> {
        loop {
            let denied = {
                let mut state = self.state.lock().await;
                if let Some(command) = state.pending.pop_front() {
                    return Ok(Some(command));
                }

                let request = GetUpdates {
                    offset: state.offset,
                    timeout: self.config.poll_timeout.as_secs(),
                    allowed_updates: ["message"],
                };
                // Dropping this await leaves offset untouched, so Telegram
                // redelivers the batch on the next poll.
                let updates: Vec<Update> = self.call("getUpdates", &request).await?;

                // Telegram only learns the new offset from the next poll,
                // which runs once `pending` is drained. Commands still queued
                // at shutdown are redelivered.
                let batch = sort_updates(updates, self.config.admin_id);
                if let Some(offset) = batch.next_offset {
                    state.offset = offset;
                }
                state.pending.extend(batch.accepted);
                batch.denied
            };

            for (chat, sender) in denied {
                warn!(chat = %chat, sender, "Rejected message from non-administrator");
                if let Err(e) = self.send(chat, ACCESS_DENIED).await {
                    warn!(chat = %chat, error = %e, "Failed to send access denied reply");
                }
            }
        }
    }

    async fn reply(&self, chat: ChatId, text: &str) -> ChannelResult<()> {
        self.send(chat, text).await
    }

    async fn notify_operator(&self, text: &str) -> ChannelResult<()> {
        info!(admin_id = self.config.admin_id, "Notifying operator");
        self.send(ChatId(self.config.admin_id), text).await
    }
}
