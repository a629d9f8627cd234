//! Local console channel
//!
//! Reads one command per line and writes replies back. Whoever has the
//! terminal is treated as the operator.

use async_trait::async_trait;
use screentime_api::{ChannelResult, ChatId, CommandChannel, InboundCommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

/// The console has a single conversation
pub const CONSOLE_CHAT: ChatId = ChatId(0);

type Input = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;
type Output = Box<dyn AsyncWrite + Send + Unpin>;

pub struct ConsoleChannel {
    input: Mutex<Input>,
    output: Mutex<Output>,
}

impl ConsoleChannel {
    pub fn new(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let input: Box<dyn AsyncBufRead + Send + Unpin> = Box::new(input);
        Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Channel over the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    async fn write(&self, text: &str) -> ChannelResult<()> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl CommandChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn receive(&self) -> ChannelResult<Option<InboundCommand>> {
        let mut input = self.input.lock().await;
        // next_line is cancel-safe
        while let Some(line) = input.next_line().await? {
            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(InboundCommand::new(CONSOLE_CHAT, "console", line)));
            }
        }
        Ok(None)
    }

    async fn reply(&self, _chat: ChatId, text: &str) -> ChannelResult<()> {
        self.write(text).await
    }

    async fn notify_operator(&self, text: &str) -> ChannelResult<()> {
        self.write(text).await
    }
}
