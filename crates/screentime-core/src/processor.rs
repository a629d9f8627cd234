//! Operator command handling

use screentime_api::{CommandChannel, HELP_TEXT, OperatorCommand};
use screentime_store::{BlockTrigger, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::access::{BlockOutcome, UnlockOutcome};
use crate::context::ServiceContext;
use crate::replies;

/// Pause after a failed receive before polling the channel again
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct CommandProcessor {
    ctx: Arc<ServiceContext>,
}

impl CommandProcessor {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Parse and execute one command, returning the reply text.
    ///
    /// Unparseable input gets an error reply and changes nothing.
    pub async fn handle(&self, text: &str) -> String {
        match text.parse::<OperatorCommand>() {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                debug!(text = %text, error = %e, "Rejected command");
                e.to_string()
            }
        }
    }

    pub async fn execute(&self, command: OperatorCommand) -> String {
        info!(command = command.name(), "Operator command");
        let ctx = &self.ctx;

        // Rolls the day over before anything reads today's numbers
        let current = ctx.budget.get();

        match command {
            OperatorCommand::Help => HELP_TEXT.to_string(),

            OperatorCommand::Status => replies::status_reply(&ctx.user, &current),

            OperatorCommand::Add { minutes } => {
                let update = ctx.budget.adjust_limit(i64::from(minutes));
                info!(
                    minutes,
                    new_limit = update.budget.daily_limit_minutes,
                    "Limit raised"
                );
                let reply = replies::added_reply(minutes, &update.budget);
                with_warnings(reply, [update.persist_error])
            }

            OperatorCommand::Remove { minutes } => {
                let update = ctx.budget.adjust_limit(-i64::from(minutes));
                info!(
                    minutes,
                    new_limit = update.budget.daily_limit_minutes,
                    "Limit lowered"
                );

                match ctx
                    .access
                    .block_if_exhausted(&ctx.budget, BlockTrigger::LimitReduced)
                    .await
                {
                    BlockOutcome::Blocked(blocked) => {
                        let reply = replies::removed_reply(minutes, &blocked.budget, true);
                        with_warnings(reply, [update.persist_error, blocked.persist_error])
                    }
                    BlockOutcome::NotNeeded(_) => {
                        let reply = replies::removed_reply(minutes, &update.budget, false);
                        with_warnings(reply, [update.persist_error])
                    }
                }
            }

            OperatorCommand::Unlock => match ctx.access.unlock(&ctx.budget).await {
                UnlockOutcome::Unlocked(update) => {
                    let reply = replies::unlocked_reply(&ctx.user, &update.budget);
                    with_warnings(reply, [update.persist_error])
                }
                UnlockOutcome::NotBlocked(_) => replies::not_blocked_reply(&ctx.user),
            },
        }
    }

    /// Serve commands from `channel` until shutdown or until it closes.
    ///
    /// A command being executed when shutdown arrives runs to completion and
    /// gets its reply.
    pub async fn run(self, channel: Arc<dyn CommandChannel>, mut shutdown: watch::Receiver<bool>) {
        info!(channel = channel.name(), "Command processor started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }

                received = channel.receive() => received,
            };

            match received {
                Ok(Some(inbound)) => {
                    debug!(chat = %inbound.chat, sender = %inbound.sender, "Command received");
                    let reply = self.handle(&inbound.text).await;
                    if let Err(e) = channel.reply(inbound.chat, &reply).await {
                        warn!(chat = %inbound.chat, error = %e, "Failed to send reply");
                    }
                }
                Ok(None) => {
                    info!(channel = channel.name(), "Command channel closed");
                    break;
                }
                Err(e) => {
                    warn!(channel = channel.name(), error = %e, "Failed to receive commands, retrying");
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Command processor stopped");
    }
}

fn with_warnings<const N: usize>(mut reply: String, errors: [Option<StoreError>; N]) -> String {
    for error in errors.iter().flatten() {
        reply.push_str(&replies::persist_warning(error));
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use screentime_api::{MOCK_OPERATOR_CHAT, MockChannel};
    use screentime_host_api::{MockEnforcer, MockMonitor};
    use screentime_store::{JsonFileStore, SqliteStore, Store};
    use screentime_util::ManualClock;

    struct Fixture {
        processor: CommandProcessor,
        ctx: Arc<ServiceContext>,
        enforcer: Arc<MockEnforcer>,
    }

    fn fixture_with_store(limit: u32, store: Arc<dyn Store>) -> Fixture {
        let enforcer = Arc::new(MockEnforcer::new());
        let ctx = ServiceContext::new(
            "kid",
            limit,
            store,
            Arc::new(ManualClock::at_noon(NaiveDate::from_ymd_opt(2025, 7, 4).unwrap())),
            Arc::new(MockMonitor::new(true)),
            enforcer.clone(),
        );
        Fixture {
            processor: CommandProcessor::new(ctx.clone()),
            ctx,
            enforcer,
        }
    }

    fn fixture(limit: u32) -> Fixture {
        fixture_with_store(limit, Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn help_and_start() {
        let f = fixture(60);
        assert_eq!(f.processor.handle("/help").await, HELP_TEXT);
        assert_eq!(f.processor.handle("/start").await, HELP_TEXT);
    }

    #[tokio::test]
    async fn unknown_command_changes_nothing() {
        let f = fixture(60);
        let before = f.ctx.budget.get();
        let reply = f.processor.handle("/reboot").await;
        assert!(reply.contains("Unknown command"));
        assert_eq!(f.ctx.budget.get(), before);
    }

    #[tokio::test]
    async fn invalid_minutes_are_rejected() {
        let f = fixture(60);
        for text in ["/add", "/add abc", "/add -5", "/add 0", "/remove 1.5"] {
            let reply = f.processor.handle(text).await;
            assert!(
                reply.contains("minutes"),
                "unexpected reply for {text}: {reply}"
            );
        }
        assert_eq!(f.ctx.budget.get().daily_limit_minutes, 60);
    }

    #[tokio::test]
    async fn add_raises_limit() {
        let f = fixture(60);
        let reply = f.processor.handle("/add 30").await;
        assert!(reply.contains("New limit for today: 90 min"));
        assert_eq!(f.ctx.budget.get().daily_limit_minutes, 90);
    }

    #[tokio::test]
    async fn add_does_not_unblock() {
        let f = fixture(10);
        f.ctx.budget.accrue(10);
        f.ctx.budget.set_blocked(true);

        let reply = f.processor.handle("/add 30").await;
        assert!(reply.contains("/unlock"));
        assert!(f.ctx.budget.get().blocked);
        assert_eq!(f.enforcer.unblock_count(), 0);
    }

    #[tokio::test]
    async fn remove_below_usage_blocks_once() {
        let f = fixture(30);
        f.ctx.budget.accrue(25);

        let reply = f.processor.handle("remove 10").await;
        assert!(reply.contains("Limit exceeded, user blocked."));

        let budget = f.ctx.budget.get();
        assert_eq!(budget.daily_limit_minutes, 20);
        assert!(budget.blocked);
        assert_eq!(f.enforcer.block_count(), 1);

        // Already blocked: lowering further does not block again
        let reply = f.processor.handle("remove 5").await;
        assert!(!reply.contains("user blocked"));
        assert_eq!(f.ctx.budget.get().daily_limit_minutes, 15);
        assert_eq!(f.enforcer.block_count(), 1);
    }

    #[tokio::test]
    async fn remove_within_budget_does_not_block() {
        let f = fixture(60);
        f.ctx.budget.accrue(10);

        f.processor.handle("/remove 15").await;
        assert!(!f.ctx.budget.get().blocked);
        assert_eq!(f.enforcer.block_count(), 0);
    }

    #[tokio::test]
    async fn remove_clamps_at_zero() {
        let f = fixture(10);
        let reply = f.processor.handle("/remove 500").await;
        assert!(reply.contains("New limit for today: 0 min"));
        // Zero used against zero limit is exhausted
        assert!(f.ctx.budget.get().blocked);
    }

    #[tokio::test]
    async fn unlock_flow() {
        let f = fixture(30);
        let reply = f.processor.handle("/unlock").await;
        assert_eq!(reply, "User kid is not blocked.");
        assert_eq!(f.enforcer.unblock_count(), 0);

        f.ctx.budget.accrue(30);
        f.ctx.budget.set_blocked(true);

        let reply = f.processor.handle("/unlock").await;
        assert!(reply.starts_with("User kid unblocked"));
        assert!(reply.contains("Used: 30/30 min"));
        assert!(!f.ctx.budget.get().blocked);
        assert_eq!(f.enforcer.unblock_count(), 1);
    }

    #[tokio::test]
    async fn persist_failure_is_reported_in_reply() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        let f = fixture_with_store(60, store);

        // Replace the data directory with a plain file so writes fail
        std::fs::remove_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path(), b"").unwrap();

        let reply = f.processor.handle("/add 5").await;
        assert!(reply.contains("could not be saved"), "{reply}");
        assert_eq!(f.ctx.budget.get().daily_limit_minutes, 65);

        std::fs::remove_file(dir.path()).unwrap();
    }

    #[tokio::test]
    async fn run_replies_until_channel_closes() {
        let f = fixture(60);
        let channel = Arc::new(MockChannel::new());
        channel.push("/add 15");
        channel.push("/status");
        channel.push("/bogus");

        let (_tx, rx) = watch::channel(false);
        f.processor.run(channel.clone(), rx).await;

        let replies = channel.replies();
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|(chat, _)| *chat == MOCK_OPERATOR_CHAT));
        assert!(replies[1].1.contains("Used: 0 min / 75 min"));
        assert!(replies[2].1.contains("Unknown command"));
    }

    #[tokio::test]
    async fn run_survives_reply_failures() {
        let f = fixture(60);
        let channel = Arc::new(MockChannel::new());
        *channel.fail_replies.lock().unwrap() = true;
        channel.push("/add 15");

        let (_tx, rx) = watch::channel(false);
        f.processor.run(channel.clone(), rx).await;

        // The command still took effect
        assert_eq!(f.ctx.budget.get().daily_limit_minutes, 75);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let f = fixture(60);
        let channel = Arc::new(MockChannel::new());
        channel.push("/status");

        let (tx, rx) = watch::channel(true);
        f.processor.run(channel.clone(), rx).await;
        drop(tx);

        assert!(channel.replies().is_empty());
    }
}
