//! screentimed - The screen time background service
//!
//! This is the main entry point for the screentimed service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Host mechanisms (session monitor, enforcer)
//! - Command channel (Telegram or console)
//! - Enforcement loop and command processor

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use screentime_api::CommandChannel;
use screentime_bot::{ConsoleChannel, TelegramChannel};
use screentime_config::{ChannelConfig, Config, EnforcerConfig, MonitorConfig, StoreBackend, load_config};
use screentime_core::{
    CommandProcessor, EnforcementLoop, STARTED_NOTICE, STOPPED_NOTICE, ServiceContext, TickOutcome,
};
use screentime_host_api::{Enforcer, SessionMonitor};
use screentime_host_linux::{AccountEnforcer, ProcessOwnerMonitor, ScriptEnforcer, WhoMonitor};
use screentime_store::{AuditEvent, AuditEventType, JsonFileStore, SqliteStore, Store};
use screentime_util::{
    SCREENTIME_CONFIG_ENV, SCREENTIME_DATA_DIR_ENV, SystemClock, default_config_path,
    is_mock_time_active,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// What the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Enforcement loop and command channel
    Full,
    /// Enforcement loop only
    Monitor,
    /// One enforcement tick, then exit
    Once,
}

/// screentimed - Daily screen time budget enforcement
#[derive(Parser, Debug)]
#[command(name = "screentimed")]
#[command(about = "Daily screen time budget enforcement", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/screentime/config.toml)
    #[arg(short, long, env = SCREENTIME_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set SCREENTIME_DATA_DIR env var)
    #[arg(short, long, env = SCREENTIME_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run mode
    #[arg(short, long, value_enum, default_value_t = Mode::Full)]
    mode: Mode,
}

/// Main service state
struct Service {
    config: Config,
    ctx: Arc<ServiceContext>,
    store: Arc<dyn Store>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            user = %config.user,
            daily_limit = config.daily_limit_minutes,
            tick_secs = config.tick_interval.as_secs(),
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        let store = open_store(config.service.backend, &data_dir)?;
        let monitor = build_monitor(&config.host.monitor);
        let enforcer = build_enforcer(&config.host.enforcer);

        info!(
            monitor = monitor.name(),
            enforcer = enforcer.name(),
            "Host mechanisms selected"
        );

        let ctx = ServiceContext::new(
            config.user.clone(),
            config.daily_limit_minutes,
            store.clone(),
            Arc::new(SystemClock),
            monitor,
            enforcer,
        );

        Ok(Self { config, ctx, store })
    }

    /// Single tick for external schedulers
    async fn run_once(self) -> Result<()> {
        let outcome = EnforcementLoop::new(self.ctx.clone(), self.config.tick_interval)
            .tick()
            .await;

        match &outcome {
            TickOutcome::NotLoggedIn => info!("User not logged in"),
            TickOutcome::AlreadyBlocked => info!("User already blocked"),
            TickOutcome::Accrued(budget) => info!(
                used = budget.used_minutes,
                limit = budget.daily_limit_minutes,
                remaining = budget.remaining_minutes(),
                "Usage recorded"
            ),
            TickOutcome::Blocked(budget) => info!(
                used = budget.used_minutes,
                limit = budget.daily_limit_minutes,
                "Daily limit reached, user blocked"
            ),
        }
        Ok(())
    }

    async fn run(self, with_channel: bool) -> Result<()> {
        let channel = if with_channel {
            Some(build_channel(&self.config.channel)?)
        } else {
            None
        };

        // Log service start
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
        {
            warn!(error = %e, "Failed to log service start");
        }

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        tasks.push((
            "enforcement",
            tokio::spawn(
                EnforcementLoop::new(self.ctx.clone(), self.config.tick_interval)
                    .run(shutdown_rx.clone()),
            ),
        ));

        if let Some(channel) = &channel {
            if let Err(e) = channel.notify_operator(STARTED_NOTICE).await {
                warn!(error = %e, "Failed to send startup notification");
            }

            tasks.push((
                "commands",
                tokio::spawn(CommandProcessor::new(self.ctx.clone()).run(channel.clone(), shutdown_rx)),
            ));
        }

        info!("Service running");

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
        }

        // Graceful shutdown: in-flight ticks and commands finish first
        info!("Shutting down screentimed");
        shutdown_tx.send_replace(true);

        for (name, task) in tasks {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Task ended abnormally");
            }
        }

        if let Some(channel) = &channel
            && let Err(e) = channel.notify_operator(STOPPED_NOTICE).await
        {
            warn!(error = %e, "Failed to send shutdown notification");
        }

        // Log shutdown
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match backend {
        StoreBackend::Json => Arc::new(
            JsonFileStore::open(data_dir)
                .with_context(|| format!("Failed to open data directory {:?}", data_dir))?,
        ),
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
            let db_path = data_dir.join("screentime.db");
            Arc::new(
                SqliteStore::open(&db_path)
                    .with_context(|| format!("Failed to open database {:?}", db_path))?,
            )
        }
    };

    info!(data_dir = %data_dir.display(), ?backend, "Store initialized");
    Ok(store)
}

fn build_monitor(config: &MonitorConfig) -> Arc<dyn SessionMonitor> {
    match config {
        MonitorConfig::Who { argv } => Arc::new(WhoMonitor::new(argv.clone())),
        MonitorConfig::ProcessOwner => Arc::new(ProcessOwnerMonitor::new()),
    }
}

fn build_enforcer(config: &EnforcerConfig) -> Arc<dyn Enforcer> {
    match config {
        EnforcerConfig::Account => Arc::new(AccountEnforcer::new()),
        EnforcerConfig::Script { block, unblock } => {
            Arc::new(ScriptEnforcer::new(block.clone(), unblock.clone()))
        }
    }
}

fn build_channel(config: &ChannelConfig) -> Result<Arc<dyn CommandChannel>> {
    let channel: Arc<dyn CommandChannel> = match config {
        ChannelConfig::Telegram(telegram) => Arc::new(
            TelegramChannel::new(telegram.clone()).context("Failed to create Telegram client")?,
        ),
        ChannelConfig::Console => Arc::new(ConsoleChannel::stdio()),
    };

    info!(channel = channel.name(), "Command channel ready");
    Ok(channel)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?args.mode,
        "screentimed starting"
    );

    if is_mock_time_active() {
        warn!(now = %screentime_util::now(), "Mock time active, day boundaries follow the mocked clock");
    }

    let service = Service::new(&args).await?;
    match args.mode {
        Mode::Full => service.run(true).await,
        Mode::Monitor => service.run(false).await,
        Mode::Once => service.run_once().await,
    }
}
