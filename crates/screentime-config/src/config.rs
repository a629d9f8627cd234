//! Validated configuration structures

use crate::schema::{
    ChannelKind, EnforcerKind, MonitorKind, RawChannelConfig, RawConfig, RawHostConfig,
    RawServiceConfig, StoreBackend,
};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default enforcement tick period
pub const DEFAULT_TICK: Duration = Duration::from_secs(60);

/// Default Telegram long polling timeout
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default Telegram Bot API endpoint
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Validated configuration ready for use by the service
#[derive(Debug, Clone)]
pub struct Config {
    /// Monitored login name
    pub user: String,

    /// Limit a fresh day starts with
    pub daily_limit_minutes: u32,

    /// Enforcement tick period
    pub tick_interval: Duration,

    pub host: HostConfig,
    pub channel: ChannelConfig,
    pub service: ServiceConfig,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            user: raw.user.name.trim().to_string(),
            daily_limit_minutes: u32::try_from(raw.limits.daily_minutes).unwrap_or(0),
            tick_interval: raw
                .limits
                .tick_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TICK),
            host: HostConfig::from_raw(raw.host),
            channel: ChannelConfig::from_raw(raw.channel),
            service: ServiceConfig::from_raw(raw.service),
        }
    }
}

/// Session monitor selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorConfig {
    /// Run `argv` and look for the user in its output
    Who { argv: Vec<String> },
    /// Scan processes for ones owned by the user
    ProcessOwner,
}

/// Enforcer selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcerConfig {
    Account,
    Script { block: PathBuf, unblock: PathBuf },
}

/// Host mechanism selection
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub monitor: MonitorConfig,
    pub enforcer: EnforcerConfig,
}

impl HostConfig {
    fn from_raw(raw: RawHostConfig) -> Self {
        let monitor = match raw.monitor {
            MonitorKind::Who => MonitorConfig::Who {
                argv: raw.monitor_command.unwrap_or_else(|| vec!["who".into()]),
            },
            MonitorKind::ProcessOwner => MonitorConfig::ProcessOwner,
        };

        let enforcer = match raw.enforcer {
            EnforcerKind::Account => EnforcerConfig::Account,
            EnforcerKind::Script => EnforcerConfig::Script {
                block: raw.block_script.unwrap_or_default(),
                unblock: raw.unblock_script.unwrap_or_default(),
            },
        };

        Self { monitor, enforcer }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::from_raw(RawHostConfig::default())
    }
}

/// Telegram bot settings
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_id: i64,
    pub poll_timeout: Duration,
    pub api_url: String,
}

// Keeps the token out of logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("admin_id", &self.admin_id)
            .field("poll_timeout", &self.poll_timeout)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Command channel selection
#[derive(Debug, Clone)]
pub enum ChannelConfig {
    Telegram(TelegramConfig),
    Console,
}

impl ChannelConfig {
    fn from_raw(raw: RawChannelConfig) -> Self {
        match raw.kind {
            ChannelKind::Telegram => Self::Telegram(TelegramConfig {
                bot_token: raw.bot_token.unwrap_or_default().trim().to_string(),
                admin_id: raw.admin_id.unwrap_or_default(),
                poll_timeout: raw
                    .poll_timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_POLL_TIMEOUT),
                api_url: raw
                    .api_url
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            }),
            ChannelKind::Console => Self::Console,
        }
    }
}

/// Service-level settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw
                .data_dir
                .unwrap_or_else(screentime_util::default_data_dir),
            backend: raw.backend,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}
