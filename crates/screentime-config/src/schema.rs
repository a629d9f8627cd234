//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Monitored account
    pub user: RawUserConfig,

    /// Daily budget settings
    pub limits: RawLimits,

    /// Session detection and enforcement mechanisms
    #[serde(default)]
    pub host: RawHostConfig,

    /// Operator command channel
    #[serde(default)]
    pub channel: RawChannelConfig,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,
}

/// Monitored account
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawUserConfig {
    /// Login name of the monitored user
    pub name: String,
}

/// Daily budget settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLimits {
    /// Default allowance per day, in minutes
    pub daily_minutes: i64,

    /// Enforcement tick period in seconds (default: 60)
    pub tick_seconds: Option<u64>,
}

/// How to tell whether the user is logged in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    /// Run a session listing command (`who` by default) and look for the user
    #[default]
    Who,
    /// Look for running processes owned by the user
    ProcessOwner,
}

/// How to revoke and restore access
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcerKind {
    /// Lock the account and terminate its sessions
    #[default]
    Account,
    /// Run operator-provided block/unblock scripts
    Script,
}

/// Host mechanism selection
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawHostConfig {
    #[serde(default)]
    pub monitor: MonitorKind,

    /// argv for the `who` monitor (default: `["who"]`)
    pub monitor_command: Option<Vec<String>>,

    #[serde(default)]
    pub enforcer: EnforcerKind,

    /// Script run to block the user (script enforcer)
    pub block_script: Option<PathBuf>,

    /// Script run to unblock the user (script enforcer)
    pub unblock_script: Option<PathBuf>,
}

/// Command channel transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Telegram,
    /// Read commands from stdin, reply on stdout (local testing)
    Console,
}

/// Command channel settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawChannelConfig {
    #[serde(default)]
    pub kind: ChannelKind,

    /// Telegram bot token
    pub bot_token: Option<String>,

    /// Telegram user id of the operator
    pub admin_id: Option<i64>,

    /// Long polling timeout in seconds (default: 30)
    pub poll_timeout_seconds: Option<u64>,

    /// Bot API base URL (default: https://api.telegram.org)
    pub api_url: Option<String>,
}

/// Durable state backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Single JSON file, written atomically
    #[default]
    Json,
    /// SQLite database
    Sqlite,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the state store
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub backend: StoreBackend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [user]
            name = "kid"

            [limits]
            daily_minutes = 120
            tick_seconds = 30

            [host]
            monitor = "process_owner"
            enforcer = "script"
            block_script = "/usr/local/bin/kid-logoff"
            unblock_script = "/usr/local/bin/kid-restore"

            [channel]
            kind = "telegram"
            bot_token = "123:abc"
            admin_id = 42

            [service]
            data_dir = "/var/lib/screentime"
            backend = "sqlite"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host.monitor, MonitorKind::ProcessOwner);
        assert_eq!(config.host.enforcer, EnforcerKind::Script);
        assert_eq!(config.channel.admin_id, Some(42));
        assert_eq!(config.service.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn sections_default() {
        let toml_str = r#"
            config_version = 1

            [user]
            name = "kid"

            [limits]
            daily_minutes = 60
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host.monitor, MonitorKind::Who);
        assert_eq!(config.host.enforcer, EnforcerKind::Account);
        assert_eq!(config.channel.kind, ChannelKind::Telegram);
        assert_eq!(config.service.backend, StoreBackend::Json);
    }

    #[test]
    fn unknown_monitor_is_rejected() {
        let toml_str = r#"
            config_version = 1

            [user]
            name = "kid"

            [limits]
            daily_minutes = 60

            [host]
            monitor = "telepathy"
        "#;

        assert!(toml::from_str::<RawConfig>(toml_str).is_err());
    }
}
