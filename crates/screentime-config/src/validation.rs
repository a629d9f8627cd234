//! Configuration validation

use crate::schema::{ChannelKind, EnforcerKind, RawConfig, RawHostConfig, RawLimits};
use thiserror::Error;

/// Placeholder values shipped in the sample config
const PLACEHOLDER_USER: &str = "TargetUser";
const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN";
const PLACEHOLDER_ADMIN_ID: i64 = 123456789;

/// Largest default limit accepted (one full day)
pub const MAX_DAILY_MINUTES: i64 = 24 * 60;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("user.name {0}")]
    User(String),

    #[error("limits.{field} {message}")]
    Limits {
        field: &'static str,
        message: String,
    },

    #[error("host.{field} {message}")]
    Host {
        field: &'static str,
        message: String,
    },

    #[error("channel.{field} {message}")]
    Channel {
        field: &'static str,
        message: String,
    },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let user = config.user.name.trim();
    if user.is_empty() {
        errors.push(ValidationError::User("cannot be empty".into()));
    } else if user == PLACEHOLDER_USER {
        errors.push(ValidationError::User("is not configured".into()));
    }

    errors.extend(validate_limits(&config.limits));
    errors.extend(validate_host(&config.host));

    if config.channel.kind == ChannelKind::Telegram {
        match config.channel.bot_token.as_deref().map(str::trim) {
            None | Some("") => errors.push(ValidationError::Channel {
                field: "bot_token",
                message: "is required for the telegram channel".into(),
            }),
            Some(PLACEHOLDER_TOKEN) => errors.push(ValidationError::Channel {
                field: "bot_token",
                message: "is not configured".into(),
            }),
            Some(_) => {}
        }

        match config.channel.admin_id {
            None | Some(0) => errors.push(ValidationError::Channel {
                field: "admin_id",
                message: "is required for the telegram channel".into(),
            }),
            Some(PLACEHOLDER_ADMIN_ID) => errors.push(ValidationError::Channel {
                field: "admin_id",
                message: "is not configured".into(),
            }),
            Some(_) => {}
        }
    }

    if config.channel.poll_timeout_seconds == Some(0) {
        errors.push(ValidationError::Channel {
            field: "poll_timeout_seconds",
            message: "must be positive".into(),
        });
    }

    errors
}

fn validate_limits(limits: &RawLimits) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if limits.daily_minutes <= 0 {
        errors.push(ValidationError::Limits {
            field: "daily_minutes",
            message: "must be positive".into(),
        });
    } else if limits.daily_minutes > MAX_DAILY_MINUTES {
        errors.push(ValidationError::Limits {
            field: "daily_minutes",
            message: format!("cannot exceed {MAX_DAILY_MINUTES}"),
        });
    }

    if limits.tick_seconds == Some(0) {
        errors.push(ValidationError::Limits {
            field: "tick_seconds",
            message: "must be positive".into(),
        });
    }

    errors
}

fn validate_host(host: &RawHostConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(argv) = &host.monitor_command
        && argv.first().is_none_or(|program| program.trim().is_empty())
    {
        errors.push(ValidationError::Host {
            field: "monitor_command",
            message: "cannot be empty".into(),
        });
    }

    if host.enforcer == EnforcerKind::Script {
        let scripts = [
            ("block_script", &host.block_script),
            ("unblock_script", &host.unblock_script),
        ];
        for (field, script) in scripts {
            if script.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                errors.push(ValidationError::Host {
                    field,
                    message: "is required for the script enforcer".into(),
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawChannelConfig, RawUserConfig};

    fn valid_config() -> RawConfig {
        RawConfig {
            config_version: 1,
            user: RawUserConfig { name: "kid".into() },
            limits: RawLimits {
                daily_minutes: 120,
                tick_seconds: None,
            },
            host: RawHostConfig::default(),
            channel: RawChannelConfig {
                kind: ChannelKind::Telegram,
                bot_token: Some("123:abc".into()),
                admin_id: Some(42),
                poll_timeout_seconds: None,
                api_url: None,
            },
            service: Default::default(),
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(validate_config(&valid_config()).is_empty());
    }

    #[test]
    fn limits_must_be_positive() {
        let mut config = valid_config();
        config.limits.daily_minutes = -5;
        config.limits.tick_seconds = Some(0);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn limit_cannot_exceed_a_day() {
        let mut config = valid_config();
        config.limits.daily_minutes = MAX_DAILY_MINUTES + 1;
        assert_eq!(validate_config(&config).len(), 1);
    }

    #[test]
    fn telegram_requires_credentials() {
        let mut config = valid_config();
        config.channel.bot_token = None;
        config.channel.admin_id = None;

        let errors = validate_config(&config);
        assert!(errors.iter().all(|e| matches!(e, ValidationError::Channel { .. })));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn console_needs_no_credentials() {
        let mut config = valid_config();
        config.channel = RawChannelConfig {
            kind: ChannelKind::Console,
            ..Default::default()
        };
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn script_enforcer_requires_scripts() {
        let mut config = valid_config();
        config.host.enforcer = EnforcerKind::Script;
        config.host.block_script = Some("/bin/true".into());

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::Host { field: "unblock_script", .. }
        ));
    }

    #[test]
    fn empty_monitor_command_rejected() {
        let mut config = valid_config();
        config.host.monitor_command = Some(vec![]);
        assert_eq!(validate_config(&config).len(), 1);
    }
}
