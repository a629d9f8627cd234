//! Config validation CLI tool
//!
//! Validates a screentimed configuration file and reports any errors.

use screentime_config::{ChannelConfig, EnforcerConfig, MonitorConfig};
use screentime_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a screentimed configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match screentime_config::load_config(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", screentime_config::CURRENT_CONFIG_VERSION);
            println!("  User: {}", config.user);
            println!("  Daily limit: {} min", config.daily_limit_minutes);
            println!("  Tick: {}s", config.tick_interval.as_secs());

            let monitor = match &config.host.monitor {
                MonitorConfig::Who { argv } => format!("who ({})", argv.join(" ")),
                MonitorConfig::ProcessOwner => "process_owner".to_string(),
            };
            let enforcer = match &config.host.enforcer {
                EnforcerConfig::Account => "account".to_string(),
                EnforcerConfig::Script { block, unblock } => {
                    format!("script ({} / {})", block.display(), unblock.display())
                }
            };
            let channel = match &config.channel {
                ChannelConfig::Telegram(tg) => format!("telegram (admin {})", tg.admin_id),
                ChannelConfig::Console => "console".to_string(),
            };

            println!("  Monitor: {}", monitor);
            println!("  Enforcer: {}", enforcer);
            println!("  Channel: {}", channel);
            println!(
                "  Store: {:?} in {}",
                config.service.backend,
                config.service.data_dir.display()
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Configuration validation failed");
            eprintln!();
            match &e {
                screentime_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                screentime_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                screentime_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                screentime_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        screentime_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
