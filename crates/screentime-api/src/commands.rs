//! Operator command vocabulary

use std::str::FromStr;
use thiserror::Error;

/// A parsed operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Show the command list
    Help,

    /// Show today's usage
    Status,

    /// Raise today's limit
    Add { minutes: u32 },

    /// Lower today's limit (may block as a side effect)
    Remove { minutes: u32 },

    /// Lift an active block
    Unlock,
}

impl OperatorCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Status => "status",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Unlock => "unlock",
        }
    }
}

/// Why a command could not be parsed. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("Missing number of minutes. Usage: {command} <minutes>, e.g. {command} {example}")]
    MissingMinutes {
        command: &'static str,
        example: u32,
    },

    #[error("Invalid number of minutes '{value}'. Give a positive whole number.")]
    InvalidMinutes { command: &'static str, value: String },

    #[error("Unknown command '{0}'. Send help for the list of commands.")]
    Unknown(String),
}

impl FromStr for OperatorCommand {
    type Err = CommandParseError;

    /// Accepts `status`, `/status`, and `/status@SomeBot`, case-insensitively.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (head, args) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };

        let name = head.strip_prefix('/').unwrap_or(head);
        let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();

        match name.as_str() {
            "start" | "help" => Ok(Self::Help),
            "status" => Ok(Self::Status),
            "add" => parse_minutes("add", 30, args).map(|minutes| Self::Add { minutes }),
            "remove" => parse_minutes("remove", 15, args).map(|minutes| Self::Remove { minutes }),
            "unlock" => Ok(Self::Unlock),
            _ => Err(CommandParseError::Unknown(head.to_string())),
        }
    }
}

fn parse_minutes(
    command: &'static str,
    example: u32,
    args: &str,
) -> Result<u32, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::MissingMinutes { command, example });
    }

    match args.parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(CommandParseError::InvalidMinutes {
            command,
            value: args.to_string(),
        }),
    }
}

/// Static help text listing the command vocabulary.
pub const HELP_TEXT: &str = "Screen time control\n\n\
Commands:\n\
/status - show today's usage\n\
/add <minutes> - add minutes to today's limit\n\
/remove <minutes> - remove minutes from today's limit\n\
/unlock - unblock the user\n\
/help - show this message";
