//! Operator command channels for screentimed
//!
//! Implementations of [`screentime_api::CommandChannel`]:
//! - Telegram Bot API (long polling), restricted to one administrator
//! - Local console (stdin/stdout), for development and testing

mod console;
mod telegram;

pub use console::*;
pub use telegram::*;
