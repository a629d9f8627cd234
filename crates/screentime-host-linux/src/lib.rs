//! Linux host mechanisms for screentimed
//!
//! Provides:
//! - Session detection by session listing command (`who`, `loginctl`, ...)
//! - Session detection by process ownership (`/proc`)
//! - Access revocation by account locking and session termination
//! - Access revocation by operator-provided scripts

mod command;
mod enforcer;
mod monitor;

pub use command::*;
pub use enforcer::*;
pub use monitor::*;
