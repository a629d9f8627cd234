//! Shared types for screentimed
//!
//! This crate defines the vocabulary shared by the core and its transports:
//! - The daily time budget record
//! - Operator commands and their parser
//! - The command channel interface (and a scripted mock for tests)

mod channel;
mod commands;
mod mock;
mod types;

pub use channel::*;
pub use commands::*;
pub use mock::*;
pub use types::*;
