//! Shared utilities for screentimed
//!
//! This crate provides:
//! - Wall-clock time with mock time support for development
//! - The `Clock` abstraction used by the budget store
//! - Default paths for config and data directories

mod paths;
mod time;

pub use paths::*;
pub use time::*;
