//! Host capability interfaces for screentimed
//!
//! This crate defines the interface between the budget core and
//! platform-specific mechanisms. It contains no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
