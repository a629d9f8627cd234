//! Core budget engine for screentimed
//!
//! This crate is the heart of screentimed, containing:
//! - The budget store: sole owner of the daily record, serializing every
//!   read-modify-write and persisting before returning
//! - Access control: block/unblock sequences that never interleave
//! - The periodic enforcement loop (Active -> Blocked per day)
//! - Operator command handling and reply formatting

mod access;
mod budget;
mod context;
mod enforcement;
mod processor;
mod replies;

pub use access::*;
pub use budget::*;
pub use context::*;
pub use enforcement::*;
pub use processor::*;
pub use replies::*;
