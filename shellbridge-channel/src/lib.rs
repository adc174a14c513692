//! Persistent shell command channel.
//!
//! A single long-lived interpreter process is driven through its standard
//! streams: submitted command text is framed with completion sentinels,
//! output is accumulated and re-scanned until a sentinel appears, and each
//! request resolves exactly once with a structured outcome (success,
//! failure, timeout, or write error). Submissions are serialized FIFO so
//! only one command is ever outstanding against the worker.

pub mod channel;
pub mod config;
pub mod error;
mod framing;
pub mod process_group;
pub mod result;
mod worker;

pub use channel::CommandChannel;
pub use config::{
    ChannelConfig, DEFAULT_FAILURE_MARKER, DEFAULT_SUCCESS_MARKER, DEFAULT_TIMEOUT_MS,
};
pub use error::ChannelError;
pub use result::{CommandResult, CommandStatus};
