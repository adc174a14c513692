use thiserror::Error;

/// Failures surfaced by the command channel.
///
/// Timeout, write failure, and non-zero command exit are NOT errors:
/// they are ordinary [`CommandResult`][crate::CommandResult] outcomes.
/// This enum covers conditions under which no result exists at all.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The worker process could not be started. Fatal for the channel:
    /// no command will be accepted until a new worker is established.
    #[error("failed to spawn shell worker `{program}`: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker process has exited and no replacement has been
    /// started. Call [`CommandChannel::restart`][crate::CommandChannel::restart]
    /// before submitting again.
    #[error("shell worker is unavailable")]
    WorkerUnavailable {
        /// Exit code of the dead worker, when it was observed.
        exit_code: Option<i32>,
    },

    /// Command text was empty or whitespace-only; nothing was written
    /// to the worker.
    #[error("command text must not be empty")]
    EmptyCommand,

    /// The channel configuration failed validation.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The dispatcher task is gone; the channel was shut down.
    #[error("command channel is closed")]
    ChannelClosed,
}
