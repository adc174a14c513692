//! Caller-layer command tool.
//!
//! Renders channel outcomes as JSON payloads for the tool-dispatch
//! boundary. Channel errors become structured error payloads rather than
//! faults; whether to retry, report, or issue a corrective follow-up
//! command is the caller's decision.

use serde_json::{Value, json};
use tracing::debug;

use shellbridge_channel::{ChannelError, CommandChannel, CommandResult};

/// Executes shell commands on behalf of the agent through the persistent
/// channel.
pub struct CommandTool {
    channel: CommandChannel,
}

impl CommandTool {
    pub fn new(channel: CommandChannel) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Submits `command` and renders the outcome as a JSON payload.
    pub async fn execute(&self, command: &str) -> Value {
        debug!(command, "executing command via channel");
        match self.channel.submit(command).await {
            Ok(result) => result_payload(&result),
            Err(error) => error_payload(&error),
        }
    }
}

fn result_payload(result: &CommandResult) -> Value {
    serde_json::to_value(result).unwrap_or_else(|_| {
        json!({
            "success": false,
            "error": "failed to serialize command result",
            "error_kind": "serialization",
        })
    })
}

fn error_payload(error: &ChannelError) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
        "error_kind": error_kind(error),
    })
}

fn error_kind(error: &ChannelError) -> &'static str {
    match error {
        ChannelError::SpawnFailure { .. } => "spawn_failure",
        ChannelError::WorkerUnavailable { .. } => "worker_unavailable",
        ChannelError::EmptyCommand => "empty_command",
        ChannelError::InvalidConfig(_) => "invalid_config",
        ChannelError::ChannelClosed => "channel_closed",
    }
}
