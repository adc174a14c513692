use serde::{Deserialize, Serialize};

/// Terminal classification of one submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// The worker ran the command and it exited zero.
    Success,
    /// The worker ran the command and it exited non-zero.
    Failed,
    /// No completion sentinel appeared within the configured countdown.
    /// The command may still be running inside the worker.
    TimedOut,
    /// The framed command never reached the worker's input stream.
    WriteError,
}

impl CommandStatus {
    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::WriteError => "write_error",
        }
    }
}

/// Immutable outcome of one submitted command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Terminal classification.
    pub status: CommandStatus,
    /// Convenience flag; true only for [`CommandStatus::Success`].
    pub success: bool,
    /// Captured standard output with sentinel markers removed and
    /// surrounding whitespace trimmed. Empty unless the command resolved
    /// through marker detection.
    pub stdout: String,
    /// Captured standard error, trimmed; `None` when nothing was emitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Wall-clock duration from submission to resolution.
    pub execution_time_ms: u64,
    /// Raw standard output accumulated before a timeout, byte-for-byte.
    /// Present only for [`CommandStatus::TimedOut`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_output: Option<String>,
}

impl CommandResult {
    pub(crate) fn completed(
        status: CommandStatus,
        stdout: String,
        stderr: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            status,
            success: status == CommandStatus::Success,
            stdout,
            stderr,
            execution_time_ms,
            partial_output: None,
        }
    }

    pub(crate) fn timed_out(
        partial_output: String,
        stderr: Option<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            status: CommandStatus::TimedOut,
            success: false,
            stdout: String::new(),
            stderr,
            execution_time_ms,
            partial_output: Some(partial_output),
        }
    }

    pub(crate) fn write_error(execution_time_ms: u64) -> Self {
        Self {
            status: CommandStatus::WriteError,
            success: false,
            stdout: String::new(),
            stderr: None,
            execution_time_ms,
            partial_output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let value = serde_json::to_value(CommandStatus::TimedOut).expect("serialize");
        assert_eq!(value, "timed_out");
        assert_eq!(CommandStatus::WriteError.as_str(), "write_error");
    }

    #[test]
    fn success_flag_tracks_status() {
        let ok = CommandResult::completed(CommandStatus::Success, "hi".into(), None, 5);
        assert!(ok.success);

        let failed = CommandResult::completed(CommandStatus::Failed, String::new(), None, 5);
        assert!(!failed.success);

        let timed_out = CommandResult::timed_out(String::new(), None, 30_000);
        assert!(!timed_out.success);
        assert_eq!(timed_out.partial_output.as_deref(), Some(""));
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let result = CommandResult::completed(CommandStatus::Success, "out".into(), None, 1);
        let value = serde_json::to_value(&result).expect("serialize");
        assert!(value.get("stderr").is_none());
        assert!(value.get("partial_output").is_none());
    }
}
