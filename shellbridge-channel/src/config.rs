use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Default countdown before an in-flight command resolves as timed out.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default completion sentinel echoed after a zero exit status.
///
/// High-entropy suffix so real command output is unlikely to collide.
pub const DEFAULT_SUCCESS_MARKER: &str = "__SHBR_OK_c41de592__";

/// Default completion sentinel echoed after a non-zero exit status.
pub const DEFAULT_FAILURE_MARKER: &str = "__SHBR_ERR_c41de592__";

fn default_shell_program() -> String {
    #[cfg(unix)]
    {
        "/bin/sh".to_string()
    }
    #[cfg(not(unix))]
    {
        "powershell".to_string()
    }
}

fn default_shell_args() -> Vec<String> {
    #[cfg(unix)]
    {
        Vec::new()
    }
    #[cfg(not(unix))]
    {
        vec![
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-Command".to_string(),
            "-".to_string(),
        ]
    }
}

/// Configuration for one [`CommandChannel`][crate::CommandChannel].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Interpreter launched as the persistent worker.
    pub shell_program: String,
    /// Arguments passed to the interpreter.
    pub shell_args: Vec<String>,
    /// Working directory for the worker; inherits the parent's when unset.
    pub working_dir: Option<PathBuf>,
    /// Countdown in milliseconds before an in-flight command resolves as
    /// timed out.
    pub command_timeout_ms: u64,
    /// Sentinel echoed when the framed command exits zero.
    pub success_marker: String,
    /// Sentinel echoed when the framed command exits non-zero.
    pub failure_marker: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            shell_program: default_shell_program(),
            shell_args: default_shell_args(),
            working_dir: None,
            command_timeout_ms: DEFAULT_TIMEOUT_MS,
            success_marker: DEFAULT_SUCCESS_MARKER.to_string(),
            failure_marker: DEFAULT_FAILURE_MARKER.to_string(),
        }
    }
}

impl ChannelConfig {
    /// Command timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Checks invariants the framing protocol depends on.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.shell_program.trim().is_empty() {
            return Err(ChannelError::InvalidConfig(
                "shell_program must not be empty".to_string(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(ChannelError::InvalidConfig(
                "command_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for (name, marker) in [
            ("success_marker", &self.success_marker),
            ("failure_marker", &self.failure_marker),
        ] {
            if marker.is_empty() {
                return Err(ChannelError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
            if marker.chars().any(char::is_whitespace) {
                return Err(ChannelError::InvalidConfig(format!(
                    "{name} must not contain whitespace"
                )));
            }
        }
        // A sentinel contained in the other would make the earliest-hit
        // classification ambiguous.
        if self.success_marker.contains(&self.failure_marker)
            || self.failure_marker.contains(&self.success_marker)
        {
            return Err(ChannelError::InvalidConfig(
                "success_marker and failure_marker must not contain each other".to_string(),
            ));
        }
        Ok(())
    }
}
