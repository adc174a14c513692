//! Application configuration: `shellbridge.toml` plus environment
//! overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use shellbridge_channel::ChannelConfig;

/// File looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "shellbridge.toml";

const ENV_SHELL: &str = "SHELLBRIDGE_SHELL";
const ENV_TIMEOUT_MS: &str = "SHELLBRIDGE_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub channel: ChannelConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Loads configuration with the usual precedence: defaults, then the
    /// TOML file, then environment overrides. An explicitly named file
    /// must exist; the conventional `shellbridge.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let conventional = Path::new(CONFIG_FILE_NAME);
                if conventional.exists() {
                    Self::from_file(conventional)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(shell) = lookup(ENV_SHELL) {
            if !shell.trim().is_empty() {
                self.channel.shell_program = shell;
            }
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.channel.command_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring non-numeric {ENV_TIMEOUT_MS}"),
            }
        }
    }
}
