//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "shellbridge",
    about = "Drive a persistent shell worker over a sentinel-framed command channel",
    version
)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./shellbridge.toml
    /// when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Shell program override.
    #[arg(long, global = true)]
    pub shell: Option<String>,

    /// Command timeout override in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit one command through the persistent channel and print the
    /// structured result as JSON.
    Exec {
        /// Command text to execute.
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Interactive loop driving the channel (`:restart` respawns the
    /// worker, `:quit` exits).
    Repl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exec_collects_trailing_words() {
        let cli = Cli::parse_from(["shellbridge", "exec", "echo", "hello", "world"]);
        match cli.command {
            Commands::Exec { command } => {
                assert_eq!(command.join(" "), "echo hello world");
            }
            other => panic!("unexpected subcommand: {other:?}"),
        }
    }

    #[test]
    fn overrides_are_global() {
        let cli = Cli::parse_from(["shellbridge", "exec", "--timeout-ms", "500", "true"]);
        assert_eq!(cli.timeout_ms, Some(500));
    }
}
