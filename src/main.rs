//! Thin binary entry point: configuration, tracing, dispatch.

use anyhow::Result;
use clap::Parser;

use shellbridge::config::AppConfig;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (non-fatal if missing).
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(shell) = args.shell {
        config.channel.shell_program = shell;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.channel.command_timeout_ms = timeout_ms;
    }

    init_tracing(&config);

    match args.command {
        Commands::Exec { command } => {
            let code = commands::handle_exec(config.channel, &command.join(" ")).await?;
            std::process::exit(code);
        }
        Commands::Repl => commands::handle_repl(config.channel).await,
    }
}

fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
