//! CLI handlers for `exec` and `repl`.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use shellbridge::tools::CommandTool;
use shellbridge_channel::{ChannelConfig, CommandChannel};
use shellbridge_events::TracingEmitter;

async fn start_channel(config: ChannelConfig) -> Result<CommandChannel> {
    CommandChannel::start_with_emitter(config, Box::new(TracingEmitter::default()))
        .await
        .context("failed to start the shell command channel")
}

/// Runs one command through the persistent channel and prints the JSON
/// payload. Returns the process exit code.
pub async fn handle_exec(config: ChannelConfig, command_text: &str) -> Result<i32> {
    let channel = start_channel(config).await?;
    let tool = CommandTool::new(channel.clone());

    let payload = tool.execute(command_text).await;
    println!("{}", serde_json::to_string_pretty(&payload)?);

    channel.shutdown().await;
    let success = payload
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    Ok(if success { 0 } else { 1 })
}

/// Interactive loop reading command lines from stdin.
pub async fn handle_repl(config: ChannelConfig) -> Result<()> {
    let channel = start_channel(config).await?;
    let tool = CommandTool::new(channel.clone());

    println!("shellbridge repl — :restart respawns the worker, :quit exits");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":restart" => match channel.restart().await {
                Ok(()) => info!("worker restarted"),
                Err(error) => eprintln!("restart failed: {error}"),
            },
            command => {
                let payload = tool.execute(command).await;
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
    }

    channel.shutdown().await;
    Ok(())
}
