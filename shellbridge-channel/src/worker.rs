//! Shell worker lifecycle: spawning, stream plumbing, exit tracking.
//!
//! One worker is a single interpreter process with all three standard
//! streams piped. Reader tasks publish raw output chunks on per-stream
//! broadcast channels; a wait task publishes the exit code on a watch
//! channel. The dispatcher owns stdin directly so write failures surface
//! synchronously at the submission that caused them.

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::process_group;

const READ_BUF_SIZE: usize = 8_192;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Reads from an async stream and publishes chunks until EOF.
async fn read_output_stream<R>(mut reader: R, output_tx: broadcast::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                // No receiver between requests is fine; those chunks
                // belong to no pending request and are dropped.
                let _ = output_tx.send(buf[..n].to_vec());
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

/// Handle to one live worker process.
pub(crate) struct WorkerHandle {
    stdin: ChildStdin,
    stdout_tx: broadcast::Sender<Vec<u8>>,
    stderr_tx: broadcast::Sender<Vec<u8>>,
    exit_rx: watch::Receiver<Option<i32>>,
    pid: Option<u32>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
    wait_task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawns the interpreter and wires up its streams.
    ///
    /// Fails fast with [`ChannelError::SpawnFailure`]; there is no retry.
    pub(crate) async fn spawn(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let spawn_failure = |source: std::io::Error| ChannelError::SpawnFailure {
            program: config.shell_program.clone(),
            source,
        };

        let mut command = Command::new(&config.shell_program);
        command.args(&config.shell_args);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            command.pre_exec(process_group::set_process_group);
        }

        let mut child = command.spawn().map_err(spawn_failure)?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failure(std::io::Error::other("worker stdin was not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failure(std::io::Error::other("worker stdout was not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_failure(std::io::Error::other("worker stderr was not piped")))?;

        let (stdout_tx, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
        let (stderr_tx, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);

        let stdout_task = tokio::spawn(read_output_stream(
            BufReader::new(stdout),
            stdout_tx.clone(),
        ));
        let stderr_task = tokio::spawn(read_output_stream(
            BufReader::new(stderr),
            stderr_tx.clone(),
        ));

        let (exit_tx, exit_rx) = watch::channel(None);
        let wait_task = tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            let _ = exit_tx.send(Some(code));
        });

        Ok(Self {
            stdin,
            stdout_tx,
            stderr_tx,
            exit_rx,
            pid,
            stdout_task,
            stderr_task,
            wait_task,
        })
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code once the worker has exited.
    pub(crate) fn exit_code(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exit_code().is_some()
    }

    /// Resolves when the worker process exits, yielding the exit code.
    pub(crate) async fn exited(&self) -> Option<i32> {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(code) => *code,
            // The wait task never drops the sender before publishing, but
            // an aborted task leaves the receiver dangling.
            Err(_) => None,
        }
    }

    /// Fresh subscription delivering only chunks published from now on.
    pub(crate) fn subscribe_stdout(&self) -> broadcast::Receiver<Vec<u8>> {
        self.stdout_tx.subscribe()
    }

    /// Fresh subscription delivering only chunks published from now on.
    pub(crate) fn subscribe_stderr(&self) -> broadcast::Receiver<Vec<u8>> {
        self.stderr_tx.subscribe()
    }

    /// Writes raw bytes to the worker's input stream and flushes.
    pub(crate) async fn write_stdin(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(bytes).await?;
        self.stdin.flush().await
    }

    /// Best-effort termination of the worker and its process group.
    pub(crate) fn terminate(&mut self) {
        if let Some(pid) = self.pid {
            #[cfg(unix)]
            {
                let _ = process_group::kill_process_group(pid);
            }
            #[cfg(not(unix))]
            {
                let _ = pid;
            }
        }
        self.stdout_task.abort();
        self.stderr_task.abort();
        // Aborting the wait task drops the child; kill_on_drop reaps it
        // on platforms without process-group signalling.
        self.wait_task.abort();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}
