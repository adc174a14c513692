//! The command channel: FIFO dispatch of framed commands against one
//! persistent worker.
//!
//! A single dispatcher task owns the worker process and serves requests
//! strictly in submission order, so at most one command is ever
//! outstanding against the worker. Two commands written back-to-back
//! would interleave their output in the shared stream and corrupt
//! attribution; the queue is what prevents that.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use shellbridge_events::{ChannelEvent, EventEmitter, new_command_id};

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::framing::{MarkerHit, frame_command, scan_for_marker, strip_markers};
use crate::result::{CommandResult, CommandStatus};
use crate::worker::WorkerHandle;

const REQUEST_QUEUE_CAPACITY: usize = 32;

/// Quiet period granted to the stderr stream after the completion
/// sentinel appears on stdout; the two pipes race and stderr written
/// just before the sentinel may not have been delivered yet.
const STDERR_DRAIN_QUIET: Duration = Duration::from_millis(20);
const STDERR_DRAIN_MAX: Duration = Duration::from_millis(200);

type Emitter = Box<dyn EventEmitter + Send>;

enum ChannelRequest {
    Submit {
        command: String,
        reply: oneshot::Sender<Result<CommandResult, ChannelError>>,
    },
    Restart {
        reply: oneshot::Sender<Result<(), ChannelError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle to the dispatcher task.
///
/// All clones feed the same FIFO queue; dropping every clone shuts the
/// dispatcher down and terminates the worker.
#[derive(Clone)]
pub struct CommandChannel {
    tx: mpsc::Sender<ChannelRequest>,
}

impl CommandChannel {
    /// Validates the configuration, spawns the worker, and starts the
    /// dispatcher. Spawn failure is fatal: no channel is returned.
    pub async fn start(config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::start_inner(config, None).await
    }

    /// Like [`start`][Self::start], wiring a telemetry emitter into the
    /// dispatcher.
    pub async fn start_with_emitter(
        config: ChannelConfig,
        emitter: Emitter,
    ) -> Result<Self, ChannelError> {
        Self::start_inner(config, Some(emitter)).await
    }

    async fn start_inner(config: ChannelConfig, emitter: Option<Emitter>) -> Result<Self, ChannelError> {
        config.validate()?;
        let worker = WorkerHandle::spawn(&config).await?;
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let dispatcher = Dispatcher {
            config,
            worker: Some(worker),
            last_exit_code: None,
            emitter,
        };
        tokio::spawn(dispatcher.run(rx));
        Ok(Self { tx })
    }

    /// Submits command text and suspends until it resolves.
    ///
    /// Timeout, write failure, and non-zero exit come back as ordinary
    /// [`CommandResult`] outcomes; `Err` means no result exists at all
    /// (empty command, dead worker, closed channel).
    pub async fn submit(&self, command: impl Into<String>) -> Result<CommandResult, ChannelError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(ChannelError::EmptyCommand);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ChannelRequest::Submit {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ChannelError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ChannelError::ChannelClosed)?
    }

    /// Replaces the worker with a freshly spawned one.
    ///
    /// Required after the worker dies; also valid against a live worker,
    /// which is terminated first.
    pub async fn restart(&self) -> Result<(), ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ChannelRequest::Restart { reply: reply_tx })
            .await
            .map_err(|_| ChannelError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ChannelError::ChannelClosed)?
    }

    /// Terminates the worker and stops the dispatcher. Queued requests
    /// submitted after this call fail with [`ChannelError::ChannelClosed`].
    pub async fn shutdown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(ChannelRequest::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }
}

struct Dispatcher {
    config: ChannelConfig,
    worker: Option<WorkerHandle>,
    last_exit_code: Option<i32>,
    emitter: Option<Emitter>,
}

impl Dispatcher {
    async fn run(mut self, mut rx: mpsc::Receiver<ChannelRequest>) {
        if let Some(worker) = &self.worker {
            let event = ChannelEvent::worker_started(worker.pid(), &self.config.shell_program);
            self.emit(event);
        }

        while let Some(request) = rx.recv().await {
            match request {
                ChannelRequest::Submit { command, reply } => {
                    let result = self.handle_submit(&command).await;
                    let _ = reply.send(result);
                }
                ChannelRequest::Restart { reply } => {
                    let _ = reply.send(self.handle_restart().await);
                }
                ChannelRequest::Shutdown { reply } => {
                    self.retire_worker();
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle dropped.
        self.retire_worker();
    }

    fn emit(&mut self, event: ChannelEvent) {
        if let Some(emitter) = self.emitter.as_mut() {
            emitter.emit(&event);
        }
    }

    /// Drops the current worker, recording its exit code when observed.
    fn retire_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let pid = worker.pid();
            let code = worker.exit_code();
            self.last_exit_code = code;
            worker.terminate();
            drop(worker);
            self.emit(ChannelEvent::worker_exited(pid, code));
        }
    }

    async fn handle_restart(&mut self) -> Result<(), ChannelError> {
        self.retire_worker();
        let worker = WorkerHandle::spawn(&self.config).await?;
        self.emit(ChannelEvent::worker_started(
            worker.pid(),
            &self.config.shell_program,
        ));
        self.worker = Some(worker);
        self.last_exit_code = None;
        Ok(())
    }

    async fn handle_submit(&mut self, command: &str) -> Result<CommandResult, ChannelError> {
        // A worker that died while the channel was idle is retired here
        // rather than discovered mid-request.
        if self.worker.as_ref().is_some_and(WorkerHandle::has_exited) {
            self.retire_worker();
        }
        if self.worker.is_none() {
            return Err(ChannelError::WorkerUnavailable {
                exit_code: self.last_exit_code,
            });
        }

        if command.contains(&self.config.success_marker)
            || command.contains(&self.config.failure_marker)
        {
            warn!(
                command,
                "command text contains a completion sentinel; classification is unreliable"
            );
        }

        let command_id = new_command_id();
        self.emit(ChannelEvent::command_started(command_id.clone(), command));

        let outcome = match self.worker.as_mut() {
            Some(worker) => execute(worker, &self.config, command).await,
            None => {
                return Err(ChannelError::WorkerUnavailable {
                    exit_code: self.last_exit_code,
                });
            }
        };

        match outcome {
            ExecOutcome::Resolved(result) => {
                self.emit(ChannelEvent::command_completed(
                    command_id,
                    result.status.as_str(),
                    result.execution_time_ms,
                ));
                Ok(result)
            }
            ExecOutcome::WorkerExited(exit_code) => {
                self.retire_worker();
                self.last_exit_code = self.last_exit_code.or(exit_code);
                Err(ChannelError::WorkerUnavailable {
                    exit_code: self.last_exit_code,
                })
            }
        }
    }
}

enum ExecOutcome {
    Resolved(CommandResult),
    WorkerExited(Option<i32>),
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn stderr_field(buffer: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(buffer);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Grants stderr a short quiet period after the sentinel appeared on
/// stdout, so error text written just before completion is captured.
async fn drain_stderr(stderr_rx: &mut broadcast::Receiver<Vec<u8>>, buffer: &mut Vec<u8>) {
    let deadline = tokio::time::Instant::now() + STDERR_DRAIN_MAX;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(STDERR_DRAIN_QUIET, stderr_rx.recv()).await {
            Ok(Ok(chunk)) => buffer.extend_from_slice(&chunk),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => break,
            Err(_) => break, // quiet period reached
        }
    }
}

/// Runs one framed command against the worker and resolves it exactly
/// once: by marker detection, timeout expiry, write failure, or worker
/// death.
async fn execute(
    worker: &mut WorkerHandle,
    config: &ChannelConfig,
    command: &str,
) -> ExecOutcome {
    let started = Instant::now();

    // Subscribe before writing so no byte of this command's output can be
    // missed. Chunks published while no request was active were dropped;
    // these receivers only see output from this point on.
    let mut stdout_rx = worker.subscribe_stdout();
    let mut stderr_rx = worker.subscribe_stderr();

    let framed = frame_command(command, &config.success_marker, &config.failure_marker);
    if let Err(error) = worker.write_stdin(framed.as_bytes()).await {
        debug!(%error, "failed to write framed command to worker stdin");
        // The command never reached the worker; the countdown was never
        // armed, so this request can only resolve as a write error.
        return ExecOutcome::Resolved(CommandResult::write_error(elapsed_ms(started)));
    }

    let deadline = tokio::time::Instant::now() + config.timeout();
    let mut stdout_buf: Vec<u8> = Vec::new();
    let mut stderr_buf: Vec<u8> = Vec::new();
    let mut stderr_open = true;

    // Resolution reason; the loop only records it so the branch futures
    // (which borrow the worker and receivers) are dropped before the
    // result is assembled.
    enum LoopEnd {
        Marker(MarkerHit, u64),
        TimedOut,
        WorkerExited(Option<i32>),
        StdoutClosed,
    }

    let end = loop {
        tokio::select! {
            chunk = stdout_rx.recv() => match chunk {
                Ok(bytes) => {
                    stdout_buf.extend_from_slice(&bytes);
                    let hit = scan_for_marker(
                        &stdout_buf,
                        &config.success_marker,
                        &config.failure_marker,
                    );
                    if let Some(hit) = hit {
                        break LoopEnd::Marker(hit, elapsed_ms(started));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stdout receiver lagged; dropped output chunks");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break LoopEnd::StdoutClosed;
                }
            },
            chunk = stderr_rx.recv(), if stderr_open => match chunk {
                Ok(bytes) => stderr_buf.extend_from_slice(&bytes),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stderr receiver lagged; dropped output chunks");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    stderr_open = false;
                }
            },
            code = worker.exited() => {
                break LoopEnd::WorkerExited(code);
            }
            _ = tokio::time::sleep_until(deadline) => {
                break LoopEnd::TimedOut;
            }
        }
    };

    match end {
        LoopEnd::Marker(hit, execution_time_ms) => {
            let stdout = strip_markers(&stdout_buf, &config.success_marker, &config.failure_marker);
            if stderr_open {
                drain_stderr(&mut stderr_rx, &mut stderr_buf).await;
            }
            let status = match hit {
                MarkerHit::Success => CommandStatus::Success,
                MarkerHit::Failure => CommandStatus::Failed,
            };
            ExecOutcome::Resolved(CommandResult::completed(
                status,
                stdout,
                stderr_field(&stderr_buf),
                execution_time_ms,
            ))
        }
        LoopEnd::TimedOut => {
            // The command keeps running inside the worker; dropping the
            // receivers is what stops its late output from reaching any
            // later request.
            let partial = String::from_utf8_lossy(&stdout_buf).into_owned();
            ExecOutcome::Resolved(CommandResult::timed_out(
                partial,
                stderr_field(&stderr_buf),
                elapsed_ms(started),
            ))
        }
        LoopEnd::WorkerExited(code) => ExecOutcome::WorkerExited(code),
        LoopEnd::StdoutClosed => ExecOutcome::WorkerExited(worker.exit_code()),
    }
}
