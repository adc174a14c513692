//! Structured telemetry events emitted by the shell command channel.
//!
//! This crate exposes the serialized schema for worker lifecycle updates
//! and command execution outcomes emitted by the channel runtime.
//! Downstream applications can deserialize these structures to drive
//! logging or auditing pipelines without depending on the channel
//! implementation itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic version of the serialized event schema exported by this crate.
pub const EVENT_SCHEMA_VERSION: &str = "0.1.0";

/// Wraps a [`ChannelEvent`] with schema metadata so downstream consumers
/// can negotiate compatibility before processing an event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionedChannelEvent {
    /// Semantic version describing the schema of the nested event payload.
    pub schema_version: String,
    /// Concrete event emitted by the channel runtime.
    pub event: ChannelEvent,
}

impl VersionedChannelEvent {
    /// Creates a new [`VersionedChannelEvent`] using the current
    /// [`EVENT_SCHEMA_VERSION`].
    pub fn new(event: ChannelEvent) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            event,
        }
    }

    /// Returns the nested [`ChannelEvent`], consuming the wrapper.
    pub fn into_event(self) -> ChannelEvent {
        self.event
    }
}

impl From<ChannelEvent> for VersionedChannelEvent {
    fn from(event: ChannelEvent) -> Self {
        Self::new(event)
    }
}

/// Sink for processing [`ChannelEvent`] instances.
pub trait EventEmitter {
    /// Invoked for each event emitted by the channel runtime.
    fn emit(&mut self, event: &ChannelEvent);
}

impl<F> EventEmitter for F
where
    F: FnMut(&ChannelEvent),
{
    fn emit(&mut self, event: &ChannelEvent) {
        self(event);
    }
}

/// Emits structured events as `tracing` events at the specified level.
#[derive(Debug, Clone)]
pub struct TracingEmitter {
    level: tracing::Level,
}

impl TracingEmitter {
    /// Creates a new [`TracingEmitter`] with the provided [`tracing::Level`].
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }
}

impl Default for TracingEmitter {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
        }
    }
}

impl EventEmitter for TracingEmitter {
    fn emit(&mut self, event: &ChannelEvent) {
        match self.level {
            tracing::Level::TRACE => tracing::event!(
                target: "shellbridge_events",
                tracing::Level::TRACE,
                schema_version = EVENT_SCHEMA_VERSION,
                event = ?event,
                "channel_event"
            ),
            tracing::Level::DEBUG => tracing::event!(
                target: "shellbridge_events",
                tracing::Level::DEBUG,
                schema_version = EVENT_SCHEMA_VERSION,
                event = ?event,
                "channel_event"
            ),
            tracing::Level::INFO => tracing::event!(
                target: "shellbridge_events",
                tracing::Level::INFO,
                schema_version = EVENT_SCHEMA_VERSION,
                event = ?event,
                "channel_event"
            ),
            tracing::Level::WARN => tracing::event!(
                target: "shellbridge_events",
                tracing::Level::WARN,
                schema_version = EVENT_SCHEMA_VERSION,
                event = ?event,
                "channel_event"
            ),
            tracing::Level::ERROR => tracing::event!(
                target: "shellbridge_events",
                tracing::Level::ERROR,
                schema_version = EVENT_SCHEMA_VERSION,
                event = ?event,
                "channel_event"
            ),
        }
    }
}

/// JSON helper utilities for serializing and deserializing channel events.
pub mod json {
    use super::{ChannelEvent, VersionedChannelEvent};

    /// Converts an event into a `serde_json::Value`.
    pub fn to_value(event: &ChannelEvent) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(event)
    }

    /// Serializes an event into a JSON string.
    pub fn to_string(event: &ChannelEvent) -> serde_json::Result<String> {
        serde_json::to_string(event)
    }

    /// Deserializes an event from a JSON string.
    pub fn from_str(payload: &str) -> serde_json::Result<ChannelEvent> {
        serde_json::from_str(payload)
    }

    /// Serializes a [`VersionedChannelEvent`] wrapper.
    pub fn versioned_to_string(event: &ChannelEvent) -> serde_json::Result<String> {
        serde_json::to_string(&VersionedChannelEvent::new(event.clone()))
    }

    /// Deserializes a [`VersionedChannelEvent`] wrapper.
    pub fn versioned_from_str(payload: &str) -> serde_json::Result<VersionedChannelEvent> {
        serde_json::from_str(payload)
    }
}

/// Generates a fresh identifier for one submitted command.
pub fn new_command_id() -> String {
    Uuid::new_v4().to_string()
}

/// Structured events emitted during channel operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ChannelEvent {
    /// A worker process was spawned and is accepting commands.
    #[serde(rename = "worker.started")]
    WorkerStarted(WorkerStartedEvent),
    /// The worker process exited; the channel is unavailable until restarted.
    #[serde(rename = "worker.exited")]
    WorkerExited(WorkerExitedEvent),
    /// A command was written to the worker.
    #[serde(rename = "command.started")]
    CommandStarted(CommandStartedEvent),
    /// A command reached a terminal outcome.
    #[serde(rename = "command.completed")]
    CommandCompleted(CommandCompletedEvent),
}

impl ChannelEvent {
    /// Builds a `worker.started` event stamped with the current time.
    pub fn worker_started(pid: Option<u32>, shell: impl Into<String>) -> Self {
        Self::WorkerStarted(WorkerStartedEvent {
            pid,
            shell: shell.into(),
            at: Utc::now(),
        })
    }

    /// Builds a `worker.exited` event stamped with the current time.
    pub fn worker_exited(pid: Option<u32>, exit_code: Option<i32>) -> Self {
        Self::WorkerExited(WorkerExitedEvent {
            pid,
            exit_code,
            at: Utc::now(),
        })
    }

    /// Builds a `command.started` event stamped with the current time.
    pub fn command_started(command_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self::CommandStarted(CommandStartedEvent {
            command_id: command_id.into(),
            command: command.into(),
            at: Utc::now(),
        })
    }

    /// Builds a `command.completed` event stamped with the current time.
    pub fn command_completed(
        command_id: impl Into<String>,
        status: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self::CommandCompleted(CommandCompletedEvent {
            command_id: command_id.into(),
            status: status.into(),
            execution_time_ms,
            at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerStartedEvent {
    /// OS process id of the worker, when available.
    pub pid: Option<u32>,
    /// Shell program backing the worker.
    pub shell: String,
    /// When the worker became available.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerExitedEvent {
    /// OS process id of the worker, when available.
    pub pid: Option<u32>,
    /// Exit code reported by the OS, when observed.
    pub exit_code: Option<i32>,
    /// When the exit was detected.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandStartedEvent {
    /// Stable identifier correlating start/completion of one command.
    pub command_id: String,
    /// Submitted command text (unframed).
    pub command: String,
    /// When the command was written to the worker.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandCompletedEvent {
    /// Stable identifier correlating start/completion of one command.
    pub command_id: String,
    /// Terminal status (`success`, `failed`, `timed_out`, `write_error`).
    pub status: String,
    /// Wall-clock duration from submission to resolution.
    pub execution_time_ms: u64,
    /// When the outcome was resolved.
    pub at: DateTime<Utc>,
}
