//! End-to-end tests against a real `/bin/sh` worker.
#![cfg(unix)]

use std::time::Instant;

use shellbridge_channel::{ChannelConfig, ChannelError, CommandChannel, CommandStatus};

fn sh_config() -> ChannelConfig {
    ChannelConfig {
        shell_program: "/bin/sh".to_string(),
        shell_args: Vec::new(),
        ..Default::default()
    }
}

fn sh_config_with_timeout(timeout_ms: u64) -> ChannelConfig {
    ChannelConfig {
        command_timeout_ms: timeout_ms,
        ..sh_config()
    }
}

#[tokio::test]
async fn echo_resolves_with_clean_stdout() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    let result = channel.submit("echo hello").await.expect("submit");
    assert_eq!(result.status, CommandStatus::Success);
    assert!(result.success);
    assert_eq!(result.stdout, "hello");
    assert_eq!(result.stderr, None);
    assert!(result.partial_output.is_none());

    channel.shutdown().await;
}

#[tokio::test]
async fn non_zero_exit_is_a_normal_failed_result() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    let result = channel.submit("false").await.expect("submit");
    assert_eq!(result.status, CommandStatus::Failed);
    assert!(!result.success);
    assert_eq!(result.stdout, "");

    channel.shutdown().await;
}

#[tokio::test]
async fn stderr_is_captured_independently() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    let result = channel
        .submit("echo visible; echo hidden 1>&2")
        .await
        .expect("submit");
    assert_eq!(result.status, CommandStatus::Success);
    assert_eq!(result.stdout, "visible");
    assert_eq!(result.stderr.as_deref(), Some("hidden"));

    channel.shutdown().await;
}

#[tokio::test]
async fn empty_command_is_rejected_before_the_worker() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    assert!(matches!(
        channel.submit("").await,
        Err(ChannelError::EmptyCommand)
    ));
    assert!(matches!(
        channel.submit("   \t").await,
        Err(ChannelError::EmptyCommand)
    ));

    // The channel still serves ordinary commands afterwards.
    let result = channel.submit("echo ok").await.expect("submit");
    assert_eq!(result.stdout, "ok");

    channel.shutdown().await;
}

#[tokio::test]
async fn worker_state_persists_across_commands() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    let set = channel.submit("GREETING=hello").await.expect("submit");
    assert_eq!(set.status, CommandStatus::Success);

    let get = channel.submit("echo \"$GREETING world\"").await.expect("submit");
    assert_eq!(get.stdout, "hello world");

    channel.shutdown().await;
}

#[tokio::test]
async fn silent_command_times_out_with_empty_partial_output() {
    let channel = CommandChannel::start(sh_config_with_timeout(300))
        .await
        .expect("start");

    let started = Instant::now();
    let result = channel.submit("sleep 5").await.expect("submit");
    let elapsed = started.elapsed().as_millis();

    assert_eq!(result.status, CommandStatus::TimedOut);
    assert!(!result.success);
    assert_eq!(result.partial_output.as_deref(), Some(""));
    assert!(elapsed >= 300, "resolved after {elapsed}ms");
    assert!(elapsed < 3_000, "resolved after {elapsed}ms");

    channel.shutdown().await;
}

#[tokio::test]
async fn timeout_preserves_partial_output_byte_for_byte() {
    let channel = CommandChannel::start(sh_config_with_timeout(300))
        .await
        .expect("start");

    let result = channel.submit("echo part; sleep 5").await.expect("submit");
    assert_eq!(result.status, CommandStatus::TimedOut);
    // Raw accumulated bytes: no sentinel stripping, no trimming.
    assert_eq!(result.partial_output.as_deref(), Some("part\n"));

    channel.shutdown().await;
}

#[tokio::test]
async fn concurrent_submissions_do_not_interleave_output() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    let first = channel.clone();
    let second = channel.clone();
    let (a, b) = tokio::join!(first.submit("echo A"), second.submit("echo B"));

    let a = a.expect("first submit");
    let b = b.expect("second submit");
    assert_eq!(a.stdout, "A");
    assert_eq!(b.stdout, "B");
    assert_eq!(a.status, CommandStatus::Success);
    assert_eq!(b.status, CommandStatus::Success);

    channel.shutdown().await;
}

#[tokio::test]
async fn worker_death_fails_pending_and_later_requests_until_restart() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");

    // `exit` terminates the interpreter itself; no sentinel ever appears.
    let death = channel.submit("exit 7").await;
    assert!(matches!(
        death,
        Err(ChannelError::WorkerUnavailable { exit_code: Some(7) })
    ));

    // Still down: rejected without waiting for a timeout.
    let started = Instant::now();
    let refused = channel.submit("echo up?").await;
    assert!(matches!(refused, Err(ChannelError::WorkerUnavailable { .. })));
    assert!(started.elapsed().as_millis() < 1_000);

    channel.restart().await.expect("restart");

    let result = channel.submit("echo back").await.expect("submit");
    assert_eq!(result.stdout, "back");

    channel.shutdown().await;
}

#[tokio::test]
async fn write_failure_resolves_immediately_not_as_timeout() {
    // The worker closes its own stdin and then lingers, so the pipe has
    // no reader while the process is still alive.
    let config = ChannelConfig {
        shell_program: "/bin/sh".to_string(),
        shell_args: vec!["-c".to_string(), "exec 0<&-; sleep 30".to_string()],
        command_timeout_ms: 10_000,
        ..Default::default()
    };
    let channel = CommandChannel::start(config).await.expect("start");
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let started = Instant::now();
    let result = channel.submit("echo never").await.expect("submit");
    assert_eq!(result.status, CommandStatus::WriteError);
    assert!(!result.success);
    // Resolved well before the 10s countdown could have fired.
    assert!(started.elapsed().as_millis() < 5_000);

    channel.shutdown().await;
}

#[tokio::test]
async fn echoed_sentinel_is_classified_by_earliest_occurrence() {
    let config = sh_config();
    let failure_marker = config.failure_marker.clone();
    let channel = CommandChannel::start(config).await.expect("start");

    // The command prints the failure sentinel before its own success
    // sentinel arrives; first-detected wins.
    let result = channel
        .submit(format!("echo {failure_marker}"))
        .await
        .expect("submit");
    assert_eq!(result.status, CommandStatus::Failed);
    assert_eq!(result.stdout, "");

    channel.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_the_channel() {
    let channel = CommandChannel::start(sh_config()).await.expect("start");
    channel.shutdown().await;

    assert!(matches!(
        channel.submit("echo late").await,
        Err(ChannelError::ChannelClosed)
    ));
}
