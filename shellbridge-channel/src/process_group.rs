//! Process-group helpers for reliable worker cleanup.
//!
//! The worker is started as the leader of its own process group so that
//! tearing the channel down can signal the interpreter together with
//! anything it spawned, not just the interpreter itself. On non-Unix
//! platforms these helpers are no-ops; cleanup falls back to killing the
//! worker process directly.

use std::io;

/// Puts the calling process into its own process group.
///
/// Intended for use in `pre_exec` so the worker becomes the group leader.
#[cfg(unix)]
pub fn set_process_group() -> io::Result<()> {
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn set_process_group() -> io::Result<()> {
    Ok(())
}

/// Sends SIGKILL to the process group led by `pid` (best-effort).
///
/// A group that has already disappeared is not an error.
#[cfg(unix)]
pub fn kill_process_group(pid: u32) -> io::Result<()> {
    let pid = pid as libc::pid_t;
    let pgid = unsafe { libc::getpgid(pid) };
    if pgid == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }

    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn kill_process_group(_pid: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn killing_a_nonexistent_group_is_not_an_error() {
        // PID far above any real process; ESRCH is swallowed.
        let result = kill_process_group(2_000_000_000);
        assert!(result.is_ok());
    }
}
