//! Sentinel framing over the worker's boundary-less byte streams.
//!
//! The worker offers no message boundaries, so every command is rewritten
//! to echo a completion sentinel whose presence (and identity) carries the
//! exit status back across the output stream.

use memchr::memmem;

/// Rewrites command text so the worker echoes a completion sentinel.
pub(crate) fn frame_command(command: &str, success_marker: &str, failure_marker: &str) -> String {
    format!("{command} && echo \"{success_marker}\" || echo \"{failure_marker}\"\n")
}

/// Which sentinel was observed first in the accumulated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerHit {
    Success,
    Failure,
}

/// Scans the ENTIRE accumulated buffer for either sentinel.
///
/// Chunk boundaries carry no protocol meaning, so a sentinel split across
/// two reads is only visible against the full buffer; callers must re-scan
/// after every append. When both sentinels are present the earliest byte
/// offset is authoritative.
pub(crate) fn scan_for_marker(
    buffer: &[u8],
    success_marker: &str,
    failure_marker: &str,
) -> Option<MarkerHit> {
    let success_at = memmem::find(buffer, success_marker.as_bytes());
    let failure_at = memmem::find(buffer, failure_marker.as_bytes());
    match (success_at, failure_at) {
        (Some(ok), Some(err)) => Some(if ok <= err {
            MarkerHit::Success
        } else {
            MarkerHit::Failure
        }),
        (Some(_), None) => Some(MarkerHit::Success),
        (None, Some(_)) => Some(MarkerHit::Failure),
        (None, None) => None,
    }
}

/// Removes every occurrence of both sentinels and trims the remainder.
pub(crate) fn strip_markers(buffer: &[u8], success_marker: &str, failure_marker: &str) -> String {
    let text = String::from_utf8_lossy(buffer);
    text.replace(success_marker, "")
        .replace(failure_marker, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OK: &str = "__OK__";
    const ERR: &str = "__ERR__";

    #[test]
    fn frame_appends_sentinel_echo_and_newline() {
        let framed = frame_command("ls -la", OK, ERR);
        assert_eq!(framed, "ls -la && echo \"__OK__\" || echo \"__ERR__\"\n");
    }

    #[test]
    fn scan_finds_success_marker() {
        let buffer = b"hello\n__OK__\n";
        assert_eq!(scan_for_marker(buffer, OK, ERR), Some(MarkerHit::Success));
    }

    #[test]
    fn scan_finds_failure_marker() {
        let buffer = b"__ERR__\n";
        assert_eq!(scan_for_marker(buffer, OK, ERR), Some(MarkerHit::Failure));
    }

    #[test]
    fn scan_returns_none_without_marker() {
        assert_eq!(scan_for_marker(b"partial output", OK, ERR), None);
    }

    #[test]
    fn earliest_marker_wins_when_both_present() {
        let buffer = b"__ERR__ then later __OK__";
        assert_eq!(scan_for_marker(buffer, OK, ERR), Some(MarkerHit::Failure));

        let buffer = b"__OK__ then later __ERR__";
        assert_eq!(scan_for_marker(buffer, OK, ERR), Some(MarkerHit::Success));
    }

    #[test]
    fn marker_split_across_chunks_is_found_once_complete() {
        // Simulates incremental accumulation: the sentinel arrives in two
        // reads and only the full-buffer scan can see it.
        let mut buffer: Vec<u8> = b"output __O".to_vec();
        assert_eq!(scan_for_marker(&buffer, OK, ERR), None);

        buffer.extend_from_slice(b"K__ tail");
        assert_eq!(scan_for_marker(&buffer, OK, ERR), Some(MarkerHit::Success));
    }

    #[test]
    fn strip_removes_all_occurrences_and_trims() {
        let buffer = b"  hello __OK__ world __OK__\n";
        assert_eq!(strip_markers(buffer, OK, ERR), "hello  world");
    }

    #[test]
    fn strip_handles_invalid_utf8_lossily() {
        let mut buffer = b"ok \xff__OK__".to_vec();
        buffer.extend_from_slice(b"\n");
        let stripped = strip_markers(&buffer, OK, ERR);
        assert!(stripped.starts_with("ok"));
    }
}
