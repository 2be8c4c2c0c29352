//! Status extraction from captured solver output.
//!
//! The solver's status is whatever it printed last: the final line of the
//! combined stdout/stderr log, trailing whitespace removed. The harness does
//! not interpret it. This relies on the solver flushing its final line before
//! exiting; a solver that buffers output past exit yields a stale or empty
//! token.

use super::types::TrialStatus;

/// Return the last line of `log` with trailing whitespace stripped.
///
/// An empty log yields an empty token. A log ending in a blank line also
/// yields an empty token, since that blank line is the last line.
pub fn last_line_token(log: &str) -> &str {
    log.lines().last().unwrap_or("").trim_end()
}

/// Classify a completed (non-timed-out) solver run from its log bytes.
pub fn status_from_log(log: &[u8]) -> TrialStatus {
    let text = String::from_utf8_lossy(log);
    TrialStatus::Reported(last_line_token(&text).to_string())
}
