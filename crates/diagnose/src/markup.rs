//! Temporal markup for volatile message content.
//!
//! Problem messages embed counts, durations, and absolute timestamps that
//! change between polling cycles even when the underlying problem does not.
//! Wrapping those spans lets the rest of the system derive two variants of a
//! message: a normalized one with the volatile spans removed (identity), and
//! a clean one with only the markers stripped (display).

use std::fmt::Display;
use tracing::warn;

/// Start-of-span marker. A control character so it can never collide with
/// content coming out of the cluster API.
pub const TEMPORAL_START: char = '\u{2}';

/// End-of-span marker.
pub const TEMPORAL_END: char = '\u{3}';

/// Wrap a volatile value in temporal markers. An empty value stays empty
/// rather than becoming a bare marker pair.
pub fn wrap_temporal(value: impl Display) -> String {
    let rendered = value.to_string();
    if rendered.is_empty() {
        return rendered;
    }
    format!("{TEMPORAL_START}{rendered}{TEMPORAL_END}")
}

/// Remove every marker-delimited span, markers and content both.
///
/// Spans are resolved left to right: the first start marker is paired with
/// the first end marker after it, whatever lies between. An unterminated
/// start marker leaves the remainder of the message untouched.
#[must_use]
pub fn normalize(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    loop {
        let Some(start) = rest.find(TEMPORAL_START) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let after = &rest[start + TEMPORAL_START.len_utf8()..];
        match after.find(TEMPORAL_END) {
            Some(end) => rest = &after[end + TEMPORAL_END.len_utf8()..],
            None => {
                warn!("unterminated temporal marker in message: {message:?}");
                out.push_str(&rest[start..]);
                break;
            }
        }
    }
    out
}

/// Strip marker characters, keeping the content they delimit.
#[must_use]
pub fn clean(message: &str) -> String {
    message
        .chars()
        .filter(|c| *c != TEMPORAL_START && *c != TEMPORAL_END)
        .collect()
}
