//! Helpers to keep client-supplied strings from breaking or flooding log lines.

use std::fmt::Write;

const MAX_PREVIEW_CHARS: usize = 120;

/// Warn-level record on the `security` target, which `init_logging` copies
/// to the security log file.
macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}
pub(crate) use sec_log;

/// Render a user string on one line: newlines, tabs and other control
/// characters are escaped and long values are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW_CHARS) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count == MAX_PREVIEW_CHARS {
            out.push('…');
            break;
        }
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Byte count summary for payloads too large to log, e.g. base64 media.
pub fn describe_payload(len: usize) -> String {
    match len {
        0..=1023 => format!("{} B", len),
        1024..=1_048_575 => format!("{:.1} KiB", len as f64 / 1024.0),
        _ => format!("{:.1} MiB", len as f64 / 1_048_576.0),
    }
}
