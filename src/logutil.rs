//! Logging helpers for sanitizing radio-originated text so logs stay single-line.
//! Message payloads come straight off the mesh and may contain control characters.

use std::fmt::Write;

/// Byte budget for one logged payload. Sized a little above the largest
/// outbound radio frame so a whole chunk previews without truncation.
const MAX_PREVIEW_BYTES: usize = 256;

/// Escape a payload for single-line logging. Newlines, carriage returns,
/// tabs, and backslashes become their backslash escapes; other control
/// characters are rendered as `\u{..}`. Output is capped at
/// [`MAX_PREVIEW_BYTES`] of escaped text, ending in an ellipsis when cut;
/// a character whose escape would cross the cap is dropped whole, never split.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW_BYTES) + 4);
    for ch in s.chars() {
        let start = out.len();
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
        if out.len() > MAX_PREVIEW_BYTES {
            out.truncate(start);
            out.push('…');
            break;
        }
    }
    out
}
