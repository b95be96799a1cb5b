//! Keep user-typed text on one log line.

const MAX_PREVIEW: usize = 160;

/// Escape control characters and cap the length for single-line logging.
///
/// Newlines, tabs and other control characters use their Rust escape form
/// (`\n`, `\t`, `\u{1b}`); everything else passes through. Input longer than
/// the preview limit is cut and ends with `…`.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        if ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    out
}
