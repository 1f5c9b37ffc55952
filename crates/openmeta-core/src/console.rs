//! Formatting helpers for presentation layers.
//!
//! The core never prints; command-line front-ends use these to render
//! untrusted metadata text and blobs without letting control bytes reach a
//! terminal.

use std::fmt::Write as _;

/// Append `s` to `out` with console-hostile bytes escaped.
///
/// `\` and `"` are backslash-escaped; newlines/tabs become `\n`/`\r`/`\t`;
/// other control bytes and non-ASCII become `\xNN`. At most `max_bytes`
/// input bytes are rendered (0 = unlimited); clipped output ends in `...`.
///
/// Returns true when anything needed escaping beyond `\` and `"` or the
/// input was clipped.
pub fn append_console_escaped_ascii(s: &str, max_bytes: u32, out: &mut String) -> bool {
    let bytes = s.as_bytes();
    let n = if max_bytes == 0 || bytes.len() < max_bytes as usize {
        bytes.len()
    } else {
        max_bytes as usize
    };

    let mut dangerous = false;
    out.reserve(n);
    for &c in &bytes[..n] {
        match c {
            b'\\' | b'"' => {
                out.push('\\');
                out.push(c as char);
            }
            b'\n' => {
                out.push_str("\\n");
                dangerous = true;
            }
            b'\r' => {
                out.push_str("\\r");
                dangerous = true;
            }
            b'\t' => {
                out.push_str("\\t");
                dangerous = true;
            }
            c if c < 0x20 || c >= 0x7F => {
                let _ = write!(out, "\\x{c:02X}");
                dangerous = true;
            }
            c => out.push(c as char),
        }
    }
    if n < bytes.len() {
        out.push_str("...");
        dangerous = true;
    }
    dangerous
}

/// Append `bytes` to `out` as uppercase hex, at most `max_bytes` of input
/// (0 = unlimited); clipped output ends in `...`.
pub fn append_hex_bytes(bytes: &[u8], max_bytes: u32, out: &mut String) {
    let n = if max_bytes == 0 || bytes.len() < max_bytes as usize {
        bytes.len()
    } else {
        max_bytes as usize
    };
    out.reserve(n * 2);
    for &b in &bytes[..n] {
        let _ = write!(out, "{b:02X}");
    }
    if n < bytes.len() {
        out.push_str("...");
    }
}
