//! Lossless content splitting.
//!
//! Splits text into ordered segments of at most `threshold` tokens each,
//! such that concatenating the segments in order reproduces the input
//! byte-for-byte. No overlap is introduced at the storage layer.
//!
//! Break points prefer, in order: after the last newline inside the token
//! window, after the last whitespace character, then a hard cut on a char
//! boundary. Identical input and threshold always produce identical output.

use crate::token::estimate_tokens;

/// Bytes available per segment for a given token threshold.
///
/// `estimate_tokens` rounds up at 4 bytes per token, so a segment of at
/// most `threshold * 4` bytes never exceeds `threshold` tokens.
fn window_bytes(threshold: usize) -> usize {
    threshold.max(1) * 4
}

/// Split `content` into segments of at most `threshold` tokens.
///
/// Content at or below the threshold yields a single segment; callers
/// treat that case as "no chunking needed", not as a one-chunk group.
/// Empty content yields no segments.
pub fn split(content: &str, threshold: usize) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    if estimate_tokens(content) <= threshold {
        return vec![content.to_string()];
    }

    let max_bytes = window_bytes(threshold);
    let mut segments = Vec::new();
    let mut start = 0;

    while start < content.len() {
        let rest = &content[start..];
        if rest.len() <= max_bytes {
            segments.push(rest.to_string());
            break;
        }

        let end = start + cut_point(rest, max_bytes);
        segments.push(content[start..end].to_string());
        start = end;
    }

    segments
}

/// Byte offset (relative to `rest`) at which to end the next segment.
/// Always in `(0, max_bytes]` and on a char boundary.
fn cut_point(rest: &str, max_bytes: usize) -> usize {
    // Largest char boundary not past the window.
    let mut hard = max_bytes;
    while !rest.is_char_boundary(hard) {
        hard -= 1;
    }
    let window = &rest[..hard];

    // Prefer breaking just after a newline, then after any whitespace.
    if let Some(idx) = window.rfind('\n') {
        if idx + 1 < hard {
            return idx + 1;
        }
    }
    if let Some((idx, ch)) = window
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .last()
    {
        let after = idx + ch.len_utf8();
        if after < hard {
            return after;
        }
    }

    hard
}
