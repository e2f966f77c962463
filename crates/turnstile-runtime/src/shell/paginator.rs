//! Tail-window pagination of buffered shell output.
//!
//! Pages are recomputed per read and never consume the buffer, so concurrent
//! pollers of one context see identical pages.

use serde::{Deserialize, Serialize};

use super::buffer::byte_offset;

/// Characters per output token when turning a token budget into a page size.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub max_chars: usize,
    pub max_lines: usize,
}

impl PageLimits {
    pub fn new(max_chars: usize, max_lines: usize) -> Self {
        Self {
            max_chars,
            max_lines,
        }
    }

    pub fn from_tokens(max_output_tokens: usize, max_lines: usize) -> Self {
        Self::new(max_output_tokens.saturating_mul(CHARS_PER_TOKEN), max_lines)
    }
}

/// One bounded view of a context's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellOutputPage {
    pub output: String,
    /// True iff this read truncated the text.
    pub has_more_output: bool,
    pub original_chars: usize,
    pub original_lines: usize,
    /// Characters evicted from the buffer before this read.
    pub dropped_chars: u64,
}

/// Keep the trailing `max_lines` lines of `text`, then the trailing
/// `max_chars` characters of those.
pub fn paginate(text: &str, dropped_chars: u64, limits: PageLimits) -> ShellOutputPage {
    let windowed = tail_chars(tail_lines(text, limits.max_lines), limits.max_chars);
    ShellOutputPage {
        output: windowed.to_string(),
        has_more_output: windowed.len() < text.len(),
        original_chars: text.chars().count(),
        original_lines: text.lines().count(),
        dropped_chars,
    }
}

/// Suffix of `text` holding its last `max_lines` lines. A trailing newline
/// does not start a new line.
fn tail_lines(text: &str, max_lines: usize) -> &str {
    if max_lines == 0 {
        return "";
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    match body.rmatch_indices('\n').nth(max_lines - 1) {
        Some((idx, _)) => &text[idx + 1..],
        None => text,
    }
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    &text[byte_offset(text, count - max_chars)..]
}
