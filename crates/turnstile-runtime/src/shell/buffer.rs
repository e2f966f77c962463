//! Bounded output storage and the text clean-up applied to process output.

// ─── Output Buffer ────────────────────────────────────────────────────

/// Append-only text buffer with a character ceiling. Once the ceiling is
/// exceeded the oldest characters are evicted and counted as dropped.
#[derive(Debug)]
pub struct OutputBuffer {
    text: String,
    /// Characters currently retained (`text.chars().count()`).
    chars: usize,
    max_chars: usize,
    dropped_chars: u64,
    total_appended: u64,
}

impl OutputBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
            dropped_chars: 0,
            total_appended: 0,
        }
    }

    /// Append text, evicting from the front if over the ceiling.
    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let added = s.chars().count();
        self.total_appended += added as u64;

        // Evict from the incoming text first when it alone overflows.
        let (s, added) = if added > self.max_chars {
            let skip = added - self.max_chars;
            self.dropped_chars += skip as u64;
            (&s[byte_offset(s, skip)..], self.max_chars)
        } else {
            (s, added)
        };

        self.text.push_str(s);
        self.chars += added;
        if self.chars > self.max_chars {
            let excess = self.chars - self.max_chars;
            let cut = byte_offset(&self.text, excess);
            self.text.drain(..cut);
            self.chars -= excess;
            self.dropped_chars += excess as u64;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.chars
    }

    pub fn dropped_chars(&self) -> u64 {
        self.dropped_chars
    }

    /// Characters appended over the buffer's lifetime. Monotonic, so pollers
    /// use it as their "has anything changed" baseline.
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}

/// Byte index of the `n`-th character of `s`, or `s.len()`.
pub(crate) fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

// ─── UTF-8 Stream Decoding ────────────────────────────────────────────

/// Incremental UTF-8 decoder for a byte stream read in arbitrary chunks.
///
/// A multi-byte sequence split across two reads is carried over to the next
/// call; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut input = self.pending.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        // Incomplete sequence at the end, wait for more bytes
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = input.to_vec();
        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

// ─── ANSI Escape Code Stripping ───────────────────────────────────────

/// Strip ANSI escape sequences, carriage returns and other control
/// characters. Newlines and tabs are kept.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                // CSI: ESC [ params... final byte in 0x40-0x7E
                Some('[') => {
                    for ch in chars.by_ref() {
                        if ('@'..='~').contains(&ch) {
                            break;
                        }
                    }
                }
                // OSC: ESC ] ... terminated by BEL or ESC \
                Some(']') => {
                    while let Some(ch) = chars.next() {
                        if ch == '\x07' {
                            break;
                        }
                        if ch == '\x1b' {
                            chars.next_if_eq(&'\\');
                            break;
                        }
                    }
                }
                // Charset designation: ESC ( X
                Some('(' | ')') => {
                    chars.next();
                }
                // Other two-byte sequences (ESC =, ESC >) or a lone ESC
                _ => {}
            },
            '\n' | '\t' => result.push(c),
            c if c < ' ' || c == '\x7f' => {}
            c => result.push(c),
        }
    }

    result
}
