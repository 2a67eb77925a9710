//! Append-only accumulator for one broadcast round's PGN stream.

use std::sync::LazyLock;

use regex::Regex;

/// Two or more blank lines separate games in the lichess round stream.
static GAME_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n){3,}").expect("valid delimiter regex"));

#[derive(Debug, Default, Clone)]
pub struct StreamBuffer {
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk.
    pending: Vec<u8>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append already-decoded text.
    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    /// Append a raw network chunk. A multi-byte character split across two
    /// chunks is held back until the rest arrives; invalid bytes are replaced.
    pub fn append_bytes(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                    }
                }
            }
        }
    }

    /// Split the buffer into raw per-game PGN blocks, including a partially
    /// streamed trailing game. Whitespace-only fragments are dropped.
    pub fn segment(&self) -> Vec<&str> {
        GAME_DELIMITER
            .split(&self.text)
            .filter(|block| !block.trim().is_empty())
            .collect()
    }

    /// Drop everything, e.g. when the tracked round changes.
    pub fn clear(&mut self) {
        self.text.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
