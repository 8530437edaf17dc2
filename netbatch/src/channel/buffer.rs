//! Rolling window over device output, for prompt detection.

use std::fmt;

use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Default window: a few screen lines are plenty to hold a prompt.
const DEFAULT_WINDOW: usize = 1024;

/// Keeps the most recent output of a session, with terminal escape
/// sequences stripped, and answers whether a prompt pattern is showing.
///
/// Prompts only ever appear at the end of what the device printed, so only
/// the last `window` bytes are kept and searched. The transcript itself is
/// collected elsewhere from the raw bytes.
pub struct PatternBuffer {
    text: Vec<u8>,
    window: usize,
    /// Outlives single chunks: an escape sequence may be split across two.
    parser: Parser,
}

impl PatternBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            text: Vec::with_capacity(window * 2),
            window: window.max(1),
            parser: Parser::new(),
        }
    }

    /// Feed raw output.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut Printable(&mut self.text), data);

        // Compact once the retained text is twice the window.
        if self.text.len() > self.window * 2 {
            let excess = self.text.len() - self.window;
            self.text.drain(..excess);
        }
    }

    /// Whether `pattern` matches within the last `window` bytes.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        pattern.is_match(self.tail())
    }

    pub fn tail(&self) -> &[u8] {
        let start = self.text.len().saturating_sub(self.window);
        &self.text[start..]
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("tail", &String::from_utf8_lossy(self.tail()))
            .field("window", &self.window)
            .finish()
    }
}

/// Keeps printable characters and line control; drops everything else.
struct Printable<'a>(&'a mut Vec<u8>);

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.0.push(byte);
        }
    }
}
