use std::io::{self, Write};

use crate::ReflectionError;

/// Whitespace tokenizer over an in-memory serialized stream.
///
/// Tracks the current byte offset so grammar errors can report a position,
/// and supports seeking back: the loader reads each record header twice,
/// once to resolve the concrete type and once inside the decoder.
pub struct TokenReader<'a> {
    buffer: &'a [u8],
    position: usize,
    token_offset: usize,
}

impl<'a> TokenReader<'a> {
    /// Create a reader over the full serialized input.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            token_offset: 0,
        }
    }

    /// Current byte offset into the input.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Byte offset at which the most recently read token started.
    pub fn token_offset(&self) -> usize {
        self.token_offset
    }

    /// Move the read position to `position`.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.buffer.len());
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.buffer.len()
            && self.buffer[self.position].is_ascii_whitespace()
        {
            self.position += 1;
        }
    }

    /// True once only whitespace remains.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.position >= self.buffer.len()
    }

    /// Peek at the first byte of the next token without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.buffer.get(self.position).copied()
    }

    /// Read the next whitespace-delimited token.
    pub fn read_token(&mut self) -> Result<&'a str, ReflectionError> {
        self.skip_whitespace();
        if self.position >= self.buffer.len() {
            return Err(self.error("unexpected end of input"));
        }
        let start = self.position;
        while self.position < self.buffer.len()
            && !self.buffer[self.position].is_ascii_whitespace()
        {
            self.position += 1;
        }
        self.token_offset = start;
        std::str::from_utf8(&self.buffer[start..self.position]).map_err(|_| {
            ReflectionError::MalformedStream {
                offset: start,
                reason: "token is not valid utf-8".into(),
            }
        })
    }

    /// Read the next token and parse it as a table index.
    pub fn read_index(&mut self) -> Result<usize, ReflectionError> {
        let token = self.read_token()?;
        token
            .parse::<usize>()
            .map_err(|_| ReflectionError::MalformedStream {
                offset: self.token_offset,
                reason: format!("expected an integer, found '{}'", token),
            })
    }

    /// Skip exactly one byte (the separator between a string length and its
    /// content, which may itself begin with whitespace).
    pub fn skip_separator(&mut self) -> Result<(), ReflectionError> {
        if self.position >= self.buffer.len() {
            return Err(self.error("unexpected end of input"));
        }
        self.position += 1;
        Ok(())
    }

    /// Read exactly `length` raw bytes.
    pub fn read_exact(&mut self, length: usize) -> Result<&'a [u8], ReflectionError> {
        if self.position + length > self.buffer.len() {
            return Err(self.error("unexpected end of input"));
        }
        let bytes = &self.buffer[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }

    fn error(&self, reason: &str) -> ReflectionError {
        ReflectionError::MalformedStream {
            offset: self.position,
            reason: reason.into(),
        }
    }
}

// Indentation is decorative; one tab per nesting level.
pub(crate) fn pad_stream(stream: &mut dyn io::Write, padding: usize) -> io::Result<()> {
    for _ in 0..padding {
        stream.write_all(b"\t")?;
    }
    Ok(())
}
