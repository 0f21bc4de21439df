//! Incremental scanner for a top-level JSON array
//!
//! Finds element boundaries in a growing byte buffer without parsing the
//! elements themselves. Each complete element is handed to `serde_json`
//! and then dropped from the buffer, so at most one element plus the unread
//! tail of the last chunk is held at a time.

use crate::error::{Error, Result};
use crate::types::DecodedRecord;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the opening `[`
    Start,
    /// After `[`: an element or `]`
    FirstElementOrEnd,
    /// After `,`: an element is required
    Element,
    /// Inside an element
    InElement,
    /// After an element: `,` or `]`
    CommaOrEnd,
    /// After the closing `]`; only whitespace may follow
    End,
}

#[derive(Debug, Default, Clone, Copy)]
struct ElementScan {
    depth: u32,
    in_string: bool,
    escaped: bool,
    /// Bare number or literal, terminated by a delimiter rather than a closer
    scalar: bool,
}

/// Byte-level state machine over a JSON array
#[derive(Debug)]
pub struct ArrayScanner {
    buf: Vec<u8>,
    pos: usize,
    state: State,
    element: ElementScan,
    index: usize,
    consumed: u64,
}

impl Default for ArrayScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayScanner {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: State::Start,
            element: ElementScan::default(),
            index: 0,
            consumed: 0,
        }
    }

    /// Append a chunk of input
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of elements emitted so far
    pub fn emitted(&self) -> usize {
        self.index
    }

    /// Bytes fully processed so far
    pub fn consumed(&self) -> u64 {
        self.consumed + self.pos as u64
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Whether the closing `]` has been seen
    pub fn is_complete(&self) -> bool {
        self.state == State::End
    }

    /// Extract the next complete element, if the buffer holds one.
    ///
    /// `Ok(None)` means more input is needed (or the array has ended).
    pub fn next_element(&mut self) -> Result<Option<DecodedRecord>> {
        loop {
            match self.state {
                State::InElement => return self.scan_element(),
                State::End => {
                    self.skip_whitespace();
                    if let Some(&b) = self.buf.get(self.pos) {
                        return Err(self.unexpected(b, "trailing data after array"));
                    }
                    self.discard_consumed();
                    return Ok(None);
                }
                _ => {}
            }

            self.skip_whitespace();
            let Some(&b) = self.buf.get(self.pos) else {
                self.discard_consumed();
                return Ok(None);
            };

            match (self.state, b) {
                (State::Start, b'[') => {
                    self.pos += 1;
                    self.state = State::FirstElementOrEnd;
                }
                (State::Start, b) => return Err(self.unexpected(b, "expected '['")),
                (State::FirstElementOrEnd | State::CommaOrEnd, b']') => {
                    self.pos += 1;
                    self.state = State::End;
                }
                (State::CommaOrEnd, b',') => {
                    self.pos += 1;
                    self.state = State::Element;
                }
                (State::CommaOrEnd, b) => return Err(self.unexpected(b, "expected ',' or ']'")),
                (State::Element, b']') => {
                    return Err(self.unexpected(b, "expected an element after ','"))
                }
                (State::FirstElementOrEnd | State::Element, b',') => {
                    return Err(self.unexpected(b, "expected an element"))
                }
                (State::FirstElementOrEnd | State::Element, b) => self.begin_element(b),
                (State::InElement | State::End, _) => unreachable!("handled above"),
            }
        }
    }

    /// Check that the input ended on a complete array
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            State::End => {
                self.skip_whitespace();
                match self.buf.get(self.pos) {
                    Some(&b) => Err(self.unexpected(b, "trailing data after array")),
                    None => Ok(()),
                }
            }
            State::Start if self.buf[self.pos..].iter().all(u8::is_ascii_whitespace) => {
                Err(Error::decode("empty body, expected a JSON array"))
            }
            _ => Err(Error::decode(format!(
                "unexpected end of stream after {} element(s) at byte {}",
                self.index,
                self.consumed()
            ))),
        }
    }

    fn begin_element(&mut self, first: u8) {
        // Drop everything before the element so it starts at offset 0
        self.discard_consumed();
        self.element = ElementScan {
            scalar: !matches!(first, b'{' | b'[' | b'"'),
            ..ElementScan::default()
        };
        self.state = State::InElement;
    }

    fn scan_element(&mut self) -> Result<Option<DecodedRecord>> {
        let scan = &mut self.element;

        while let Some(&b) = self.buf.get(self.pos) {
            if scan.in_string {
                if scan.escaped {
                    scan.escaped = false;
                } else if b == b'\\' {
                    scan.escaped = true;
                } else if b == b'"' {
                    scan.in_string = false;
                    if scan.depth == 0 {
                        self.pos += 1;
                        return self.emit(self.pos);
                    }
                }
                self.pos += 1;
                continue;
            }

            if scan.scalar {
                if b == b',' || b == b']' || b.is_ascii_whitespace() {
                    return self.emit(self.pos);
                }
                self.pos += 1;
                continue;
            }

            match b {
                b'"' => scan.in_string = true,
                b'{' | b'[' => scan.depth += 1,
                b'}' | b']' => {
                    scan.depth = scan.depth.saturating_sub(1);
                    if scan.depth == 0 {
                        self.pos += 1;
                        return self.emit(self.pos);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        Ok(None)
    }

    fn emit(&mut self, end: usize) -> Result<Option<DecodedRecord>> {
        let index = self.index;
        let value: Value = serde_json::from_slice(&self.buf[..end]).map_err(|e| {
            Error::decode(format!("malformed element at index {index}: {e}"))
        })?;

        self.pos = end;
        self.discard_consumed();
        self.index += 1;
        self.state = State::CommaOrEnd;
        Ok(Some((index, value)))
    }

    fn skip_whitespace(&mut self) {
        while self
            .buf
            .get(self.pos)
            .is_some_and(u8::is_ascii_whitespace)
        {
            self.pos += 1;
        }
    }

    fn discard_consumed(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.consumed += self.pos as u64;
            self.pos = 0;
        }
    }

    fn unexpected(&self, byte: u8, expectation: &str) -> Error {
        Error::decode(format!(
            "{expectation}, found '{}' at byte {}",
            char::from(byte).escape_default(),
            self.consumed()
        ))
    }
}
