//! Line splitting for the scanner.
//!
//! Lines borrow from the input; newline search uses `memchr`.

use memchr::memchr;

/// One line of normalized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// The line text, without its newline.
    pub text: &'a str,
    /// Zero-based line number.
    pub number: usize,
}

impl<'a> Line<'a> {
    #[inline(always)]
    pub fn is_blank(&self) -> bool {
        self.text.bytes().all(|b| b == b' ' || b == b'\t')
    }

    #[inline(always)]
    pub fn starts_with_space(&self) -> bool {
        self.text.starts_with([' ', '\t'])
    }
}

/// Peek/consume access to the lines of a document.
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    number: usize,
    peeked: Option<Line<'a>>,
}

impl<'a> Lexer<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            number: 0,
            peeked: None,
        }
    }

    /// Look at the next line without consuming it.
    #[inline]
    pub fn peek_line(&mut self) -> Option<&Line<'a>> {
        if self.peeked.is_none() {
            self.peeked = self.read_line();
        }
        self.peeked.as_ref()
    }

    #[inline]
    pub fn next_line(&mut self) -> Option<Line<'a>> {
        if let Some(line) = self.peeked.take() {
            return Some(line);
        }
        self.read_line()
    }

    fn read_line(&mut self) -> Option<Line<'a>> {
        let bytes = self.input.as_bytes();
        if self.offset >= bytes.len() {
            return None;
        }

        let start = self.offset;
        let end = match memchr(b'\n', &bytes[start..]) {
            Some(pos) => start + pos,
            None => bytes.len(),
        };
        self.offset = if end < bytes.len() { end + 1 } else { end };

        let line = Line {
            // `\n` is ASCII, so both ends sit on char boundaries.
            text: &self.input[start..end],
            number: self.number,
        };
        self.number += 1;
        Some(line)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}
