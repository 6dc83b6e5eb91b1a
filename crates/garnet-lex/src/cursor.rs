//! Byte cursor for traversing Ruby source.
//!
//! The cursor maintains the current byte position in the source slice and
//! records newline offsets into the shared [`LineIndex`] as it crosses them,
//! so line/column numbers can be derived on demand later. Ruby source is a
//! byte slice in one of the recognized encodings, not guaranteed UTF-8, so
//! everything here works on raw bytes; multi-byte character widths come from
//! the active encoding, not from the cursor.

use garnet_util::LineIndex;

/// A cursor over the source bytes.
///
/// Reads past the end of the source yield `0`, which doubles as the
/// end-of-input sentinel the lexer dispatches on.
pub struct Cursor<'a> {
    /// The source bytes being traversed.
    source: &'a [u8],

    /// Current byte position in the source.
    position: usize,

    /// Offsets of the `\n` bytes crossed so far.
    line_index: LineIndex,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            line_index: LineIndex::new(),
        }
    }

    /// Returns the byte at the cursor, or `0` at the end of the source.
    #[inline]
    pub fn current(&self) -> u8 {
        self.peek(0)
    }

    /// Returns the byte at the given offset from the cursor, or `0` past the
    /// end of the source.
    #[inline]
    pub fn peek(&self, offset: usize) -> u8 {
        match self.position.checked_add(offset) {
            Some(pos) if pos < self.source.len() => self.source[pos],
            _ => 0,
        }
    }

    /// Advances the cursor by one byte, recording a crossed newline.
    #[inline]
    pub fn advance(&mut self) {
        if self.position >= self.source.len() {
            return;
        }
        if self.source[self.position] == b'\n' {
            self.line_index.record(self.position as u32);
        }
        self.position += 1;
    }

    /// Advances the cursor by `count` bytes (clamped to the end of source).
    pub fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            if self.is_at_end() {
                break;
            }
            self.advance();
        }
    }

    /// Consumes the expected byte if it is next. Returns true on a match.
    #[inline]
    pub fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.current() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns true if the remaining source starts with the given bytes.
    #[inline]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.source[self.position..].starts_with(prefix)
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.position >= self.source.len()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Source bytes from `start` up to the current position.
    #[inline]
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        &self.source[start..self.position]
    }

    #[inline]
    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    /// The newline offsets recorded so far.
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }
}
