//! Numeric literal lexing.
//!
//! Integers in the usual bases (`0b`, `0o`, `0d`, `0x`, and bare leading
//! zero for octal), floats with fractional and exponent parts, and the `r`
//! (rational) and `i` (imaginary) suffixes. Underscores may separate digits
//! but may not end the literal.

use crate::token::TokenKind;
use crate::Lexer;

#[inline]
fn is_binary_digit(byte: u8) -> bool {
    byte == b'0' || byte == b'1'
}

#[inline]
fn is_octal_digit(byte: u8) -> bool {
    (b'0'..=b'7').contains(&byte)
}

impl<'src, 'h> Lexer<'src, 'h> {
    /// Lexes a numeric literal whose first byte has already been consumed,
    /// then applies the optional `r` and `i` suffixes.
    pub(crate) fn lex_numeric(&mut self) -> TokenKind {
        let mut kind = self.lex_numeric_prefix();

        if kind != TokenKind::Invalid {
            if self.cursor.match_byte(b'r') {
                kind = TokenKind::RationalNumber;
            }
            if self.cursor.match_byte(b'i') {
                kind = TokenKind::ImaginaryNumber;
            }
        }

        kind
    }

    fn lex_numeric_prefix(&mut self) -> TokenKind {
        let mut kind = TokenKind::Integer;

        if self.cursor.source()[self.cursor.position() - 1] == b'0' {
            match self.cursor.current() {
                // 0d1111 is a decimal number
                b'd' | b'D' => {
                    self.cursor.advance();
                    if !self.cursor.current().is_ascii_digit() {
                        return TokenKind::Invalid;
                    }
                    while self.cursor.current().is_ascii_digit() {
                        self.cursor.advance();
                        self.cursor.match_byte(b'_');
                    }
                }

                // 0b1111 is a binary number
                b'b' | b'B' => {
                    self.cursor.advance();
                    if !is_binary_digit(self.cursor.current()) {
                        return TokenKind::Invalid;
                    }
                    while is_binary_digit(self.cursor.current()) {
                        self.cursor.advance();
                        self.cursor.match_byte(b'_');
                    }
                }

                // 0o1111 and 01111 are octal numbers
                b'o' | b'O' => {
                    self.cursor.advance();
                    if !is_octal_digit(self.cursor.current()) {
                        return TokenKind::Invalid;
                    }
                    while is_octal_digit(self.cursor.current()) {
                        self.cursor.advance();
                        self.cursor.match_byte(b'_');
                    }
                }
                b'_' | b'0'..=b'7' => {
                    self.cursor.match_byte(b'_');
                    while is_octal_digit(self.cursor.current()) {
                        self.cursor.advance();
                        self.cursor.match_byte(b'_');
                    }
                }

                // 0x1111 is a hexadecimal number
                b'x' | b'X' => {
                    self.cursor.advance();
                    if !self.cursor.current().is_ascii_hexdigit() {
                        return TokenKind::Invalid;
                    }
                    while self.cursor.current().is_ascii_hexdigit() {
                        self.cursor.advance();
                        self.cursor.match_byte(b'_');
                    }
                }

                // 0.xxx and 0exxx are floats
                b'.' | b'e' | b'E' => {
                    kind = self.lex_optional_float_suffix();
                }

                _ => {}
            }
        } else {
            // Lex as far as possible into the decimal number.
            self.cursor.match_byte(b'_');
            while self.cursor.current().is_ascii_digit() {
                self.cursor.advance();
                self.cursor.match_byte(b'_');
            }

            kind = self.lex_optional_float_suffix();
        }

        // A trailing underscore invalidates the whole literal.
        if self.cursor.source()[self.cursor.position() - 1] == b'_' {
            return TokenKind::Invalid;
        }

        kind
    }

    /// Tries to extend an integer with a fractional part and an exponent.
    /// A `.` not followed by a digit is left alone; it is a method call.
    fn lex_optional_float_suffix(&mut self) -> TokenKind {
        let mut kind = TokenKind::Integer;

        if self.cursor.current() == b'.' {
            if self.cursor.peek(1).is_ascii_digit() {
                self.cursor.advance_by(2);
                while self.cursor.current().is_ascii_digit() {
                    self.cursor.advance();
                    self.cursor.match_byte(b'_');
                }
                kind = TokenKind::Float;
            } else {
                return kind;
            }
        }

        if self.cursor.match_byte(b'e') || self.cursor.match_byte(b'E') {
            let _ = self.cursor.match_byte(b'+') || self.cursor.match_byte(b'-');

            if self.cursor.current().is_ascii_digit() {
                self.cursor.advance();
                while self.cursor.current().is_ascii_digit() {
                    self.cursor.advance();
                    self.cursor.match_byte(b'_');
                }
                kind = TokenKind::Float;
            } else {
                return TokenKind::Invalid;
            }
        }

        kind
    }
}
