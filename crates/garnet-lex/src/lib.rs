//! garnet-lex - Lexical analysis for Ruby source.
//!
//! This crate turns a byte slice of Ruby source into a token stream. The
//! pieces:
//!
//! - [`Cursor`]: a byte cursor that records newline offsets as it moves.
//! - [`TokenKind`] / [`Token`]: the closed token taxonomy; spans are byte
//!   ranges into the source.
//! - [`LexMode`] / the mode stack: the lexer's state machine for nesting
//!   strings, regexps, word lists, symbols, and `#{…}` interpolations.
//! - [`Lexer`]: the mode-dispatched tokenizer itself, including magic
//!   encoding comments and keyword recognition.
//! - [`Encoding`]: identifier classification tables (`ascii`, `us-ascii`,
//!   `binary`, `utf-8`, `iso-8859-9`) plus a user callback for the rest.
//! - [`unescape`]: the None/Minimal/All escape decoder for string content.
//! - [`regexp`]: the sub-parser that extracts named capture groups from a
//!   regular expression literal.
//!
//! The lexer reports problems through the shared
//! [`Handler`](garnet_util::Handler); it does not fail. Tokens it cannot
//! classify come back as [`TokenKind::Invalid`] and the parser decides what
//! to do with them.

pub mod cursor;
pub mod encoding;
mod lexer;
pub mod mode;
pub mod regexp;
pub mod token;
pub mod unescape;

#[cfg(test)]
mod edge_cases;

pub use cursor::Cursor;
pub use encoding::{Encoding, EncodingDecodeCallback};
pub use lexer::Lexer;
pub use mode::{LexMode, ModeStack};
pub use token::{Token, TokenKind};
pub use unescape::{unescape, UnescapeMode};
