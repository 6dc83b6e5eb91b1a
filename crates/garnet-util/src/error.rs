//! API-level error types.
//!
//! Almost every problem the parser encounters is recorded as a diagnostic
//! and recovered from. The errors here are the exceptions: operations on
//! string-like payloads that can fail outright and whose callers need a
//! typed result.

use thiserror::Error;

/// Failure while decoding escape sequences in a string-like literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnescapeError {
    /// A `\u` escape was not followed by exactly four hexadecimal digits or
    /// a braced code point list.
    #[error("invalid Unicode escape sequence")]
    InvalidUnicodeEscape,

    /// A `\u{{…}}` code point exceeded U+10FFFF.
    #[error("invalid Unicode code point {0:#x}")]
    CodePointOutOfRange(u32),
}

/// Failure while scanning a regular expression for named capture groups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegexpError {
    /// A group opened with `(` was malformed or never closed.
    #[error("malformed regular expression group")]
    MalformedGroup,

    /// An option sequence such as `(?imx-…)` contained an unknown or
    /// repeated flag.
    #[error("malformed regular expression options")]
    MalformedOptions,

    /// The pattern ended inside a character class or group.
    #[error("unexpected end of regular expression")]
    UnexpectedEof,
}
