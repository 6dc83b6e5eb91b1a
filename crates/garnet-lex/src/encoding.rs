//! Source encodings.
//!
//! The lexer only needs three questions answered about the bytes it walks:
//! does this position start an alphabetic character, does it start an
//! alphanumeric character, and how many bytes wide is the character here.
//! An [`Encoding`] bundles those three classifiers. Identifier
//! classification is the only thing an encoding changes; the lexer's
//! structural characters are always single bytes.
//!
//! The built-in table covers `ascii`, `us-ascii`, `binary`, `utf-8`, and
//! `iso-8859-9`. A magic comment naming anything else goes through the
//! user-supplied decode callback; if that also comes up empty, the parser
//! records a diagnostic and keeps the current encoding.

use indexmap::IndexMap;
use std::sync::OnceLock;

/// Character classification functions for one encoding.
///
/// Each classifier receives the remaining source bytes and answers with the
/// width in bytes of the character at the front, or 0 if the bytes do not
/// form a character of that class.
#[derive(Clone, Copy)]
pub struct Encoding {
    name: &'static str,
    alpha: fn(&[u8]) -> usize,
    alnum: fn(&[u8]) -> usize,
    width: fn(&[u8]) -> usize,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Width of the alphabetic character at the front of `bytes`, or 0.
    #[inline]
    pub fn alpha_char(&self, bytes: &[u8]) -> usize {
        (self.alpha)(bytes)
    }

    /// Width of the alphanumeric character at the front of `bytes`, or 0.
    #[inline]
    pub fn alnum_char(&self, bytes: &[u8]) -> usize {
        (self.alnum)(bytes)
    }

    /// Width of the character at the front of `bytes`, or 0 if the bytes are
    /// not valid for this encoding.
    #[inline]
    pub fn char_width(&self, bytes: &[u8]) -> usize {
        (self.width)(bytes)
    }
}

impl std::fmt::Debug for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoding").field("name", &self.name).finish()
    }
}

impl PartialEq for Encoding {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Resolver invoked when a magic comment names an encoding the built-in
/// table does not know. Returning `None` leaves the encoding unchanged.
pub type EncodingDecodeCallback = fn(name: &[u8]) -> Option<Encoding>;

/// The default encoding for Ruby source.
pub fn utf8() -> Encoding {
    UTF_8
}

/// Looks up a built-in encoding by the name found in a magic comment.
pub fn lookup(name: &[u8]) -> Option<Encoding> {
    registry().get(name).copied()
}

fn registry() -> &'static IndexMap<&'static [u8], Encoding> {
    static REGISTRY: OnceLock<IndexMap<&'static [u8], Encoding>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut table: IndexMap<&'static [u8], Encoding> = IndexMap::new();
        table.insert(b"ascii".as_slice(), ASCII);
        table.insert(b"us-ascii".as_slice(), ASCII);
        table.insert(b"binary".as_slice(), ASCII);
        table.insert(b"utf-8".as_slice(), UTF_8);
        table.insert(b"iso-8859-9".as_slice(), ISO_8859_9);
        table
    })
}

const ASCII: Encoding = Encoding {
    name: "ascii",
    alpha: ascii_alpha,
    alnum: ascii_alnum,
    width: ascii_width,
};

const ISO_8859_9: Encoding = Encoding {
    name: "iso-8859-9",
    alpha: iso_8859_9_alpha,
    alnum: iso_8859_9_alnum,
    width: single_byte_width,
};

const UTF_8: Encoding = Encoding {
    name: "utf-8",
    alpha: utf8_alpha,
    alnum: utf8_alnum,
    width: utf8_width,
};

fn ascii_alpha(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() => 1,
        _ => 0,
    }
}

fn ascii_alnum(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b) if b.is_ascii_alphanumeric() => 1,
        _ => 0,
    }
}

fn ascii_width(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b) if *b < 128 => 1,
        _ => 0,
    }
}

fn single_byte_width(bytes: &[u8]) -> usize {
    usize::from(!bytes.is_empty())
}

fn iso_8859_9_alpha(bytes: &[u8]) -> usize {
    let Some(&v) = bytes.first() else { return 0 };
    let alpha = v.is_ascii_alphabetic()
        || v == 170
        || v == 181
        || v == 186
        || (192..=214).contains(&v)
        || (216..=246).contains(&v)
        || v >= 248;
    usize::from(alpha)
}

fn iso_8859_9_alnum(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b) if b.is_ascii_digit() => 1,
        _ => iso_8859_9_alpha(bytes),
    }
}

/// Decodes the UTF-8 character at the front of `bytes`, if the bytes begin
/// with a well-formed sequence.
fn decode_utf8(bytes: &[u8]) -> Option<(char, usize)> {
    if bytes.is_empty() {
        return None;
    }
    let len = match bytes[0] {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    if bytes.len() < len {
        return None;
    }
    let c = std::str::from_utf8(&bytes[..len]).ok()?.chars().next()?;
    Some((c, len))
}

fn utf8_alpha(bytes: &[u8]) -> usize {
    match decode_utf8(bytes) {
        Some((c, width)) if c.is_alphabetic() => width,
        _ => 0,
    }
}

fn utf8_alnum(bytes: &[u8]) -> usize {
    match decode_utf8(bytes) {
        Some((c, width)) if c.is_alphanumeric() => width,
        _ => 0,
    }
}

fn utf8_width(bytes: &[u8]) -> usize {
    match decode_utf8(bytes) {
        Some((_, width)) => width,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_builtins() {
        for name in [b"ascii".as_slice(), b"us-ascii", b"binary", b"utf-8", b"iso-8859-9"] {
            assert!(lookup(name).is_some(), "missing builtin {:?}", name);
        }
        assert!(lookup(b"utf-16").is_none());
        assert!(lookup(b"UTF-8").is_none());
    }

    #[test]
    fn test_ascii_classification() {
        let enc = lookup(b"ascii").unwrap();
        assert_eq!(enc.alpha_char(b"a"), 1);
        assert_eq!(enc.alpha_char(b"Z"), 1);
        assert_eq!(enc.alpha_char(b"1"), 0);
        assert_eq!(enc.alnum_char(b"1"), 1);
        assert_eq!(enc.alpha_char(b"\xC3\xA9"), 0);
        assert_eq!(enc.char_width(b"\xC3"), 0);
    }

    #[test]
    fn test_utf8_classification() {
        let enc = utf8();
        assert_eq!(enc.alpha_char("é".as_bytes()), 2);
        assert_eq!(enc.alpha_char("変".as_bytes()), 3);
        assert_eq!(enc.alnum_char("9".as_bytes()), 1);
        assert_eq!(enc.alpha_char(b"_"), 0);
        assert_eq!(enc.char_width("𝕩".as_bytes()), 4);
        assert_eq!(enc.char_width(b"\xFF"), 0);
        // Truncated sequence
        assert_eq!(enc.char_width(b"\xC3"), 0);
    }

    #[test]
    fn test_iso_8859_9_classification() {
        let enc = lookup(b"iso-8859-9").unwrap();
        assert_eq!(enc.alpha_char(b"a"), 1);
        // 0xFC is u-umlaut in ISO-8859-9
        assert_eq!(enc.alpha_char(&[0xFC]), 1);
        assert_eq!(enc.alnum_char(b"7"), 1);
        assert_eq!(enc.alpha_char(&[0x7E]), 0);
        assert_eq!(enc.char_width(&[0xFC]), 1);
    }
}
