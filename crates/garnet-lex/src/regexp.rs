//! Regular-expression sub-parser.
//!
//! The main parser does not interpret regular expressions, but it does need
//! the names of the named capture groups a literal defines, in source order.
//! This module walks the interior bytes of a regexp literal with a small
//! dedicated tokenizer and recursive descent over the pattern grammar:
//!
//! ```text
//! pattern    : (expression ('|' expression)*)?
//! expression : item+
//! item       : anchor | char-class | escape | group | char quantifier?
//! ```
//!
//! Only group syntax is examined closely; everything else is consumed just
//! carefully enough to keep group nesting and character classes balanced.

use crate::encoding::Encoding;
use garnet_util::RegexpError;
use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegexpTokenKind {
    Eof,
    Dot,
    Star,
    Plus,
    QMark,
    Pipe,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dash,
    Comma,
    Caret,
    Dollar,
    Colon,
    Backslash,
    Char,
    Invalid,
}

#[derive(Clone, Copy, Debug)]
struct RegexpToken {
    kind: RegexpTokenKind,
    start: usize,
    end: usize,
}

/// A point in time to backtrack to. Range quantifiers need this: `{1x}` is
/// not a quantifier and must be re-read as literal characters.
#[derive(Clone, Copy)]
struct Savepoint {
    previous: RegexpToken,
    current: RegexpToken,
}

struct RegexpParser<'a> {
    source: &'a [u8],
    encoding: Encoding,
    previous: RegexpToken,
    current: RegexpToken,
    named_captures: Vec<Range<usize>>,
}

type Result<T = ()> = std::result::Result<T, RegexpError>;

impl<'a> RegexpParser<'a> {
    fn new(source: &'a [u8], encoding: Encoding) -> Self {
        let zero = RegexpToken { kind: RegexpTokenKind::Eof, start: 0, end: 0 };
        Self {
            source,
            encoding,
            previous: zero,
            current: zero,
            named_captures: Vec::new(),
        }
    }

    fn lex_token(&mut self) {
        use RegexpTokenKind::*;

        self.previous = self.current;
        let position = self.current.end;

        if position >= self.source.len() {
            self.current = RegexpToken { kind: Eof, start: position, end: position };
            return;
        }

        let (kind, width) = match self.source[position] {
            b'.' => (Dot, 1),
            b'*' => (Star, 1),
            b'+' => (Plus, 1),
            b'?' => (QMark, 1),
            b'|' => (Pipe, 1),
            b'{' => (LBrace, 1),
            b'}' => (RBrace, 1),
            b'(' => (LParen, 1),
            b')' => (RParen, 1),
            b'[' => (LBracket, 1),
            b']' => (RBracket, 1),
            b'-' => (Dash, 1),
            b',' => (Comma, 1),
            b'^' => (Caret, 1),
            b'$' => (Dollar, 1),
            b':' => (Colon, 1),
            b'\\' => (Backslash, 1),
            _ => match self.encoding.char_width(&self.source[position..]) {
                0 => (Invalid, 1),
                width => (Char, width),
            },
        };

        self.current = RegexpToken { kind, start: position, end: position + width };
    }

    fn accept(&mut self, kind: RegexpTokenKind) {
        if self.current.kind == kind {
            self.lex_token();
        }
    }

    fn expect(&mut self, kind: RegexpTokenKind, error: RegexpError) -> Result {
        if self.current.kind == kind {
            self.lex_token();
            Ok(())
        } else {
            Err(error)
        }
    }

    fn savepoint(&self) -> Savepoint {
        Savepoint { previous: self.previous, current: self.current }
    }

    fn restore(&mut self, savepoint: Savepoint) {
        self.previous = savepoint.previous;
        self.current = savepoint.current;
    }

    /// True if the current token is a single ASCII digit.
    fn current_is_digit(&self) -> bool {
        self.current.kind == RegexpTokenKind::Char
            && self.current.end - self.current.start == 1
            && self.source[self.current.start].is_ascii_digit()
    }

    /// Extends the current token through the next occurrence of `value`.
    fn find_byte(&mut self, value: u8) -> Result {
        match self.source[self.current.end..].iter().position(|&b| b == value) {
            Some(offset) => {
                self.current.end += offset + 1;
                Ok(())
            }
            None => Err(RegexpError::UnexpectedEof),
        }
    }

    fn named_capture(&mut self, start: usize, end: usize) {
        self.named_captures.push(start..end);
    }

    /// Recognizes `{n}`, `{n,}`, `{n,m}`, and `{,m}` after the opening brace
    /// has been consumed. Anything else restores the savepoint so the brace
    /// reads as a literal character.
    fn parse_range_quantifier(&mut self) -> Result {
        use RegexpTokenKind::*;

        enum State {
            Start,
            Minimum,
            Maximum,
            Comma,
        }

        let savepoint = self.savepoint();
        let mut state = State::Start;

        loop {
            match state {
                State::Start => match self.current.kind {
                    Char if self.current_is_digit() => {
                        state = State::Minimum;
                        self.lex_token();
                    }
                    Comma => {
                        state = State::Comma;
                        self.lex_token();
                    }
                    _ => {
                        self.restore(savepoint);
                        return Ok(());
                    }
                },
                State::Minimum => match self.current.kind {
                    Char if self.current_is_digit() => self.lex_token(),
                    Comma => {
                        state = State::Maximum;
                        self.lex_token();
                    }
                    RBrace => {
                        self.lex_token();
                        return Ok(());
                    }
                    _ => {
                        self.restore(savepoint);
                        return Ok(());
                    }
                },
                State::Comma => {
                    if self.current_is_digit() {
                        state = State::Maximum;
                        self.lex_token();
                    } else {
                        self.restore(savepoint);
                        return Ok(());
                    }
                }
                State::Maximum => match self.current.kind {
                    Char if self.current_is_digit() => self.lex_token(),
                    RBrace => {
                        self.lex_token();
                        return Ok(());
                    }
                    _ => {
                        self.restore(savepoint);
                        return Ok(());
                    }
                },
            }
        }
    }

    /// quantifier : '*' | '+' | '?' | range-quantifier | <empty>
    fn parse_quantifier(&mut self) -> Result {
        use RegexpTokenKind::*;

        match self.current.kind {
            Star | Plus | QMark => {
                self.lex_token();
                Ok(())
            }
            LBrace => {
                self.lex_token();
                self.parse_range_quantifier()
            }
            _ => Ok(()),
        }
    }

    /// `[[:name:]]`: the leading two brackets are already consumed.
    fn parse_posix_class(&mut self) -> Result {
        use RegexpTokenKind::*;

        self.accept(Caret);
        self.expect(Colon, RegexpError::UnexpectedEof)?;
        while self.current.kind == Char {
            self.lex_token();
        }
        self.expect(Colon, RegexpError::UnexpectedEof)?;
        self.expect(RBracket, RegexpError::UnexpectedEof)?;
        self.expect(RBracket, RegexpError::UnexpectedEof)
    }

    /// `[…]`: everything up to the matching bracket is consumed unexamined.
    fn parse_character_set(&mut self) -> Result {
        use RegexpTokenKind::*;

        self.accept(Caret);
        while self.current.kind != RBracket && self.current.kind != Eof {
            self.lex_token();
        }
        self.expect(RBracket, RegexpError::UnexpectedEof)
    }

    /// A left bracket is either a POSIX class or a character set.
    fn parse_lbracket(&mut self) -> Result {
        if self.current.kind == RegexpTokenKind::LBracket {
            self.lex_token();
            self.parse_posix_class()
        } else {
            self.parse_character_set()
        }
    }

    /// Parses a group after its `(` has been consumed. A leading `?` selects
    /// one of the group flavors; `(?<name>…)` and `(?'name'…)` record the
    /// capture name.
    fn parse_group(&mut self) -> Result {
        use RegexpTokenKind::*;

        if self.current.kind == QMark {
            self.lex_token();

            if self.current.kind == Eof {
                return Err(RegexpError::MalformedGroup);
            }

            let mut options = RegexpOptions::new();

            // The flavor selector is a raw byte; several of them lex as
            // their own token kinds.
            match self.source[self.current.start] {
                // Inline comment: the group ends at the closing parenthesis.
                b'#' => return self.find_byte(b')').map_err(|_| RegexpError::MalformedGroup),

                // Plain non-capturing group, lookahead, atomic, absence.
                b':' | b'=' | b'!' | b'>' | b'~' => self.lex_token(),

                b'<' => {
                    if self.current.start + 1 >= self.source.len() {
                        return Err(RegexpError::MalformedGroup);
                    }

                    match self.source[self.current.start + 1] {
                        // Lookbehind.
                        b'=' | b'!' => {
                            self.current.end += 1;
                            self.lex_token();
                        }
                        // Named capture: (?<name>…)
                        _ => {
                            self.find_byte(b'>').map_err(|_| RegexpError::MalformedGroup)?;
                            self.named_capture(self.current.start + 1, self.current.end - 1);
                            self.lex_token();
                        }
                    }
                }

                // Named capture: (?'name'…)
                b'\'' => {
                    self.find_byte(b'\'').map_err(|_| RegexpError::MalformedGroup)?;
                    self.named_capture(self.current.start + 1, self.current.end - 1);
                    self.lex_token();
                }

                // Conditional expression: the condition is consumed blindly.
                b'(' => {
                    self.find_byte(b')').map_err(|_| RegexpError::MalformedGroup)?;
                    self.lex_token();
                }

                // Option toggles: (?imxdau-imx) or (?imxdau-imx:…)
                b'i' | b'm' | b'x' | b'd' | b'a' | b'u' | b'-' => {
                    let mut removing = self.source[self.current.start] == b'-';
                    if !removing {
                        options.add(self.source[self.current.start])?;
                    }

                    loop {
                        if self.current.end >= self.source.len() {
                            return Err(RegexpError::MalformedOptions);
                        }
                        match self.source[self.current.end] {
                            b':' | b')' => break,
                            b'-' if !removing => {
                                removing = true;
                                self.current.end += 1;
                            }
                            byte => {
                                if removing {
                                    options.remove(byte)?;
                                } else {
                                    options.add(byte)?;
                                }
                                self.current.end += 1;
                            }
                        }
                    }

                    // Move past the scanned letters onto the `:` or `)`,
                    // and past a `:` onto the group body.
                    self.lex_token();
                    self.accept(Colon);
                }

                _ => return Err(RegexpError::MalformedGroup),
            }
        }

        // The expressions within the group.
        while self.current.kind != RParen && self.current.kind != Eof {
            self.parse_expression()?;
            self.accept(Pipe);
        }

        self.expect(RParen, RegexpError::MalformedGroup)
    }

    /// item : anchor | char-class | escape | group | char quantifier?
    fn parse_item(&mut self) -> Result {
        use RegexpTokenKind::*;

        match self.current.kind {
            Caret | Dollar => {
                self.lex_token();
                Ok(())
            }
            Char | LBrace | RBrace | Dot => {
                self.lex_token();
                self.parse_quantifier()
            }
            LBracket => {
                self.lex_token();
                self.parse_lbracket()?;
                self.parse_quantifier()
            }
            Backslash => {
                self.lex_token();
                if self.current.kind != Eof {
                    self.lex_token();
                }
                self.parse_quantifier()
            }
            LParen => {
                self.lex_token();
                self.parse_group()?;
                self.parse_quantifier()
            }
            Eof => Err(RegexpError::UnexpectedEof),
            _ => Err(RegexpError::MalformedGroup),
        }
    }

    /// expression : item+
    fn parse_expression(&mut self) -> Result {
        use RegexpTokenKind::*;

        self.parse_item()?;
        while self.current.kind != Eof && self.current.kind != RParen && self.current.kind != Pipe {
            self.parse_item()?;
        }
        Ok(())
    }

    /// pattern : EOF | expression EOF | expression '|' pattern
    fn parse_pattern(&mut self) -> Result {
        use RegexpTokenKind::*;

        self.lex_token();

        if self.current.kind == Eof {
            return Ok(());
        }

        self.parse_expression()?;

        match self.current.kind {
            Eof => Ok(()),
            // The recursive call's leading lex consumes the pipe.
            Pipe => self.parse_pattern(),
            _ => Err(RegexpError::MalformedGroup),
        }
    }
}

/// Tracks which option letters remain legal within one `(?…)` prefix: a flag
/// may appear once, and only `i`/`m`/`x` may appear on the removing side.
struct RegexpOptions {
    states: [OptionState; 128],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OptionState {
    Invalid,
    Toggleable,
    Addable,
}

impl RegexpOptions {
    fn new() -> Self {
        let mut states = [OptionState::Invalid; 128];
        states[b'i' as usize] = OptionState::Toggleable;
        states[b'm' as usize] = OptionState::Toggleable;
        states[b'x' as usize] = OptionState::Toggleable;
        states[b'd' as usize] = OptionState::Addable;
        states[b'a' as usize] = OptionState::Addable;
        states[b'u' as usize] = OptionState::Addable;
        Self { states }
    }

    fn add(&mut self, option: u8) -> Result {
        if option >= 128 {
            return Err(RegexpError::MalformedOptions);
        }
        match self.states[option as usize] {
            OptionState::Invalid => Err(RegexpError::MalformedOptions),
            OptionState::Toggleable | OptionState::Addable => {
                self.states[option as usize] = OptionState::Invalid;
                Ok(())
            }
        }
    }

    fn remove(&mut self, option: u8) -> Result {
        if option >= 128 {
            return Err(RegexpError::MalformedOptions);
        }
        match self.states[option as usize] {
            OptionState::Toggleable => {
                self.states[option as usize] = OptionState::Invalid;
                Ok(())
            }
            _ => Err(RegexpError::MalformedOptions),
        }
    }
}

/// Scans the interior bytes of a regexp literal and returns the byte ranges
/// of its named capture group names, in source order. Duplicates are
/// preserved; consumers may deduplicate.
pub fn named_captures(source: &[u8], encoding: Encoding) -> std::result::Result<Vec<Range<usize>>, RegexpError> {
    let mut parser = RegexpParser::new(source, encoding);
    parser.parse_pattern()?;
    Ok(parser.named_captures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding;

    fn names(source: &[u8]) -> Vec<String> {
        named_captures(source, encoding::utf8())
            .unwrap()
            .into_iter()
            .map(|range| String::from_utf8(source[range].to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_pattern() {
        assert_eq!(names(b""), Vec::<String>::new());
    }

    #[test]
    fn test_plain_pattern_has_no_captures() {
        assert_eq!(names(b"abc"), Vec::<String>::new());
        assert_eq!(names(b"a.c*"), Vec::<String>::new());
    }

    #[test]
    fn test_named_capture_angle() {
        assert_eq!(names(b"(?<n>a)"), vec!["n"]);
        assert_eq!(names(b"(?<name>a+)"), vec!["name"]);
    }

    #[test]
    fn test_named_capture_quote() {
        assert_eq!(names(b"(?'key'x)"), vec!["key"]);
    }

    #[test]
    fn test_captures_in_source_order() {
        assert_eq!(names(b"(?<n>a)(?<m>b)"), vec!["n", "m"]);
        assert_eq!(names(b"(?<outer>(?<inner>a))"), vec!["outer", "inner"]);
    }

    #[test]
    fn test_duplicates_preserved() {
        assert_eq!(names(b"(?<x>a)(?<x>b)"), vec!["x", "x"]);
    }

    #[test]
    fn test_plain_group_is_not_named() {
        assert_eq!(names(b"(a)(?:b)(?=c)(?!d)(?>e)"), Vec::<String>::new());
    }

    #[test]
    fn test_lookbehind_is_not_named() {
        assert_eq!(names(b"(?<=a)b"), Vec::<String>::new());
        assert_eq!(names(b"(?<!a)b"), Vec::<String>::new());
    }

    #[test]
    fn test_alternation() {
        assert_eq!(names(b"(?<a>x)|(?<b>y)"), vec!["a", "b"]);
    }

    #[test]
    fn test_quantifiers() {
        assert_eq!(names(b"a*b+c?d{2}e{2,}f{2,3}g{,3}"), Vec::<String>::new());
        // A brace that is not a quantifier reads as a literal.
        assert_eq!(names(b"a{x}"), Vec::<String>::new());
    }

    #[test]
    fn test_character_sets() {
        assert_eq!(names(b"[abc](?<n>d)"), vec!["n"]);
        assert_eq!(names(b"[^)(](?<n>d)"), vec!["n"]);
        assert_eq!(names(b"[[:alpha:]](?<n>d)"), vec!["n"]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(names(b"\\(?<n"), Vec::<String>::new());
        assert_eq!(names(b"\\d+(?<num>\\w)"), vec!["num"]);
    }

    #[test]
    fn test_inline_comment_group() {
        assert_eq!(names(b"(?#comment)(?<n>a)"), vec!["n"]);
    }

    #[test]
    fn test_option_groups() {
        assert_eq!(names(b"(?imx:a)"), Vec::<String>::new());
        assert_eq!(names(b"(?i-mx:a)"), Vec::<String>::new());
        assert_eq!(names(b"(?-i:a)"), Vec::<String>::new());
    }

    #[test]
    fn test_malformed_options() {
        assert!(named_captures(b"(?ii:a)", encoding::utf8()).is_err());
        assert!(named_captures(b"(?z:a)", encoding::utf8()).is_err());
        // Only i/m/x may be removed.
        assert!(named_captures(b"(?i-a:b)", encoding::utf8()).is_err());
    }

    #[test]
    fn test_unterminated_group() {
        assert!(named_captures(b"(?<n>a", encoding::utf8()).is_err());
        assert!(named_captures(b"(a", encoding::utf8()).is_err());
        assert!(named_captures(b"[a", encoding::utf8()).is_err());
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(names("あ(?<名前>x)".as_bytes()), vec!["名前"]);
    }
}
