//! Identifier, keyword, and global-variable lexing.

use crate::token::TokenKind;
use crate::Lexer;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// The reserved words, exact bytes, case-sensitive. `defined?` is absent
/// because the `?` suffix is handled before lookup.
fn keywords() -> &'static FxHashMap<&'static [u8], TokenKind> {
    static KEYWORDS: OnceLock<FxHashMap<&'static [u8], TokenKind>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        use TokenKind::*;

        let mut table: FxHashMap<&'static [u8], TokenKind> = FxHashMap::default();
        table.insert(b"__ENCODING__".as_slice(), KeywordEncoding);
        table.insert(b"__LINE__".as_slice(), KeywordLine);
        table.insert(b"__FILE__".as_slice(), KeywordFile);
        table.insert(b"alias".as_slice(), KeywordAlias);
        table.insert(b"and".as_slice(), KeywordAnd);
        table.insert(b"begin".as_slice(), KeywordBegin);
        table.insert(b"BEGIN".as_slice(), KeywordBeginUpcase);
        table.insert(b"break".as_slice(), KeywordBreak);
        table.insert(b"case".as_slice(), KeywordCase);
        table.insert(b"class".as_slice(), KeywordClass);
        table.insert(b"def".as_slice(), KeywordDef);
        table.insert(b"do".as_slice(), KeywordDo);
        table.insert(b"else".as_slice(), KeywordElse);
        table.insert(b"elsif".as_slice(), KeywordElsif);
        table.insert(b"end".as_slice(), KeywordEnd);
        table.insert(b"END".as_slice(), KeywordEndUpcase);
        table.insert(b"ensure".as_slice(), KeywordEnsure);
        table.insert(b"false".as_slice(), KeywordFalse);
        table.insert(b"for".as_slice(), KeywordFor);
        table.insert(b"if".as_slice(), KeywordIf);
        table.insert(b"in".as_slice(), KeywordIn);
        table.insert(b"module".as_slice(), KeywordModule);
        table.insert(b"next".as_slice(), KeywordNext);
        table.insert(b"nil".as_slice(), KeywordNil);
        table.insert(b"not".as_slice(), KeywordNot);
        table.insert(b"or".as_slice(), KeywordOr);
        table.insert(b"redo".as_slice(), KeywordRedo);
        table.insert(b"rescue".as_slice(), KeywordRescue);
        table.insert(b"retry".as_slice(), KeywordRetry);
        table.insert(b"return".as_slice(), KeywordReturn);
        table.insert(b"self".as_slice(), KeywordSelf);
        table.insert(b"super".as_slice(), KeywordSuper);
        table.insert(b"then".as_slice(), KeywordThen);
        table.insert(b"true".as_slice(), KeywordTrue);
        table.insert(b"undef".as_slice(), KeywordUndef);
        table.insert(b"unless".as_slice(), KeywordUnless);
        table.insert(b"until".as_slice(), KeywordUntil);
        table.insert(b"when".as_slice(), KeywordWhen);
        table.insert(b"while".as_slice(), KeywordWhile);
        table.insert(b"yield".as_slice(), KeywordYield);
        table
    })
}

impl<'src, 'h> Lexer<'src, 'h> {
    /// Lexes the rest of an identifier whose first character has already
    /// been consumed, then classifies it.
    ///
    /// Classification depends on the previous token: after `def` or `.` a
    /// trailing `=` joins the name (`def foo=`), and after `.` reserved
    /// words are ordinary method names. A trailing `!` or `?` joins the
    /// name unless an `=` follows (so `x!=y` keeps its operator).
    pub(crate) fn lex_identifier(&mut self) -> TokenKind {
        loop {
            let width = self.identifier_char_width(self.cursor.position());
            if width == 0 {
                break;
            }
            self.cursor.advance_by(width);
        }

        if !self.cursor.is_at_end() {
            if self.method_name_context() && self.cursor.match_byte(b'=') {
                return TokenKind::Identifier;
            }

            if self.cursor.peek(1) != b'='
                && (self.cursor.match_byte(b'!') || self.cursor.match_byte(b'?'))
            {
                if self.previous_kind != TokenKind::Dot
                    && self.cursor.slice_from(self.token_start) == b"defined?"
                {
                    return TokenKind::KeywordDefined;
                }
                return TokenKind::Identifier;
            }
        }

        if self.previous_kind != TokenKind::Dot {
            if let Some(&keyword) = keywords().get(self.cursor.slice_from(self.token_start)) {
                return keyword;
            }
        }

        let first = self.cursor.source()[self.token_start];
        if first.is_ascii_uppercase() {
            TokenKind::Constant
        } else {
            TokenKind::Identifier
        }
    }

    /// Lexes the name of a global variable after its `$`: the special
    /// one-character globals, the back references, the numbered match
    /// references, and identifier-shaped names.
    pub(crate) fn lex_global_variable(&mut self) -> TokenKind {
        match self.cursor.current() {
            // $~ match-data, $* argv, $$ pid, $? last status, $! error,
            // $@ error position, $/ input separator, $\ output separator,
            // $; field separator, $, output field separator, $. line number,
            // $= ignorecase, $: load path, $< input, $> output, $" loaded
            b'~' | b'*' | b'$' | b'?' | b'!' | b'@' | b'/' | b'\\' | b';' | b',' | b'.'
            | b'=' | b':' | b'<' | b'>' | b'"' => {
                self.cursor.advance();
                TokenKind::GlobalVariable
            }

            // $& last match, $` before match, $' after match, $+ last group
            b'&' | b'`' | b'\'' | b'+' => {
                self.cursor.advance();
                TokenKind::BackReference
            }

            b'1'..=b'9' => {
                while self.cursor.current().is_ascii_digit() {
                    self.cursor.advance();
                }
                TokenKind::NthReference
            }

            _ => {
                if self.identifier_char_width(self.cursor.position()) > 0 {
                    loop {
                        let width = self.identifier_char_width(self.cursor.position());
                        if width == 0 {
                            break;
                        }
                        self.cursor.advance_by(width);
                    }
                    return TokenKind::GlobalVariable;
                }

                // A $ followed by nothing recognizable.
                TokenKind::Invalid
            }
        }
    }
}
