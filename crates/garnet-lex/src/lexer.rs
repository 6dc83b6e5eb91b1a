//! The lexer.
//!
//! A single entry point, [`Lexer::lex`], advances the byte cursor past one
//! token and returns it. What counts as a token depends entirely on the
//! current [`LexMode`]: plain code lexes operators, keywords, and literals;
//! string-like modes collect content runs and watch for their terminator and
//! for `#{` interpolation; embdoc mode deals in whole lines.
//!
//! The lexer makes a handful of decisions based on the previously returned
//! token (whether `[]` after `.` is the index method name, whether `{` after
//! `->` opens a lambda body, whether `!@`/`-@`/`+@`/`~@` are method-name
//! forms after `def` or `.`). Comment tokens are excluded from that
//! bookkeeping so a comment between two tokens does not change how the
//! second one lexes.
//!
//! Magic comments of the form `# encoding: NAME` (optionally wrapped in
//! `-*- … -*-`) rebind the active encoding as they are lexed; encoding only
//! affects identifier classification.

mod identifier;
mod numeric;

use crate::cursor::Cursor;
use crate::encoding::{self, Encoding, EncodingDecodeCallback};
use crate::mode::{LexMode, ModeStack};
use crate::token::{Token, TokenKind};
use garnet_util::{Handler, LineIndex, Span};

/// Returns the closing delimiter for a `%`-literal opened with `start`.
/// The four bracket pairs close with their counterpart; any other byte
/// closes with itself.
fn terminator(start: u8) -> u8 {
    match start {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        _ => start,
    }
}

#[inline]
fn is_non_newline_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\x0C' | b'\r' | b'\x0B')
}

#[inline]
fn is_whitespace(byte: u8) -> bool {
    is_non_newline_whitespace(byte) || byte == b'\n'
}

/// The lexer: a cursor, the mode stack, and the active encoding.
pub struct Lexer<'src, 'h> {
    cursor: Cursor<'src>,
    modes: ModeStack,
    encoding: Encoding,
    decode_callback: Option<EncodingDecodeCallback>,
    handler: &'h Handler,

    /// Start offset of the token currently being lexed.
    token_start: usize,

    /// Kind of the most recently returned non-comment token.
    previous_kind: TokenKind,
}

impl<'src, 'h> Lexer<'src, 'h> {
    pub fn new(source: &'src [u8], handler: &'h Handler) -> Self {
        Self {
            cursor: Cursor::new(source),
            modes: ModeStack::new(),
            encoding: encoding::utf8(),
            decode_callback: None,
            handler,
            token_start: 0,
            previous_kind: TokenKind::Eof,
        }
    }

    /// Registers the resolver consulted when a magic comment names an
    /// encoding the built-in table does not know.
    pub fn register_encoding_decode_callback(&mut self, callback: EncodingDecodeCallback) {
        self.decode_callback = Some(callback);
    }

    pub fn source(&self) -> &'src [u8] {
        self.cursor.source()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The current lex mode.
    pub fn mode(&self) -> LexMode {
        self.modes.current()
    }

    /// Depth of the lex-mode stack (1 when only `Default` remains).
    pub fn mode_depth(&self) -> usize {
        self.modes.depth()
    }

    /// The newline offsets recorded so far.
    pub fn line_index(&self) -> &LineIndex {
        self.cursor.line_index()
    }

    /// Lexes the next token. Comments are returned like any other token;
    /// the parser layer decides what to collect and what to skip.
    pub fn lex(&mut self) -> Token {
        let kind = match self.modes.current() {
            LexMode::Default | LexMode::Embexpr => self.lex_default(),
            LexMode::Embdoc => self.lex_embdoc(),
            LexMode::List { terminator, interpolation } => self.lex_list(terminator, interpolation),
            LexMode::Regexp { terminator } => self.lex_regexp(terminator),
            LexMode::String { terminator, interpolation } => self.lex_string(terminator, interpolation),
            LexMode::Symbol => self.lex_symbol(),
        };

        let token = Token::new(kind, Span::new(self.token_start as u32, self.cursor.position() as u32));

        if kind == TokenKind::Comment {
            self.lex_magic_comment(token.span);
        }
        if !kind.is_comment() {
            self.previous_kind = kind;
        }

        token
    }

    /// Skips spaces, tabs, form feeds, and vertical tabs, plus carriage
    /// returns that are not part of a `\r\n` pair.
    fn skip_inline_whitespace(&mut self) {
        loop {
            match self.cursor.current() {
                b' ' | b'\t' | b'\x0C' | b'\x0B' => self.cursor.advance(),
                b'\r' => {
                    if self.cursor.peek(1) == b'\n' {
                        break;
                    }
                    self.cursor.advance();
                }
                _ => break,
            }
        }
    }

    /// True if the token being lexed begins a line (or the file).
    fn current_token_starts_line(&self) -> bool {
        self.token_start == 0 || self.cursor.source()[self.token_start - 1] == b'\n'
    }

    /// Width of the identifier-start character at `position`, or 0.
    fn identifier_start_width(&self, position: usize) -> usize {
        let bytes = &self.cursor.source()[position..];
        match bytes.first() {
            Some(b'_') => 1,
            Some(_) => self.encoding.alpha_char(bytes),
            None => 0,
        }
    }

    /// Width of the identifier character at `position`, or 0.
    fn identifier_char_width(&self, position: usize) -> usize {
        let bytes = &self.cursor.source()[position..];
        match self.encoding.alnum_char(bytes) {
            0 => self.identifier_start_width(position),
            width => width,
        }
    }

    fn push_mode(&mut self, mode: LexMode) {
        self.modes.push(mode);
    }

    fn pop_mode(&mut self) {
        self.modes.pop();
    }

    /// One token of plain Ruby code (also used inside `#{…}`, where the only
    /// difference is that `}` closes the expression).
    fn lex_default(&mut self) -> TokenKind {
        use TokenKind::*;

        self.skip_inline_whitespace();
        self.token_start = self.cursor.position();

        if self.cursor.is_at_end() {
            return Eof;
        }

        let byte = self.cursor.current();
        self.cursor.advance();

        match byte {
            // NUL, ^D, and ^Z end the script.
            0x00 | 0x04 | 0x1A => Eof,

            b'#' => {
                while !self.cursor.is_at_end() && self.cursor.current() != b'\n' {
                    self.cursor.advance();
                }
                Comment
            }

            // A bare carriage return is inline whitespace; this one is
            // immediately followed by a newline.
            b'\r' => {
                self.cursor.match_byte(b'\n');
                Newline
            }
            b'\n' => Newline,

            b',' => Comma,
            b'(' => ParenthesisLeft,
            b')' => ParenthesisRight,
            b';' => Semicolon,

            b'[' => {
                if self.method_name_context() && self.cursor.match_byte(b']') {
                    if self.cursor.match_byte(b'=') {
                        BracketLeftRightEqual
                    } else {
                        BracketLeftRight
                    }
                } else {
                    BracketLeft
                }
            }
            b']' => BracketRight,

            b'{' => {
                if self.previous_kind == MinusGreater {
                    LambdaBegin
                } else {
                    BraceLeft
                }
            }
            b'}' => {
                if self.modes.current() == LexMode::Embexpr {
                    self.pop_mode();
                    EmbexprEnd
                } else {
                    BraceRight
                }
            }

            // * ** **= *=
            b'*' => {
                if self.cursor.match_byte(b'*') {
                    if self.cursor.match_byte(b'=') { StarStarEqual } else { StarStar }
                } else if self.cursor.match_byte(b'=') {
                    StarEqual
                } else {
                    Star
                }
            }

            // ! != !~ !@
            b'!' => {
                if self.cursor.match_byte(b'=') {
                    BangEqual
                } else if self.cursor.match_byte(b'~') {
                    BangTilde
                } else if self.method_name_context() && self.cursor.match_byte(b'@') {
                    BangAt
                } else {
                    Bang
                }
            }

            // = => =~ == === =begin
            b'=' => {
                if self.current_token_starts_line() {
                    if self.cursor.starts_with(b"begin\n") {
                        self.cursor.advance_by(6);
                        self.push_mode(LexMode::Embdoc);
                        return EmbdocBegin;
                    }
                    if self.cursor.starts_with(b"begin\r\n") {
                        self.cursor.advance_by(7);
                        self.push_mode(LexMode::Embdoc);
                        return EmbdocBegin;
                    }
                }

                if self.cursor.match_byte(b'>') {
                    EqualGreater
                } else if self.cursor.match_byte(b'~') {
                    EqualTilde
                } else if self.cursor.match_byte(b'=') {
                    if self.cursor.match_byte(b'=') { EqualEqualEqual } else { EqualEqual }
                } else {
                    Equal
                }
            }

            // < << <<= <= <=>
            b'<' => {
                if self.cursor.match_byte(b'<') {
                    if self.cursor.match_byte(b'=') {
                        return LessLessEqual;
                    }
                    // Heredoc introducers are recognized but their bodies are
                    // not lexed; the token stream ends here.
                    if self.cursor.match_byte(b'-') || self.cursor.match_byte(b'~') {
                        return Eof;
                    }
                    LessLess
                } else if self.cursor.match_byte(b'=') {
                    if self.cursor.match_byte(b'>') { LessEqualGreater } else { LessEqual }
                } else {
                    Less
                }
            }

            // > >> >>= >=
            b'>' => {
                if self.cursor.match_byte(b'>') {
                    if self.cursor.match_byte(b'=') { GreaterGreaterEqual } else { GreaterGreater }
                } else if self.cursor.match_byte(b'=') {
                    GreaterEqual
                } else {
                    Greater
                }
            }

            b'"' => {
                self.push_mode(LexMode::String { terminator: b'"', interpolation: true });
                StringBegin
            }
            b'`' => {
                self.push_mode(LexMode::String { terminator: b'`', interpolation: true });
                Backtick
            }
            b'\'' => {
                self.push_mode(LexMode::String { terminator: b'\'', interpolation: false });
                StringBegin
            }

            // ?a character literal
            b'?' => {
                let width = self.identifier_char_width(self.cursor.position());
                if width > 0 {
                    self.cursor.advance_by(width);
                    CharacterLiteral
                } else {
                    QuestionMark
                }
            }

            // & && &&= &. &=
            b'&' => {
                if self.cursor.match_byte(b'&') {
                    if self.cursor.match_byte(b'=') { AmpersandAmpersandEqual } else { AmpersandAmpersand }
                } else if self.cursor.match_byte(b'.') {
                    AmpersandDot
                } else if self.cursor.match_byte(b'=') {
                    AmpersandEqual
                } else {
                    Ampersand
                }
            }

            // | || ||= |=
            b'|' => {
                if self.cursor.match_byte(b'|') {
                    if self.cursor.match_byte(b'=') { PipePipeEqual } else { PipePipe }
                } else if self.cursor.match_byte(b'=') {
                    PipeEqual
                } else {
                    Pipe
                }
            }

            // + += +@
            b'+' => {
                if self.cursor.match_byte(b'=') {
                    PlusEqual
                } else if self.method_name_context() && self.cursor.match_byte(b'@') {
                    PlusAt
                } else if self.cursor.current().is_ascii_digit() {
                    self.lex_numeric()
                } else {
                    Plus
                }
            }

            // - -> -= -@
            b'-' => {
                if self.cursor.match_byte(b'>') {
                    MinusGreater
                } else if self.cursor.match_byte(b'=') {
                    MinusEqual
                } else if self.method_name_context() && self.cursor.match_byte(b'@') {
                    MinusAt
                } else {
                    Minus
                }
            }

            // . .. ...
            b'.' => {
                if !self.cursor.match_byte(b'.') {
                    Dot
                } else if self.cursor.match_byte(b'.') {
                    DotDotDot
                } else {
                    DotDot
                }
            }

            b'0'..=b'9' => self.lex_numeric(),

            // : :: :sym :"sym" :'sym'
            b':' => {
                if self.cursor.match_byte(b':') {
                    return ColonColon;
                }

                if self.identifier_char_width(self.cursor.position()) > 0 {
                    self.push_mode(LexMode::Symbol);
                    return SymbolBegin;
                }

                let quote = self.cursor.current();
                if quote == b'"' || quote == b'\'' {
                    self.push_mode(LexMode::String {
                        terminator: quote,
                        interpolation: quote == b'"',
                    });
                    self.cursor.advance();
                    return SymbolBegin;
                }

                Colon
            }

            // / /= or a regexp
            b'/' => {
                if self.cursor.match_byte(b'=') {
                    SlashEqual
                } else if self.cursor.current() == b' ' {
                    // A space after the slash leans toward division.
                    Slash
                } else {
                    self.push_mode(LexMode::Regexp { terminator: b'/' });
                    RegexpBegin
                }
            }

            // ^ ^=
            b'^' => {
                if self.cursor.match_byte(b'=') { CaretEqual } else { Caret }
            }

            // ~ ~@
            b'~' => {
                if self.method_name_context() && self.cursor.match_byte(b'@') {
                    TildeAt
                } else {
                    Tilde
                }
            }

            // Line continuation.
            b'\\' => {
                self.skip_inline_whitespace();
                self.lex_default()
            }

            b'%' => self.lex_percent(),

            b'$' => self.lex_global_variable(),

            // @ivar @@cvar
            b'@' => {
                let kind = if self.cursor.match_byte(b'@') { ClassVariable } else { InstanceVariable };

                let width = self.identifier_start_width(self.cursor.position());
                if width == 0 {
                    return Invalid;
                }
                self.cursor.advance_by(width);

                loop {
                    let width = self.identifier_char_width(self.cursor.position());
                    if width == 0 {
                        break;
                    }
                    self.cursor.advance_by(width);
                }

                kind
            }

            _ => {
                // Identifier, keyword, or nothing we recognize.
                let width = self.identifier_start_width(self.token_start);
                if width == 0 {
                    return Invalid;
                }
                // One byte is already consumed; take the rest of the
                // character before walking the identifier.
                self.cursor.advance_by(width - 1);

                let kind = self.lex_identifier();

                // A line that reads `__END__` (followed by a newline) ends
                // the parsed portion of the file.
                if self.cursor.position() - self.token_start == 7
                    && self.current_token_starts_line()
                    && self.cursor.slice_from(self.token_start) == b"__END__"
                    && (self.cursor.current() == b'\n'
                        || (self.cursor.current() == b'\r' && self.cursor.peek(1) == b'\n'))
                {
                    let remaining = self.cursor.source().len() - self.cursor.position();
                    self.cursor.advance_by(remaining);
                    return EndMarker;
                }

                // `name:` that is not `name::` is a label.
                if self.cursor.current() == b':' && self.cursor.peek(1) != b':' {
                    self.cursor.advance();
                    return Label;
                }

                kind
            }
        }
    }

    /// True when the previous token allows an operator-method name form
    /// (`def +@`, `foo.!@`, …).
    fn method_name_context(&self) -> bool {
        self.previous_kind == TokenKind::KeywordDef || self.previous_kind == TokenKind::Dot
    }

    /// `%`-prefixed literals and the `%=` operator.
    fn lex_percent(&mut self) -> TokenKind {
        use TokenKind::*;

        match self.cursor.current() {
            b'=' => {
                self.cursor.advance();
                PercentEqual
            }
            b'i' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::List { terminator, interpolation: false });
                PercentLowerI
            }
            b'I' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::List { terminator, interpolation: true });
                PercentUpperI
            }
            b'w' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::List { terminator, interpolation: false });
                PercentLowerW
            }
            b'W' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::List { terminator, interpolation: true });
                PercentUpperW
            }
            b'r' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::Regexp { terminator });
                RegexpBegin
            }
            b'q' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::String { terminator, interpolation: false });
                StringBegin
            }
            b'Q' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::String { terminator, interpolation: true });
                StringBegin
            }
            b's' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::String { terminator, interpolation: false });
                SymbolBegin
            }
            b'x' => {
                self.cursor.advance();
                let terminator = self.list_terminator();
                self.push_mode(LexMode::String { terminator, interpolation: true });
                PercentLowerX
            }
            _ => Percent,
        }
    }

    /// Consumes the opening delimiter of a `%` literal and returns the
    /// matching closing delimiter.
    fn list_terminator(&mut self) -> u8 {
        let opening = self.cursor.current();
        self.cursor.advance();
        terminator(opening)
    }

    /// `=begin` … `=end` embedded documentation, one line per token.
    fn lex_embdoc(&mut self) -> TokenKind {
        self.token_start = self.cursor.position();

        if self.cursor.starts_with(b"=end\n") {
            self.cursor.advance_by(5);
            self.pop_mode();
            return TokenKind::EmbdocEnd;
        }
        if self.cursor.starts_with(b"=end\r\n") {
            self.cursor.advance_by(6);
            self.pop_mode();
            return TokenKind::EmbdocEnd;
        }
        if self.cursor.starts_with(b"=end") && self.cursor.position() + 4 == self.cursor.source().len() {
            self.cursor.advance_by(4);
            self.pop_mode();
            return TokenKind::EmbdocEnd;
        }

        while !self.cursor.is_at_end() {
            let byte = self.cursor.current();
            self.cursor.advance();
            if byte == b'\n' {
                break;
            }
        }

        if self.cursor.is_at_end() {
            TokenKind::Eof
        } else {
            TokenKind::EmbdocLine
        }
    }

    /// One piece of a `%w`/`%W`/`%i`/`%I` list: a separator run, a content
    /// run, an interpolation opener, or the closing delimiter.
    fn lex_list(&mut self, list_terminator: u8, interpolation: bool) -> TokenKind {
        if is_whitespace(self.cursor.current()) && !self.cursor.is_at_end() {
            self.token_start = self.cursor.position();
            while is_whitespace(self.cursor.current()) && !self.cursor.is_at_end() {
                self.cursor.advance();
            }
            return TokenKind::WordsSep;
        }

        self.token_start = self.cursor.position();

        while !self.cursor.is_at_end() {
            let byte = self.cursor.current();

            if is_whitespace(byte) {
                return TokenKind::StringContent;
            }

            if byte == list_terminator {
                if self.cursor.position() > self.token_start {
                    return TokenKind::StringContent;
                }
                self.cursor.advance();
                self.pop_mode();
                return TokenKind::StringEnd;
            }

            if interpolation && byte == b'#' && self.cursor.peek(1) == b'{' {
                if self.cursor.position() > self.token_start {
                    return TokenKind::StringContent;
                }
                self.cursor.advance_by(2);
                self.push_mode(LexMode::Embexpr);
                return TokenKind::EmbexprBegin;
            }

            self.cursor.advance();
        }

        TokenKind::Eof
    }

    /// Regexp interior: content runs, interpolation openers, and the closing
    /// delimiter with its option letters.
    fn lex_regexp(&mut self, regexp_terminator: u8) -> TokenKind {
        self.token_start = self.cursor.position();

        if self.cursor.match_byte(regexp_terminator) {
            while matches!(self.cursor.current(), b'e' | b'i' | b'm' | b'n' | b's' | b'u' | b'x') {
                self.cursor.advance();
            }
            self.pop_mode();
            return TokenKind::RegexpEnd;
        }

        while !self.cursor.is_at_end() {
            let byte = self.cursor.current();

            if byte == regexp_terminator {
                return TokenKind::StringContent;
            }

            if byte == b'\\' {
                self.cursor.advance();
                if !self.cursor.is_at_end() {
                    self.cursor.advance();
                }
                continue;
            }

            if byte == b'#' && self.cursor.peek(1) == b'{' {
                if self.cursor.position() > self.token_start {
                    return TokenKind::StringContent;
                }
                self.cursor.advance_by(2);
                self.push_mode(LexMode::Embexpr);
                return TokenKind::EmbexprBegin;
            }

            self.cursor.advance();
        }

        TokenKind::Eof
    }

    /// String interior: content runs, interpolation openers when the literal
    /// allows them, and the closing delimiter. `#@`, `#@@`, and `#$` are
    /// recognized shorthands but stay in the content run; the tokens that
    /// follow spell them out.
    fn lex_string(&mut self, string_terminator: u8, interpolation: bool) -> TokenKind {
        self.token_start = self.cursor.position();

        if self.cursor.match_byte(string_terminator) {
            self.pop_mode();
            return TokenKind::StringEnd;
        }

        while !self.cursor.is_at_end() {
            let byte = self.cursor.current();

            if byte == string_terminator {
                return TokenKind::StringContent;
            }

            if byte == b'\\' {
                self.cursor.advance();
                if !self.cursor.is_at_end() {
                    self.cursor.advance();
                }
                continue;
            }

            if interpolation && byte == b'#' && self.cursor.peek(1) == b'{' {
                if self.cursor.position() > self.token_start {
                    return TokenKind::StringContent;
                }
                self.cursor.advance_by(2);
                self.push_mode(LexMode::Embexpr);
                return TokenKind::EmbexprBegin;
            }

            self.cursor.advance();
        }

        TokenKind::Eof
    }

    /// The identifier following a bare `:`. Accepts a trailing `=` as part
    /// of the name (`:foo=`).
    fn lex_symbol(&mut self) -> TokenKind {
        self.token_start = self.cursor.position();

        let width = self.identifier_start_width(self.cursor.position());
        if self.cursor.is_at_end() || width == 0 {
            return TokenKind::Invalid;
        }

        self.cursor.advance_by(width);
        self.pop_mode();

        let kind = self.lex_identifier();
        if self.cursor.match_byte(b'=') {
            TokenKind::Identifier
        } else {
            kind
        }
    }

    /// Checks an inline comment for a magic encoding directive and rebinds
    /// the active encoding if one is found.
    fn lex_magic_comment(&mut self, span: Span) {
        let text = span.text(self.cursor.source());
        // Skip the `#`.
        let mut index = 1;

        while index < text.len() && is_non_newline_whitespace(text[index]) {
            index += 1;
        }

        if text[index..].starts_with(b"-*-") {
            index += 3;
            while index < text.len() && is_non_newline_whitespace(text[index]) {
                index += 1;
            }
        }

        if !text[index..].starts_with(b"encoding:") {
            return;
        }
        index += 9;

        while index < text.len() && is_non_newline_whitespace(text[index]) {
            index += 1;
        }

        let name_start = index;
        while index < text.len() && !is_whitespace(text[index]) {
            index += 1;
        }
        let name = &text[name_start..index];

        if let Some(found) = encoding::lookup(name) {
            self.encoding = found;
            return;
        }

        if let Some(callback) = self.decode_callback {
            if let Some(found) = callback(name) {
                self.encoding = found;
                return;
            }
        }

        let position = span.start + name_start as u32;
        self.handler.error(
            "Could not understand the encoding specified in the magic comment.",
            Span::point(position),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_kinds(source: &[u8]) -> Vec<TokenKind> {
        let handler = Handler::new();
        let mut lexer = Lexer::new(source, &handler);
        let mut kinds = Vec::new();
        loop {
            let token = lexer.lex();
            if token.kind == TokenKind::Eof {
                break;
            }
            kinds.push(token.kind);
            if kinds.len() > 1000 {
                panic!("lexer failed to terminate");
            }
        }
        kinds
    }

    fn lex_tokens(source: &[u8]) -> Vec<Token> {
        let handler = Handler::new();
        let mut lexer = Lexer::new(source, &handler);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.lex();
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    use TokenKind::*;

    #[test]
    fn test_empty_source() {
        assert_eq!(lex_kinds(b""), vec![]);
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(lex_kinds(b"1 + 2"), vec![Integer, Plus, Integer]);
    }

    #[test]
    fn test_maximal_munch_operators() {
        assert_eq!(lex_kinds(b"= == === =~ =>"), vec![Equal, EqualEqual, EqualEqualEqual, EqualTilde, EqualGreater]);
        assert_eq!(lex_kinds(b"< << <<= <= <=>"), vec![Less, LessLess, LessLessEqual, LessEqual, LessEqualGreater]);
        assert_eq!(
            lex_kinds(b"& && &&= &= &."),
            vec![Ampersand, AmpersandAmpersand, AmpersandAmpersandEqual, AmpersandEqual, AmpersandDot]
        );
        assert_eq!(lex_kinds(b"| || ||= |="), vec![Pipe, PipePipe, PipePipeEqual, PipeEqual]);
        assert_eq!(lex_kinds(b"* ** **= *="), vec![Star, StarStar, StarStarEqual, StarEqual]);
        assert_eq!(lex_kinds(b"> >> >>= >="), vec![Greater, GreaterGreater, GreaterGreaterEqual, GreaterEqual]);
    }

    #[test]
    fn test_dots_and_ranges() {
        assert_eq!(lex_kinds(b". .. ..."), vec![Dot, DotDot, DotDotDot]);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            lex_kinds(b"def end if elsif else unless while until"),
            vec![
                KeywordDef, KeywordEnd, KeywordIf, KeywordElsif, KeywordElse, KeywordUnless,
                KeywordWhile, KeywordUntil
            ]
        );
        assert_eq!(lex_kinds(b"BEGIN END begin end"), vec![KeywordBeginUpcase, KeywordEndUpcase, KeywordBegin, KeywordEnd]);
        assert_eq!(lex_kinds(b"__ENCODING__ __LINE__ __FILE__"), vec![KeywordEncoding, KeywordLine, KeywordFile]);
    }

    #[test]
    fn test_keyword_after_dot_is_identifier() {
        assert_eq!(lex_kinds(b"foo.class"), vec![Identifier, Dot, Identifier]);
        assert_eq!(lex_kinds(b"foo.nil"), vec![Identifier, Dot, Identifier]);
    }

    #[test]
    fn test_identifier_suffixes() {
        assert_eq!(lex_kinds(b"empty?"), vec![Identifier]);
        assert_eq!(lex_kinds(b"save!"), vec![Identifier]);
        // `foo!=` is foo followed by the != operator.
        assert_eq!(lex_kinds(b"foo!=1"), vec![Identifier, BangEqual, Integer]);
        assert_eq!(lex_kinds(b"defined?"), vec![KeywordDefined]);
    }

    #[test]
    fn test_setter_name_after_def() {
        assert_eq!(lex_kinds(b"def foo="), vec![KeywordDef, Identifier]);
        let tokens = lex_tokens(b"def foo=");
        assert_eq!(tokens[1].span, Span::new(4, 8));
    }

    #[test]
    fn test_operator_method_names() {
        assert_eq!(lex_kinds(b"def +@"), vec![KeywordDef, PlusAt]);
        assert_eq!(lex_kinds(b"def -@"), vec![KeywordDef, MinusAt]);
        assert_eq!(lex_kinds(b"def !@"), vec![KeywordDef, BangAt]);
        assert_eq!(lex_kinds(b"def ~@"), vec![KeywordDef, TildeAt]);
        assert_eq!(lex_kinds(b"def <=>"), vec![KeywordDef, LessEqualGreater]);
        assert_eq!(lex_kinds(b"x.[]"), vec![Identifier, Dot, BracketLeftRight]);
        assert_eq!(lex_kinds(b"x.[]="), vec![Identifier, Dot, BracketLeftRightEqual]);
        assert_eq!(lex_kinds(b"def []"), vec![KeywordDef, BracketLeftRight]);
        assert_eq!(lex_kinds(b"def []="), vec![KeywordDef, BracketLeftRightEqual]);
        // Without a dot or def, brackets stay separate.
        assert_eq!(lex_kinds(b"x[]"), vec![Identifier, BracketLeft, BracketRight]);
    }

    #[test]
    fn test_constants_and_variables() {
        assert_eq!(lex_kinds(b"Foo foo @foo @@foo $foo"), vec![Constant, Identifier, InstanceVariable, ClassVariable, GlobalVariable]);
    }

    #[test]
    fn test_global_variable_forms() {
        assert_eq!(lex_kinds(b"$~ $* $$ $?"), vec![GlobalVariable; 4]);
        assert_eq!(lex_kinds(b"$& $` $' $+"), vec![BackReference; 4]);
        assert_eq!(lex_kinds(b"$1 $42"), vec![NthReference, NthReference]);
        assert_eq!(lex_kinds(b"$ "), vec![Invalid]);
    }

    #[test]
    fn test_numerics() {
        assert_eq!(lex_kinds(b"42 3.14 1e10 1_000"), vec![Integer, Float, Float, Integer]);
        assert_eq!(lex_kinds(b"0b1010 0o777 0d99 0xFF 0755"), vec![Integer; 5]);
        assert_eq!(lex_kinds(b"3r 2i 3ri"), vec![RationalNumber, ImaginaryNumber, ImaginaryNumber]);
        // A dot with no digit after it is a method call, not a float.
        assert_eq!(lex_kinds(b"1.abs"), vec![Integer, Dot, Identifier]);
        assert_eq!(lex_kinds(b"1_"), vec![Invalid]);
        assert_eq!(lex_kinds(b"0b"), vec![Invalid]);
        assert_eq!(lex_kinds(b"1e"), vec![Invalid]);
    }

    #[test]
    fn test_plus_prefixed_numeric() {
        assert_eq!(lex_kinds(b"+1"), vec![Integer]);
        assert_eq!(lex_kinds(b"+ 1"), vec![Plus, Integer]);
        assert_eq!(lex_kinds(b"-1"), vec![Minus, Integer]);
    }

    #[test]
    fn test_character_literal() {
        assert_eq!(lex_kinds(b"?a"), vec![CharacterLiteral]);
        assert_eq!(lex_kinds(b"a ? b"), vec![Identifier, QuestionMark, Identifier]);
    }

    #[test]
    fn test_double_quoted_string() {
        assert_eq!(lex_kinds(b"\"abc\""), vec![StringBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"\"\""), vec![StringBegin, StringEnd]);
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(
            lex_kinds(b"\"a#{1}b\""),
            vec![StringBegin, StringContent, EmbexprBegin, Integer, EmbexprEnd, StringContent, StringEnd]
        );
    }

    #[test]
    fn test_single_quoted_string_has_no_interpolation() {
        assert_eq!(lex_kinds(b"'a#{1}b'"), vec![StringBegin, StringContent, StringEnd]);
    }

    #[test]
    fn test_string_escaped_terminator() {
        assert_eq!(lex_kinds(b"\"a\\\"b\""), vec![StringBegin, StringContent, StringEnd]);
    }

    #[test]
    fn test_nested_interpolation() {
        assert_eq!(
            lex_kinds(b"\"#{\"x\"}\""),
            vec![StringBegin, EmbexprBegin, StringBegin, StringContent, StringEnd, EmbexprEnd, StringEnd]
        );
    }

    #[test]
    fn test_percent_literals() {
        assert_eq!(lex_kinds(b"%q(abc)"), vec![StringBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"%Q{abc}"), vec![StringBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"%s[abc]"), vec![SymbolBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"%x<ls>"), vec![PercentLowerX, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"%|ab|"), vec![Percent, Pipe, Identifier, Pipe]);
        assert_eq!(lex_kinds(b"5 % 2"), vec![Integer, Percent, Integer]);
        assert_eq!(lex_kinds(b"a %= 2"), vec![Identifier, PercentEqual, Integer]);
    }

    #[test]
    fn test_word_lists() {
        assert_eq!(
            lex_kinds(b"%w[a b]"),
            vec![PercentLowerW, StringContent, WordsSep, StringContent, StringEnd]
        );
        assert_eq!(
            lex_kinds(b"%i(x y)"),
            vec![PercentLowerI, StringContent, WordsSep, StringContent, StringEnd]
        );
        assert_eq!(
            lex_kinds(b"%W[a#{b}]"),
            vec![PercentUpperW, StringContent, EmbexprBegin, Identifier, EmbexprEnd, StringEnd]
        );
        // Lists do not interpolate in the lowercase forms.
        assert_eq!(
            lex_kinds(b"%w[a#{b}]"),
            vec![PercentLowerW, StringContent, StringEnd]
        );
    }

    #[test]
    fn test_regexp() {
        assert_eq!(lex_kinds(b"/ab/"), vec![RegexpBegin, StringContent, RegexpEnd]);
        assert_eq!(lex_kinds(b"/ab/imx"), vec![RegexpBegin, StringContent, RegexpEnd]);
        assert_eq!(lex_kinds(b"%r{ab}"), vec![RegexpBegin, StringContent, RegexpEnd]);
        // Escaped terminator stays inside the content.
        assert_eq!(lex_kinds(b"/a\\/b/"), vec![RegexpBegin, StringContent, RegexpEnd]);
        // A space after the slash reads as division.
        assert_eq!(lex_kinds(b"a / b"), vec![Identifier, Slash, Identifier]);
        assert_eq!(lex_kinds(b"a /= b"), vec![Identifier, SlashEqual, Identifier]);
    }

    #[test]
    fn test_regexp_interpolation() {
        assert_eq!(
            lex_kinds(b"/a#{b}c/"),
            vec![RegexpBegin, StringContent, EmbexprBegin, Identifier, EmbexprEnd, StringContent, RegexpEnd]
        );
    }

    #[test]
    fn test_symbols() {
        assert_eq!(lex_kinds(b":foo"), vec![SymbolBegin, Identifier]);
        assert_eq!(lex_kinds(b":foo="), vec![SymbolBegin, Identifier]);
        assert_eq!(lex_kinds(b":if"), vec![SymbolBegin, KeywordIf]);
        assert_eq!(lex_kinds(b":\"foo\""), vec![SymbolBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b":'foo'"), vec![SymbolBegin, StringContent, StringEnd]);
        assert_eq!(lex_kinds(b"a ::B"), vec![Identifier, ColonColon, Constant]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(lex_kinds(b"foo: 1"), vec![Label, Integer]);
        assert_eq!(lex_kinds(b"Foo: 1"), vec![Label, Integer]);
        assert_eq!(lex_kinds(b"foo::Bar"), vec![Identifier, ColonColon, Constant]);
    }

    #[test]
    fn test_lambda_begin() {
        assert_eq!(lex_kinds(b"-> { }"), vec![MinusGreater, LambdaBegin, BraceRight]);
        assert_eq!(lex_kinds(b"x { }"), vec![Identifier, BraceLeft, BraceRight]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(lex_kinds(b"# hello"), vec![Comment]);
        // The trailing newline stays out of the comment so statement
        // separation survives.
        assert_eq!(lex_kinds(b"a # hi\nb"), vec![Identifier, Comment, Newline, Identifier]);
    }

    #[test]
    fn test_embdoc() {
        // The =end token consumes its own newline.
        assert_eq!(
            lex_kinds(b"=begin\nhello\n=end\n"),
            vec![EmbdocBegin, EmbdocLine, EmbdocEnd]
        );
        assert_eq!(lex_kinds(b"=begin\nhello\n=end"), vec![EmbdocBegin, EmbdocLine, EmbdocEnd]);
        // Not at line start: an operator followed by the begin keyword.
        assert_eq!(lex_kinds(b"a =begin"), vec![Identifier, Equal, KeywordBegin]);
    }

    #[test]
    fn test_end_marker() {
        assert_eq!(lex_kinds(b"a\n__END__\nanything at all"), vec![Identifier, Newline, EndMarker]);
        // Not at the start of a line, or without a newline after: a plain
        // constant-looking identifier.
        assert_eq!(lex_kinds(b"a __END__\nb"), vec![Identifier, Identifier, Newline, Identifier]);
        assert_eq!(lex_kinds(b"__END__"), vec![Identifier]);
    }

    #[test]
    fn test_heredoc_introducer_truncates() {
        assert_eq!(lex_kinds(b"a <<-EOS\nbody\nEOS"), vec![Identifier]);
        assert_eq!(lex_kinds(b"a <<~EOS\nbody\nEOS"), vec![Identifier]);
        // Plain << stays a shift.
        assert_eq!(lex_kinds(b"a << b"), vec![Identifier, LessLess, Identifier]);
    }

    #[test]
    fn test_newline_variants() {
        assert_eq!(lex_kinds(b"a\r\nb"), vec![Identifier, Newline, Identifier]);
        assert_eq!(lex_kinds(b"a\nb"), vec![Identifier, Newline, Identifier]);
    }

    #[test]
    fn test_magic_comment_rebinds_encoding() {
        let handler = Handler::new();
        let mut lexer = Lexer::new(b"# encoding: ascii\n\xC3\xA9", &handler);
        assert_eq!(lexer.lex().kind, Comment);
        assert_eq!(lexer.encoding().name(), "ascii");
        assert_eq!(lexer.lex().kind, Newline);
        // In ASCII the bytes of e-acute cannot start an identifier.
        assert_eq!(lexer.lex().kind, Invalid);
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_magic_comment_variants() {
        let handler = Handler::new();
        let mut lexer = Lexer::new(b"# -*- encoding: iso-8859-9 -*-\n", &handler);
        lexer.lex();
        assert_eq!(lexer.encoding().name(), "iso-8859-9");

        let handler = Handler::new();
        let mut lexer = Lexer::new(b"# some ordinary comment\n", &handler);
        lexer.lex();
        assert_eq!(lexer.encoding().name(), "utf-8");
    }

    #[test]
    fn test_unknown_encoding_diagnostic() {
        let handler = Handler::new();
        let mut lexer = Lexer::new(b"# encoding: ebcdic\n", &handler);
        lexer.lex();
        assert!(handler.has_errors());
        assert_eq!(lexer.encoding().name(), "utf-8");
    }

    #[test]
    fn test_encoding_decode_callback() {
        fn resolve(name: &[u8]) -> Option<Encoding> {
            if name == b"custom-latin" {
                encoding::lookup(b"iso-8859-9")
            } else {
                None
            }
        }

        let handler = Handler::new();
        let mut lexer = Lexer::new(b"# encoding: custom-latin\n", &handler);
        lexer.register_encoding_decode_callback(resolve);
        lexer.lex();
        assert_eq!(lexer.encoding().name(), "iso-8859-9");
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_utf8_identifiers() {
        assert_eq!(lex_kinds("変数 = 1".as_bytes()), vec![Identifier, Equal, Integer]);
        let tokens = lex_tokens("変数 = 1".as_bytes());
        assert_eq!(tokens[0].span.len(), 6);
    }

    #[test]
    fn test_mode_stack_returns_to_default() {
        let handler = Handler::new();
        let mut lexer = Lexer::new(b"\"a#{\"b#{c}d\"}e\"", &handler);
        loop {
            if lexer.lex().kind == Eof {
                break;
            }
        }
        assert_eq!(lexer.mode_depth(), 1);
        assert_eq!(lexer.mode(), LexMode::Default);
    }

    #[test]
    fn test_token_spans_cover_source_in_order() {
        let tokens = lex_tokens(b"foo = bar + 1");
        let mut last_end = 0;
        for token in &tokens {
            assert!(token.span.start >= last_end);
            assert!(token.span.end >= token.span.start);
            last_end = token.span.end;
        }
        assert_eq!(last_end, 13);
    }

    #[test]
    fn test_invalid_byte() {
        assert_eq!(lex_kinds(b"\x01"), vec![Invalid]);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(lex_kinds(b"a \\ b"), vec![Identifier, Identifier]);
    }
}
