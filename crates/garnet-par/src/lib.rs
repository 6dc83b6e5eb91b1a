//! garnet-par - The Ruby parser.
//!
//! A Pratt expression parser over the token stream of
//! [`garnet_lex::Lexer`], producing the [`ast::Node`] tree plus diagnostics.
//! The parser never fails: every syntax error is recorded in the shared
//! [`Handler`] and recovered from locally, with `Missing` tokens and nodes
//! holding the tree shape together. Callers distinguish a clean parse by
//! checking the handler, not by a `Result`.
//!
//! State carried while parsing:
//!
//! - one token of lookahead (`previous`, `current`),
//! - the context stack, which decides where a statement list ends and where
//!   recovery can re-synchronize,
//! - the scope stack, which tracks declared local variables so a bare
//!   identifier can be classified as a local read or a method call,
//! - the `recovering` flag, set when a prefix position had no usable token
//!   and cleared once a context terminator comes into view.
//!
//! ```
//! use garnet_par::Parser;
//! use garnet_util::Handler;
//!
//! let handler = Handler::new();
//! let mut parser = Parser::new(b"foo = 1", &handler);
//! let root = parser.parse();
//! assert!(!handler.has_errors());
//! ```

pub mod ast;
mod expr;
pub mod serialize;

#[cfg(test)]
mod edge_cases;

pub use ast::{Node, NodeKind};
pub use serialize::parse_serialize;

use ast::NodeKind as NK;
use garnet_lex::{regexp, unescape, UnescapeMode};
use garnet_lex::{EncodingDecodeCallback, LexMode, Lexer, Token, TokenKind};
use garnet_util::{Handler, LineColumn, Span};

/// What kind of comment a [`Comment`] records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentKind {
    /// A `#` comment running to the end of its line.
    Inline,
    /// An `=begin`/`=end` block.
    Embdoc,
    /// The `__END__` marker and everything after it.
    EndMarker,
}

/// A comment found while parsing. Comments are invisible to the grammar but
/// collected for consumers that need them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub span: Span,
}

/// The category of the statement list currently being parsed. Used to decide
/// which token ends the list and where error recovery can re-synchronize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    Main,
    Preexe,
    Postexe,
    Module,
    Class,
    Def,
    If,
    Elsif,
    Unless,
    Else,
    While,
    Until,
    Embexpr,
    Begin,
    SClass,
    For,
    Parens,
    Ensure,
    Rescue,
}

/// True if `kind` ends a statement list in the given context.
fn context_terminator(context: Context, kind: TokenKind) -> bool {
    use TokenKind::*;

    match context {
        Context::Main => kind == Eof,
        Context::Preexe | Context::Postexe => kind == BraceRight,
        Context::Module
        | Context::Class
        | Context::Def
        | Context::While
        | Context::Until
        | Context::SClass
        | Context::For => kind == KeywordEnd,
        // else clauses appear in conditionals and in begin blocks; in the
        // latter an ensure may follow.
        Context::Else => matches!(kind, KeywordEnd | KeywordEnsure),
        Context::If | Context::Unless | Context::Elsif => {
            matches!(kind, KeywordElse | KeywordElsif | KeywordEnd)
        }
        Context::Begin | Context::Rescue => {
            matches!(kind, KeywordRescue | KeywordElse | KeywordEnsure | KeywordEnd)
        }
        Context::Embexpr => kind == EmbexprEnd,
        Context::Parens => kind == ParenthesisRight,
        Context::Ensure => kind == KeywordEnd,
    }
}

/// One frame of the scope stack: the local variables declared so far in the
/// innermost method/class/module body.
#[derive(Default)]
struct ScopeFrame {
    locals: Vec<Token>,
}

/// Which node family a string-like literal should produce.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringFlavor {
    Plain,
    XString,
}

/// The collected output of [`Parser::parse_arguments_list`]: an optional
/// parenthesized argument list.
struct ArgumentsList {
    opening: Token,
    arguments: Option<Node>,
    closing: Token,
}

impl ArgumentsList {
    fn is_forwarding_super_shape(&self) -> bool {
        self.opening.kind == TokenKind::NotProvided && self.arguments.is_none()
    }
}

/// The parser. Borrows the source bytes and the diagnostic handler for its
/// whole lifetime; everything else it owns.
pub struct Parser<'src, 'h> {
    lexer: Lexer<'src, 'h>,
    source: &'src [u8],
    handler: &'h Handler,

    pub(crate) previous: Token,
    pub(crate) current: Token,

    contexts: Vec<Context>,
    scopes: Vec<ScopeFrame>,
    comments: Vec<Comment>,
    pub(crate) recovering: bool,
}

impl<'src, 'h> Parser<'src, 'h> {
    /// Creates a parser over the given source bytes. Diagnostics go to
    /// `handler`.
    pub fn new(source: &'src [u8], handler: &'h Handler) -> Self {
        let start = Token::new(TokenKind::Eof, Span::point(0));
        Self {
            lexer: Lexer::new(source, handler),
            source,
            handler,
            previous: start,
            current: start,
            contexts: Vec::new(),
            scopes: Vec::new(),
            comments: Vec::new(),
            recovering: false,
        }
    }

    /// Registers the resolver for encoding names the built-in table does not
    /// know (see [`garnet_lex::encoding`]).
    pub fn register_encoding_decode_callback(&mut self, callback: EncodingDecodeCallback) {
        self.lexer.register_encoding_decode_callback(callback);
    }

    /// Advances one raw token, comments included. This is the streaming
    /// surface for consumers that want tokens instead of a tree; the parse
    /// itself advances through a comment-transparent wrapper.
    pub fn lex_token(&mut self) -> TokenKind {
        self.previous = self.current;
        self.current = self.lexer.lex();
        self.current.kind
    }

    /// The token under consideration.
    pub fn current(&self) -> Token {
        self.current
    }

    /// The most recently consumed token.
    pub fn previous(&self) -> Token {
        self.previous
    }

    /// The comments collected so far, in source order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Converts a byte offset to a 1-based line/column pair using the
    /// newline index built during lexing.
    pub fn line_column(&self, offset: u32) -> LineColumn {
        self.lexer.line_index().line_column(offset)
    }

    /// Depth of the lex-mode stack; 1 once every string-like construct has
    /// been closed.
    pub fn lex_mode_depth(&self) -> usize {
        self.lexer.mode_depth()
    }

    /// Parses the source and returns the root `Program` node. A tree always
    /// comes back; syntax problems are in the handler.
    pub fn parse(&mut self) -> Node {
        self.bump();
        self.push_scope();

        let statements = self.parse_statements(Context::Main);
        let scope = self.pop_scope();

        let span = statements.span.join(scope.span);
        Node::new(
            span,
            NK::Program { scope: Box::new(scope), statements: Box::new(statements) },
        )
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    /// Advances the lookahead by one grammar-visible token, collecting any
    /// comments in between.
    pub(crate) fn bump(&mut self) {
        self.previous = self.current;
        self.current = self.lex_skipping_comments();
    }

    fn lex_skipping_comments(&mut self) -> Token {
        let mut token = self.lexer.lex();
        loop {
            match token.kind {
                TokenKind::Comment => {
                    self.comments.push(Comment { kind: CommentKind::Inline, span: token.span });
                    token = self.lexer.lex();
                }
                TokenKind::EndMarker => {
                    self.comments.push(Comment { kind: CommentKind::EndMarker, span: token.span });
                    token = self.lexer.lex();
                }
                TokenKind::EmbdocBegin => {
                    let start = token.span.start;
                    let mut last = token;
                    loop {
                        last = self.lexer.lex();
                        if last.kind == TokenKind::EmbdocEnd || last.kind == TokenKind::Eof {
                            break;
                        }
                    }

                    self.comments.push(Comment {
                        kind: CommentKind::Embdoc,
                        span: Span::new(start, last.span.end),
                    });

                    if last.kind == TokenKind::Eof {
                        self.handler.error("Unterminated embdoc", Span::point(last.span.start));
                        token = last;
                    } else {
                        token = self.lexer.lex();
                    }
                }
                _ => return token,
            }
        }
    }

    /// Consumes the current token if it has the given kind.
    pub(crate) fn accept(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consumes the current token if it has any of the given kinds.
    pub(crate) fn accept_any(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.contains(&self.current.kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Requires a token of the given kind. If it is absent, records the
    /// message as an error and puts a zero-width `Missing` token in
    /// `previous` so construction can continue.
    pub(crate) fn expect(&mut self, kind: TokenKind, message: &str) {
        if self.accept(kind) {
            return;
        }
        self.handler.error(message, Span::point(self.previous.span.end));
        self.previous = Token::missing(self.previous.span.end);
    }

    pub(crate) fn not_provided(&self) -> Token {
        Token::not_provided(self.previous.span.end)
    }

    /// Requires a token that can name a method: an identifier, a constant,
    /// or one of the operator-method forms. Mirrors [`Parser::expect`] on
    /// failure.
    pub(crate) fn expect_method_name(&mut self, message: &str) {
        if self.current.kind.is_method_name() {
            self.bump();
            return;
        }
        self.handler.error(message, Span::point(self.previous.span.end));
        self.previous = Token::missing(self.previous.span.end);
    }

    /// True if `kind` terminates any context currently on the stack, i.e.
    /// some enclosing frame knows how to continue from here.
    pub(crate) fn context_recoverable(&self, kind: TokenKind) -> bool {
        self.contexts.iter().any(|&context| context_terminator(context, kind))
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::default());
    }

    /// Closes the innermost scope and returns its `Scope` node. Runs on
    /// every exit path of a scope-introducing construct, including error
    /// recovery.
    fn pop_scope(&mut self) -> Node {
        let frame = self.scopes.pop().unwrap_or_default();
        let span = frame
            .locals
            .iter()
            .map(|token| token.span)
            .reduce(|a, b| a.join(b))
            .unwrap_or_else(|| Span::point(self.previous.span.end));
        Node::new(span, NK::Scope { locals: frame.locals })
    }

    /// Declares a local variable in the innermost scope. Redeclaring an
    /// existing name is a no-op.
    pub(crate) fn declare_local(&mut self, name: Token) {
        let text = name.text(self.source);
        if let Some(frame) = self.scopes.last_mut() {
            if !frame.locals.iter().any(|t| t.text(self.source) == text) {
                frame.locals.push(name);
            }
        }
    }

    /// True if the token names a local declared in the innermost scope.
    pub(crate) fn local_variable_defined(&self, name: &Token) -> bool {
        let text = name.text(self.source);
        self.scopes
            .last()
            .map(|frame| frame.locals.iter().any(|t| t.text(self.source) == text))
            .unwrap_or(false)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Parses newline/semicolon-separated expressions until the context's
    /// terminator comes up. Pushes the context for the duration.
    fn parse_statements(&mut self, context: Context) -> Node {
        self.contexts.push(context);
        let mut body = Vec::new();

        loop {
            while self.accept_any(&[TokenKind::Newline, TokenKind::Semicolon]) {}
            if context_terminator(context, self.current.kind) {
                break;
            }

            let node = self.parse_expression(
                expr::bp::NONE,
                "Expected to be able to parse an expression.",
            );
            body.push(node);

            if self.recovering {
                // If this is the frame where the terminator is now visible,
                // recovery is complete.
                if context_terminator(context, self.current.kind) {
                    self.recovering = false;
                }
                break;
            }

            if !self.accept_any(&[TokenKind::Newline, TokenKind::Semicolon]) {
                break;
            }
        }

        self.contexts.pop();
        self.statements_node(body)
    }

    pub(crate) fn statements_node(&self, body: Vec<Node>) -> Node {
        let span = match (body.first(), body.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
            _ => Span::point(self.previous.span.end),
        };
        Node::new(span, NK::Statements { body })
    }

    // =========================================================================
    // Arguments
    // =========================================================================

    /// Parses the arguments of a call after the `(` has been consumed. Stops
    /// after consuming the `)` (or deciding it is missing).
    fn parse_arguments(&mut self) -> Node {
        let start = self.previous.span.end;
        let mut arguments = Vec::new();

        while self.current.kind != TokenKind::Eof {
            if self.current.kind == TokenKind::DotDotDot {
                self.bump();
                let token = self.previous;
                arguments.push(Node::new(token.span, NK::ForwardingArguments { token }));
            } else {
                let expression = self.parse_expression(
                    expr::bp::NONE,
                    "Expected to be able to parse an argument.",
                );
                if expression.is_missing() {
                    break;
                }
                arguments.push(expression);
            }

            if self.accept(TokenKind::ParenthesisRight) {
                break;
            }
            self.expect(TokenKind::Comma, "Expected an ',' to delimit arguments.");
            if self.previous.kind == TokenKind::Missing {
                break;
            }
        }

        let span = match (arguments.first(), arguments.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
            _ => Span::point(start),
        };
        Node::new(span, NK::Arguments { arguments })
    }

    /// Parses an optional parenthesized argument list (for calls and for the
    /// jump keywords `break`/`next`/`return`/`super`/`yield`).
    fn parse_arguments_list(&mut self) -> ArgumentsList {
        if self.accept(TokenKind::ParenthesisLeft) {
            let opening = self.previous;
            if self.accept(TokenKind::ParenthesisRight) {
                ArgumentsList { opening, arguments: None, closing: self.previous }
            } else {
                let arguments = self.parse_arguments();
                ArgumentsList { opening, arguments: Some(arguments), closing: self.previous }
            }
        } else {
            let opening = self.not_provided();
            let closing = self.not_provided();
            ArgumentsList { opening, arguments: None, closing }
        }
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Parses a method definition's parameter list. Every parameter name is
    /// declared in the active scope.
    fn parse_parameters(&mut self) -> Node {
        use TokenKind::*;

        let mut requireds: Vec<Node> = Vec::new();
        let mut optionals: Vec<Node> = Vec::new();
        let mut rest: Option<Box<Node>> = None;
        let mut keywords: Vec<Node> = Vec::new();
        let mut keyword_rest: Option<Box<Node>> = None;
        let mut block: Option<Box<Node>> = None;

        loop {
            match self.current.kind {
                Ampersand => {
                    self.bump();
                    let operator = self.previous;

                    let name = if self.accept(Identifier) {
                        let name = self.previous;
                        self.declare_local(name);
                        name
                    } else {
                        self.not_provided()
                    };

                    let span = Span::new(operator.span.start, name.span.end.max(operator.span.end));
                    block = Some(Box::new(Node::new(span, NK::BlockParameter { operator, name })));
                    if !self.accept(Comma) {
                        break;
                    }
                }

                DotDotDot => {
                    self.bump();
                    let token = self.previous;
                    keyword_rest = Some(Box::new(Node::new(token.span, NK::ForwardingParameter { token })));
                    if !self.accept(Comma) {
                        break;
                    }
                }

                Identifier => {
                    self.bump();
                    let name = self.previous;
                    self.declare_local(name);

                    if self.accept(Equal) {
                        let operator = self.previous;
                        let value = self.parse_expression(
                            expr::bp::NONE,
                            "Expected to find a default value for the parameter.",
                        );
                        let span = Span::new(name.span.start, value.span.end);
                        optionals.push(Node::new(
                            span,
                            NK::OptionalParameter { name, operator, value: Box::new(value) },
                        ));

                        // A syntax error in the default value ends the
                        // parameter list.
                        if self.recovering {
                            break;
                        }
                    } else {
                        requireds.push(Node::new(name.span, NK::RequiredParameter { name }));
                    }

                    if !self.accept(Comma) {
                        break;
                    }
                }

                Label => {
                    self.bump();
                    let name = self.previous;

                    // The local's name is the label minus its colon.
                    let local = Token::new(Identifier, Span::new(name.span.start, name.span.end - 1));
                    self.declare_local(local);

                    keywords.push(Node::new(name.span, NK::KeywordParameter { name }));
                    if !self.accept(Comma) {
                        break;
                    }
                }

                Star => {
                    self.bump();
                    let operator = self.previous;

                    let name = if self.accept(Identifier) {
                        let name = self.previous;
                        self.declare_local(name);
                        name
                    } else {
                        self.not_provided()
                    };

                    let span = Span::new(operator.span.start, name.span.end.max(operator.span.end));
                    rest = Some(Box::new(Node::new(span, NK::RestParameter { operator, name })));
                    if !self.accept(Comma) {
                        break;
                    }
                }

                StarStar => {
                    self.bump();
                    let operator = self.previous;

                    let parameter = if self.accept(KeywordNil) {
                        let keyword = self.previous;
                        let span = Span::new(operator.span.start, keyword.span.end);
                        Node::new(span, NK::NoKeywordsParameter { operator, keyword })
                    } else {
                        let name = if self.accept(Identifier) {
                            let name = self.previous;
                            self.declare_local(name);
                            name
                        } else {
                            self.not_provided()
                        };
                        let span = Span::new(operator.span.start, name.span.end.max(operator.span.end));
                        Node::new(span, NK::KeywordRestParameter { operator, name })
                    };

                    keyword_rest = Some(Box::new(parameter));
                    if !self.accept(Comma) {
                        break;
                    }
                }

                _ => break,
            }
        }

        let mut span: Option<Span> = None;
        {
            let mut extend = |s: Span| {
                span = Some(match span {
                    Some(existing) => existing.join(s),
                    None => s,
                });
            };
            for node in requireds.iter().chain(optionals.iter()).chain(keywords.iter()) {
                extend(node.span);
            }
            for node in [rest.as_deref(), keyword_rest.as_deref(), block.as_deref()].into_iter().flatten() {
                extend(node.span);
            }
        }

        Node::new(
            span.unwrap_or_else(|| Span::point(self.previous.span.end)),
            NK::Parameters { requireds, optionals, rest, keywords, keyword_rest, block },
        )
    }

    // =========================================================================
    // Statement-level constructs
    // =========================================================================

    /// Parses `if`/`unless` after the keyword has been consumed, including
    /// the elsif/else chain: each `elsif` becomes the consequent of the
    /// previous clause and a final `else` the innermost consequent.
    fn parse_conditional(&mut self, context: Context) -> Node {
        use TokenKind::*;

        let keyword = self.previous;

        let predicate = self.parse_expression(
            expr::bp::NONE,
            "Expected to find a predicate for the conditional.",
        );
        self.accept_any(&[KeywordThen, Newline, Semicolon]);

        let statements = self.parse_statements(context);

        let mut elsifs: Vec<(Token, Node, Node)> = Vec::new();
        while self.current.kind == KeywordElsif {
            self.bump();
            let elsif_keyword = self.previous;
            let elsif_predicate = self.parse_expression(
                expr::bp::NONE,
                "Expected to find a predicate for the elsif clause.",
            );
            self.accept_any(&[KeywordThen, Newline, Semicolon]);
            let elsif_statements = self.parse_statements(Context::Elsif);
            elsifs.push((elsif_keyword, elsif_predicate, elsif_statements));
        }

        let mut consequent: Option<Node> = None;
        let end_keyword;
        match self.current.kind {
            KeywordElse => {
                self.bump();
                let else_keyword = self.previous;
                let else_statements = self.parse_statements(Context::Else);
                self.expect(KeywordEnd, "Expected `end` to close `else` clause.");
                end_keyword = self.previous;

                let span = Span::new(else_keyword.span.start, end_keyword.span.end.max(else_statements.span.end));
                consequent = Some(Node::new(
                    span,
                    NK::Else {
                        else_keyword,
                        statements: Box::new(else_statements),
                        end_keyword,
                    },
                ));
            }
            KeywordEnd => {
                self.bump();
                end_keyword = self.previous;
            }
            _ => {
                let message = if context == Context::If {
                    "Expected `end` to close `if` statement."
                } else {
                    "Expected `end` to close `unless` statement."
                };
                self.expect(KeywordEnd, message);
                end_keyword = self.previous;
            }
        }

        // Fold the elsif clauses from the innermost out.
        for (elsif_keyword, elsif_predicate, elsif_statements) in elsifs.into_iter().rev() {
            let end = consequent
                .as_ref()
                .map(|node| node.span.end)
                .unwrap_or(elsif_statements.span.end);
            let span = Span::new(elsif_keyword.span.start, end);
            let not_provided_end = Token::not_provided(end);
            consequent = Some(Node::new(
                span,
                NK::If {
                    keyword: elsif_keyword,
                    predicate: Box::new(elsif_predicate),
                    statements: Box::new(elsif_statements),
                    consequent: consequent.take().map(Box::new),
                    end_keyword: not_provided_end,
                },
            ));
        }

        let end = end_keyword
            .span
            .end
            .max(consequent.as_ref().map(|n| n.span.end).unwrap_or(statements.span.end));
        let span = Span::new(keyword.span.start, end);
        let consequent = consequent.map(Box::new);
        let statements = Box::new(statements);
        let predicate = Box::new(predicate);

        if context == Context::If {
            Node::new(span, NK::If { keyword, predicate, statements, consequent, end_keyword })
        } else {
            Node::new(span, NK::Unless { keyword, predicate, statements, consequent, end_keyword })
        }
    }

    /// Parses a chain of `rescue` clauses. The current token is the first
    /// `rescue` keyword.
    fn parse_rescues(&mut self) -> Node {
        use TokenKind::*;

        self.bump();
        let keyword = self.previous;

        let mut exceptions: Vec<Node> = Vec::new();
        while !matches!(
            self.current.kind,
            EqualGreater | KeywordThen | Newline | Semicolon | Eof | KeywordEnd | KeywordElse
                | KeywordEnsure | KeywordRescue
        ) {
            let exception = self.parse_expression(
                expr::bp::DEFINED,
                "Expected an exception class in the rescue clause.",
            );
            if exception.is_missing() {
                break;
            }
            exceptions.push(exception);
            if !self.accept(Comma) {
                break;
            }
        }

        let mut operator = self.not_provided();
        let mut exception_target: Option<Box<Node>> = None;
        if self.accept(EqualGreater) {
            operator = self.previous;
            let target = self.parse_expression(
                expr::bp::INDEX,
                "Expected an exception target after `=>`.",
            );
            exception_target = Some(Box::new(target));
        }

        self.accept_any(&[KeywordThen, Newline, Semicolon]);
        let statements = self.parse_statements(Context::Rescue);

        let consequent = if self.current.kind == KeywordRescue {
            Some(Box::new(self.parse_rescues()))
        } else {
            None
        };

        let end = consequent
            .as_ref()
            .map(|node| node.span.end)
            .unwrap_or(statements.span.end)
            .max(keyword.span.end);
        Node::new(
            Span::new(keyword.span.start, end),
            NK::Rescue {
                keyword,
                exceptions,
                operator,
                exception_target,
                statements: Box::new(statements),
                consequent,
            },
        )
    }

    /// Parses `begin … [rescue …] [else …] [ensure …] end` after the
    /// `begin` keyword has been consumed.
    pub(crate) fn parse_begin(&mut self) -> Node {
        use TokenKind::*;

        let begin_keyword = self.previous;
        self.accept_any(&[Newline, Semicolon]);

        let statements = self.parse_statements(Context::Begin);

        let rescue_clause = if self.current.kind == KeywordRescue {
            Some(Box::new(self.parse_rescues()))
        } else {
            None
        };

        let else_clause = if self.accept(KeywordElse) {
            let else_keyword = self.previous;
            let else_statements = self.parse_statements(Context::Else);
            let span = Span::new(else_keyword.span.start, else_statements.span.end);
            let end_keyword = Token::not_provided(else_statements.span.end);
            Some(Box::new(Node::new(
                span,
                NK::Else { else_keyword, statements: Box::new(else_statements), end_keyword },
            )))
        } else {
            None
        };

        let ensure_clause;
        let end_keyword;
        if self.accept(KeywordEnsure) {
            let ensure_keyword = self.previous;
            self.accept_any(&[Newline, Semicolon]);
            let ensure_statements = self.parse_statements(Context::Ensure);
            self.expect(KeywordEnd, "Expected `end` to close `ensure` statement.");
            end_keyword = self.previous;

            let span = Span::new(ensure_keyword.span.start, end_keyword.span.end.max(ensure_statements.span.end));
            ensure_clause = Some(Box::new(Node::new(
                span,
                NK::Ensure {
                    ensure_keyword,
                    statements: Box::new(ensure_statements),
                    end_keyword,
                },
            )));
        } else {
            ensure_clause = None;
            self.expect(KeywordEnd, "Expected `end` to close `begin` statement.");
            end_keyword = self.previous;
        }

        let span = Span::new(begin_keyword.span.start, self.previous.span.end.max(statements.span.end));
        Node::new(
            span,
            NK::Begin {
                begin_keyword,
                statements: Box::new(statements),
                rescue_clause,
                else_clause,
                ensure_clause,
                end_keyword,
            },
        )
    }

    /// Parses `class Name … end`, `class Name < Super … end`, and the
    /// singleton form `class << expr … end`.
    pub(crate) fn parse_class(&mut self) -> Node {
        use TokenKind::*;

        let class_keyword = self.previous;

        if self.accept(LessLess) {
            let operator = self.previous;
            let expression = self.parse_expression(
                expr::bp::CALL,
                "Expected to find an expression after `<<`.",
            );

            self.accept_any(&[Newline, Semicolon]);
            self.push_scope();
            let statements = self.parse_statements(Context::SClass);
            self.expect(KeywordEnd, "Expected `end` to close `class` statement.");
            let end_keyword = self.previous;
            let scope = self.pop_scope();

            let span = Span::new(class_keyword.span.start, end_keyword.span.end.max(statements.span.end));
            return Node::new(
                span,
                NK::SClass {
                    scope: Box::new(scope),
                    class_keyword,
                    operator,
                    expression: Box::new(expression),
                    statements: Box::new(statements),
                    end_keyword,
                },
            );
        }

        let name = self.parse_expression(expr::bp::CALL, "Expected to find a class name after `class`.");

        let inheritance_operator;
        let superclass;
        if self.accept(Less) {
            inheritance_operator = self.previous;
            superclass = Some(Box::new(self.parse_expression(
                expr::bp::NONE,
                "Expected to find a superclass after `<`.",
            )));
        } else {
            inheritance_operator = self.not_provided();
            superclass = None;
        }

        self.push_scope();
        let statements = self.parse_statements(Context::Class);
        self.expect(KeywordEnd, "Expected `end` to close `class` statement.");
        let end_keyword = self.previous;
        let scope = self.pop_scope();

        let span = Span::new(class_keyword.span.start, end_keyword.span.end.max(statements.span.end));
        Node::new(
            span,
            NK::Class {
                scope: Box::new(scope),
                class_keyword,
                name: Box::new(name),
                inheritance_operator,
                superclass,
                statements: Box::new(statements),
                end_keyword,
            },
        )
    }

    /// Parses `module Name … end` after the keyword has been consumed.
    pub(crate) fn parse_module(&mut self) -> Node {
        let module_keyword = self.previous;
        let name = self.parse_expression(
            expr::bp::NONE,
            "Expected to find a module name after `module`.",
        );

        // If the name could not be parsed, close the node out with empty
        // statements rather than consuming the enclosing scope's tokens.
        if self.recovering {
            self.push_scope();
            let scope = self.pop_scope();
            let statements = self.statements_node(Vec::new());
            let end_keyword = Token::missing(self.previous.span.end);
            let end = name
                .span
                .end
                .max(module_keyword.span.end)
                .max(scope.span.end)
                .max(statements.span.end);
            let span = Span::new(module_keyword.span.start, end);
            return Node::new(
                span,
                NK::Module {
                    scope: Box::new(scope),
                    module_keyword,
                    name: Box::new(name),
                    statements: Box::new(statements),
                    end_keyword,
                },
            );
        }

        self.push_scope();
        let statements = self.parse_statements(Context::Module);
        self.expect(TokenKind::KeywordEnd, "Expected `end` to close `module` statement.");
        let end_keyword = self.previous;
        let scope = self.pop_scope();

        let span = Span::new(module_keyword.span.start, end_keyword.span.end.max(statements.span.end));
        Node::new(
            span,
            NK::Module {
                scope: Box::new(scope),
                module_keyword,
                name: Box::new(name),
                statements: Box::new(statements),
                end_keyword,
            },
        )
    }

    /// Parses a method definition after `def` has been consumed: plain and
    /// operator-method names, singleton forms (`def self.name`,
    /// `def receiver.name`), and the endless form `def name(params) = expr`.
    pub(crate) fn parse_def(&mut self) -> Node {
        use TokenKind::*;

        let def_keyword = self.previous;

        let mut receiver: Option<Box<Node>> = None;
        let mut operator = self.not_provided();

        let name = match self.current.kind {
            KeywordSelf => {
                self.bump();
                let self_keyword = self.previous;

                if self.accept(Dot) {
                    operator = self.previous;
                    receiver = Some(Box::new(Node::new(
                        self_keyword.span,
                        NK::SelfNode { keyword: self_keyword },
                    )));
                    self.expect_method_name("Expected name of method after `def`.");
                    self.previous
                } else {
                    // `self` on its own cannot name a method.
                    self.handler.error(
                        "Expected name of method after `def`.",
                        Span::point(self_keyword.span.end),
                    );
                    Token::missing(self_keyword.span.end)
                }
            }

            // An identifier or constant is either the method name or, when a
            // dot follows, the singleton receiver.
            Identifier | Constant => {
                self.bump();
                let first = self.previous;

                if self.accept(Dot) {
                    operator = self.previous;
                    let target = if first.kind == Constant {
                        Node::new(first.span, NK::ConstantRead { name: first })
                    } else if self.local_variable_defined(&first) {
                        Node::new(first.span, NK::LocalVariableRead { name: first })
                    } else {
                        let call_operator = Token::not_provided(first.span.start);
                        let opening = Token::not_provided(first.span.end);
                        let closing = Token::not_provided(first.span.end);
                        Node::new(
                            first.span,
                            NK::Call {
                                receiver: None,
                                call_operator,
                                message: first,
                                opening,
                                arguments: None,
                                closing,
                                name: first.text(self.source).to_vec(),
                            },
                        )
                    };
                    receiver = Some(Box::new(target));
                    self.expect_method_name("Expected name of method after `def`.");
                    self.previous
                } else {
                    first
                }
            }

            _ => {
                self.expect_method_name("Expected name of method after `def`.");
                self.previous
            }
        };

        let lparen = if self.accept(ParenthesisLeft) { self.previous } else { self.not_provided() };

        self.push_scope();
        let parameters = self.parse_parameters();

        let rparen = if lparen.kind == ParenthesisLeft {
            self.expect(ParenthesisRight, "Expected ')' after left parenthesis.");
            self.previous
        } else {
            self.not_provided()
        };

        let equal;
        let statements;
        let end_keyword;

        if self.accept(Equal) {
            // Endless definition: the body is a single expression.
            equal = self.previous;
            let body = self.parse_expression(expr::bp::NONE, "Expected a method body after `=`.");
            statements = self.statements_node(vec![body]);
            end_keyword = Token::not_provided(self.previous.span.end);
        } else {
            equal = self.not_provided();
            self.accept_any(&[Newline, Semicolon]);
            statements = self.parse_statements(Context::Def);
            self.expect(KeywordEnd, "Expected `end` to close `def` statement.");
            end_keyword = self.previous;
        }

        let scope = self.pop_scope();

        let end = end_keyword.span.end.max(statements.span.end).max(name.span.end);
        let span = Span::new(def_keyword.span.start, end);
        Node::new(
            span,
            NK::Def {
                name,
                receiver,
                parameters: Box::new(parameters),
                statements: Box::new(statements),
                scope: Box::new(scope),
                def_keyword,
                operator,
                lparen,
                rparen,
                equal,
                end_keyword,
            },
        )
    }

    /// Parses `for targets in collection [do] … end` after the keyword has
    /// been consumed.
    pub(crate) fn parse_for(&mut self) -> Node {
        use TokenKind::*;

        let for_keyword = self.previous;
        let index = self.parse_targets(expr::bp::INDEX, "Expected index after for.");

        self.expect(KeywordIn, "Expected keyword in.");
        let in_keyword = self.previous;

        let collection = self.parse_expression(expr::bp::COMPOSITION, "Expected collection.");

        let do_keyword = if self.accept(KeywordDo) { self.previous } else { self.not_provided() };

        self.push_scope();
        self.accept(Semicolon);
        self.accept(Newline);
        let statements = self.parse_statements(Context::For);
        // The loop body's scope frame is not part of the node; for-loop
        // variables live in the enclosing scope at runtime.
        let _ = self.pop_scope();

        self.expect(KeywordEnd, "Expected `end` to close for loop.");
        let end_keyword = self.previous;

        let span = Span::new(for_keyword.span.start, end_keyword.span.end.max(statements.span.end));
        Node::new(
            span,
            NK::For {
                for_keyword,
                index: Box::new(index),
                in_keyword,
                collection: Box::new(collection),
                do_keyword,
                statements: Box::new(statements),
                end_keyword,
            },
        )
    }

    /// Parses a comma-separated list of assignment targets, as in
    /// `for a, b in …`. A single target comes back unwrapped.
    fn parse_targets(&mut self, minimum: u8, message: &str) -> Node {
        let first = self.parse_expression(minimum, message);

        if self.current.kind != TokenKind::Comma {
            return first;
        }

        let mut targets = vec![first];
        while self.accept(TokenKind::Comma) {
            targets.push(self.parse_expression(minimum, message));
        }

        let span = Span::new(
            targets.first().map(|n| n.span.start).unwrap_or(0),
            targets.last().map(|n| n.span.end).unwrap_or(0),
        );
        Node::new(span, NK::MultiTarget { targets })
    }

    // =========================================================================
    // String-like constructs
    // =========================================================================

    /// Decodes string content, reporting a diagnostic and falling back to
    /// the raw bytes when the escape sequence is malformed.
    pub(crate) fn unescape_content(&self, content: Token, mode: UnescapeMode) -> Vec<u8> {
        let raw = content.text(self.source);
        match unescape(raw, mode) {
            Ok(bytes) => bytes.into_owned(),
            Err(error) => {
                self.handler.error(error.to_string(), content.span);
                raw.to_vec()
            }
        }
    }

    /// Builds the `Str` node for one content run inside an interpolated
    /// literal.
    fn string_part(&mut self, content: Token) -> Node {
        let opening = Token::not_provided(content.span.start);
        let closing = Token::not_provided(content.span.end);
        let unescaped = self.unescape_content(content, UnescapeMode::All);
        Node::new(content.span, NK::Str { opening, content, closing, unescaped })
    }

    /// Parses one `#{…}` part. The current token is `EmbexprBegin`.
    fn parse_embexpr_part(&mut self) -> Node {
        self.bump();
        let opening = self.previous;
        let statements = self.parse_statements(Context::Embexpr);
        self.expect(TokenKind::EmbexprEnd, "Expected a closing delimiter for an embedded expression.");
        let closing = self.previous;

        let span = Span::new(opening.span.start, closing.span.end.max(statements.span.end));
        Node::new(span, NK::StringInterpolated { opening, statements: Box::new(statements), closing })
    }

    /// Parses the body of a string-like literal whose opening token has been
    /// consumed. Produces a plain node when no `#{…}` part appears and an
    /// interpolated node otherwise.
    pub(crate) fn parse_string_body(&mut self, opening: Token, interpolation: bool, flavor: StringFlavor) -> Node {
        use TokenKind::*;

        if !interpolation {
            let content = if self.accept(StringContent) {
                self.previous
            } else {
                Token::new(StringContent, Span::point(self.previous.span.end))
            };
            self.expect(StringEnd, "Expected a closing delimiter for a string literal.");
            let closing = self.previous;
            let unescaped = self.unescape_content(content, UnescapeMode::Minimal);

            let span = Span::new(opening.span.start, closing.span.end.max(content.span.end));
            return match flavor {
                StringFlavor::Plain => Node::new(span, NK::Str { opening, content, closing, unescaped }),
                StringFlavor::XString => Node::new(span, NK::XString { opening, content, closing, unescaped }),
            };
        }

        let mut parts: Vec<Node> = Vec::new();
        let mut saw_embexpr = false;

        while !matches!(self.current.kind, StringEnd | Eof) {
            match self.current.kind {
                StringContent => {
                    self.bump();
                    let content = self.previous;
                    let part = self.string_part(content);
                    parts.push(part);
                }
                EmbexprBegin => {
                    saw_embexpr = true;
                    let part = self.parse_embexpr_part();
                    parts.push(part);
                }
                _ => break,
            }
        }

        self.expect(StringEnd, "Expected a closing delimiter for an interpolated string.");
        let closing = self.previous;
        let span = Span::new(opening.span.start, closing.span.end.max(
            parts.last().map(|n| n.span.end).unwrap_or(opening.span.end),
        ));

        if !saw_embexpr {
            // No interpolation actually happened; collapse to a plain node.
            let (content, unescaped) = match parts.pop() {
                Some(Node { kind: NK::Str { content, unescaped, .. }, .. }) => (content, unescaped),
                _ => (Token::new(StringContent, Span::point(opening.span.end)), Vec::new()),
            };
            return match flavor {
                StringFlavor::Plain => Node::new(span, NK::Str { opening, content, closing, unescaped }),
                StringFlavor::XString => Node::new(span, NK::XString { opening, content, closing, unescaped }),
            };
        }

        match flavor {
            StringFlavor::Plain => Node::new(span, NK::InterpolatedString { opening, parts, closing }),
            StringFlavor::XString => Node::new(span, NK::InterpolatedXString { opening, parts, closing }),
        }
    }

    /// Parses a symbol after its `SymbolBegin` token has been consumed.
    /// `mode` is the lex mode that was active when the opener was the
    /// current token: `Symbol` for `:name`, `String` for `:"…"`/`:'…'`/`%s`.
    pub(crate) fn parse_symbol(&mut self, mode: LexMode) -> Node {
        use TokenKind::*;

        let opening = self.previous;

        if mode == LexMode::Symbol {
            let value = self.current;
            self.bump();
            let closing = Token::not_provided(value.span.end);
            let unescaped = value.text(self.source).to_vec();
            let span = Span::new(opening.span.start, value.span.end);
            return Node::new(span, NK::Symbol { opening, value, closing, unescaped });
        }

        let interpolation = matches!(mode, LexMode::String { interpolation: true, .. });

        if !interpolation {
            let value = if self.accept(StringContent) {
                self.previous
            } else {
                Token::new(StringContent, Span::point(self.previous.span.end))
            };
            self.expect(StringEnd, "Expected a closing delimiter for a dynamic symbol.");
            let closing = self.previous;
            let unescaped = self.unescape_content(value, UnescapeMode::Minimal);
            let span = Span::new(opening.span.start, closing.span.end.max(value.span.end));
            return Node::new(span, NK::Symbol { opening, value, closing, unescaped });
        }

        let mut parts: Vec<Node> = Vec::new();
        let mut saw_embexpr = false;

        while !matches!(self.current.kind, StringEnd | Eof) {
            match self.current.kind {
                StringContent => {
                    self.bump();
                    let content = self.previous;
                    let part = self.string_part(content);
                    parts.push(part);
                }
                EmbexprBegin => {
                    saw_embexpr = true;
                    let part = self.parse_embexpr_part();
                    parts.push(part);
                }
                _ => break,
            }
        }

        self.expect(StringEnd, "Expected a closing delimiter for an interpolated symbol.");
        let closing = self.previous;
        let span = Span::new(opening.span.start, closing.span.end.max(
            parts.last().map(|n| n.span.end).unwrap_or(opening.span.end),
        ));

        if !saw_embexpr {
            let (value, unescaped) = match parts.pop() {
                Some(Node { kind: NK::Str { content, unescaped, .. }, .. }) => (content, unescaped),
                _ => (Token::new(StringContent, Span::point(opening.span.end)), Vec::new()),
            };
            return Node::new(span, NK::Symbol { opening, value, closing, unescaped });
        }

        Node::new(span, NK::InterpolatedSymbol { opening, parts, closing })
    }

    /// Parses one argument to `alias` or `undef`: a bare word, a symbol, or
    /// an interpolated symbol.
    pub(crate) fn parse_alias_or_undef_argument(&mut self) -> Node {
        match self.current.kind {
            TokenKind::Identifier => {
                self.bump();
                let value = self.previous;
                let opening = Token::not_provided(value.span.start);
                let closing = Token::not_provided(value.span.end);
                let unescaped = value.text(self.source).to_vec();
                Node::new(value.span, NK::Symbol { opening, value, closing, unescaped })
            }
            TokenKind::SymbolBegin => {
                let mode = self.lexer.mode();
                self.bump();
                self.parse_symbol(mode)
            }
            _ => {
                self.handler.error(
                    "Expected a bare word or symbol argument.",
                    Span::point(self.current.span.start),
                );
                Node::missing(self.current.span.start)
            }
        }
    }

    /// Parses the elements of a `%w`/`%W`/`%i`/`%I` list after its opening
    /// token has been consumed.
    pub(crate) fn parse_word_list(&mut self, opening: Token, symbols: bool, interpolation: bool) -> Node {
        use TokenKind::*;

        let closing_message: &str = match (symbols, interpolation) {
            (true, true) => "Expected a closing delimiter for a `%I` list.",
            (true, false) => "Expected a closing delimiter for a `%i` list.",
            (false, true) => "Expected a closing delimiter for a `%W` list.",
            (false, false) => "Expected a closing delimiter for a `%w` list.",
        };

        let mut elements: Vec<Node> = Vec::new();

        'list: loop {
            self.accept(WordsSep);
            if matches!(self.current.kind, StringEnd | Eof) {
                break;
            }

            // One word: content runs and, in the uppercase forms,
            // interpolation parts.
            let mut parts: Vec<Node> = Vec::new();
            let mut saw_embexpr = false;

            while !matches!(self.current.kind, WordsSep | StringEnd | Eof) {
                match self.current.kind {
                    StringContent => {
                        self.bump();
                        let content = self.previous;
                        if interpolation {
                            let part = self.string_part(content);
                            parts.push(part);
                        } else {
                            let part_opening = Token::not_provided(content.span.start);
                            let part_closing = Token::not_provided(content.span.end);
                            let unescaped = content.text(self.source).to_vec();
                            let kind = if symbols {
                                NK::Symbol {
                                    opening: part_opening,
                                    value: content,
                                    closing: part_closing,
                                    unescaped,
                                }
                            } else {
                                NK::Str {
                                    opening: part_opening,
                                    content,
                                    closing: part_closing,
                                    unescaped,
                                }
                            };
                            parts.push(Node::new(content.span, kind));
                        }
                    }
                    EmbexprBegin => {
                        saw_embexpr = true;
                        let part = self.parse_embexpr_part();
                        parts.push(part);
                    }
                    _ => break 'list,
                }
            }

            if parts.is_empty() {
                continue;
            }

            let element = if parts.len() == 1 && !saw_embexpr {
                parts.remove(0)
            } else {
                let span = Span::new(
                    parts.first().map(|n| n.span.start).unwrap_or(opening.span.end),
                    parts.last().map(|n| n.span.end).unwrap_or(opening.span.end),
                );
                let part_opening = Token::not_provided(span.start);
                let part_closing = Token::not_provided(span.end);
                if symbols {
                    Node::new(span, NK::InterpolatedSymbol { opening: part_opening, parts, closing: part_closing })
                } else {
                    Node::new(span, NK::InterpolatedString { opening: part_opening, parts, closing: part_closing })
                }
            };
            elements.push(element);
        }

        self.expect(StringEnd, closing_message);
        let closing = self.previous;

        let span = Span::new(opening.span.start, closing.span.end.max(
            elements.last().map(|n| n.span.end).unwrap_or(opening.span.end),
        ));
        Node::new(span, NK::Array { opening, elements, closing })
    }

    /// Parses a regexp literal after its opening token has been consumed,
    /// running the named-capture extractor over the content.
    pub(crate) fn parse_regexp(&mut self) -> Node {
        let opening = self.previous;

        let content = if self.accept(TokenKind::StringContent) {
            self.previous
        } else {
            Token::new(TokenKind::StringContent, Span::point(self.previous.span.end))
        };

        self.expect(TokenKind::RegexpEnd, "Expected a closing delimiter for a regular expression.");
        let closing = self.previous;

        let interior = content.text(self.source);
        let named_captures = match regexp::named_captures(interior, self.lexer.encoding()) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|range| {
                    Span::new(content.span.start + range.start as u32, content.span.start + range.end as u32)
                })
                .collect(),
            Err(error) => {
                self.handler.error(error.to_string(), content.span);
                Vec::new()
            }
        };

        let span = Span::new(opening.span.start, closing.span.end.max(content.span.end));
        Node::new(span, NK::RegularExpression { opening, content, closing, named_captures })
    }

    /// The lex mode currently on top of the lexer's stack.
    pub(crate) fn lex_mode(&self) -> LexMode {
        self.lexer.mode()
    }

    pub(crate) fn handler(&self) -> &'h Handler {
        self.handler
    }

    pub(crate) fn source(&self) -> &'src [u8] {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(source: &[u8]) -> (Node, Vec<garnet_util::Diagnostic>) {
        let handler = Handler::new();
        let mut parser = Parser::new(source, &handler);
        let node = parser.parse();
        (node, handler.diagnostics())
    }

    #[test]
    fn test_empty_source_parses_to_empty_program() {
        let (root, diagnostics) = parse_source(b"");
        assert!(diagnostics.is_empty());
        match root.kind {
            NK::Program { statements, .. } => match statements.kind {
                NK::Statements { body } => assert!(body.is_empty()),
                other => panic!("expected statements, got {:?}", other),
            },
            other => panic!("expected program, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_and_trailing_newlines() {
        let (root, diagnostics) = parse_source(b"\n\n1\n\n");
        assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
        match root.kind {
            NK::Program { statements, .. } => match statements.kind {
                NK::Statements { body } => assert_eq!(body.len(), 1),
                other => panic!("expected statements, got {:?}", other),
            },
            other => panic!("expected program, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_are_collected_and_transparent() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"a = 1 # trailing\n# leading\nb = 2\n", &handler);
        let root = parser.parse();
        assert!(!handler.has_errors());

        let comments = parser.comments();
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.kind == CommentKind::Inline));

        match root.kind {
            NK::Program { statements, .. } => match statements.kind {
                NK::Statements { body } => assert_eq!(body.len(), 2),
                other => panic!("expected statements, got {:?}", other),
            },
            other => panic!("expected program, got {:?}", other),
        }
    }

    #[test]
    fn test_embdoc_comment_collection() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"=begin\ndocs\n=end\n1\n", &handler);
        parser.parse();
        assert!(!handler.has_errors());
        assert_eq!(parser.comments().len(), 1);
        assert_eq!(parser.comments()[0].kind, CommentKind::Embdoc);
    }

    #[test]
    fn test_unterminated_embdoc_diagnostic() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"=begin\nno closer", &handler);
        parser.parse();
        assert!(handler.has_errors());
    }

    #[test]
    fn test_end_marker_comment() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"1\n__END__\ndata data data", &handler);
        parser.parse();
        assert!(!handler.has_errors());
        assert_eq!(parser.comments().len(), 1);
        assert_eq!(parser.comments()[0].kind, CommentKind::EndMarker);
    }

    #[test]
    fn test_lex_token_streaming_includes_comments() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"a # c\n", &handler);
        assert_eq!(parser.lex_token(), TokenKind::Identifier);
        assert_eq!(parser.lex_token(), TokenKind::Comment);
        assert_eq!(parser.lex_token(), TokenKind::Newline);
        assert_eq!(parser.lex_token(), TokenKind::Eof);
    }

    #[test]
    fn test_line_column_lookup() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"a\nbb\nccc\n", &handler);
        parser.parse();
        let position = parser.line_column(5);
        assert_eq!((position.line, position.column), (3, 1));
    }

    #[test]
    fn test_lex_mode_stack_restored_after_parse() {
        let handler = Handler::new();
        let mut parser = Parser::new(b"x = \"a#{b}c\"\n", &handler);
        parser.parse();
        assert_eq!(parser.lex_mode_depth(), 1);
    }

    #[test]
    fn test_local_declaration_and_lookup() {
        let (root, diagnostics) = parse_source(b"foo = 1\nfoo\n");
        assert!(diagnostics.is_empty());

        match root.kind {
            NK::Program { scope, statements } => {
                match scope.kind {
                    NK::Scope { locals } => assert_eq!(locals.len(), 1),
                    other => panic!("expected scope, got {:?}", other),
                }
                match statements.kind {
                    NK::Statements { body } => {
                        assert!(matches!(body[0].kind, NK::LocalVariableWrite { .. }));
                        assert!(matches!(body[1].kind, NK::LocalVariableRead { .. }));
                    }
                    other => panic!("expected statements, got {:?}", other),
                }
            }
            other => panic!("expected program, got {:?}", other),
        }
    }
}
