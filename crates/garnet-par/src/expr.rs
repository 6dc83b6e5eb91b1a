//! Expression parsing (Pratt parser).
//!
//! Every token kind maps to a pair of binding powers; the main loop parses a
//! prefix expression and then keeps folding infix operators whose left
//! binding power reaches the current minimum. Left-associative operators
//! have `right = left + 1`, right-associative ones `right = left`.
//!
//! Two things distinguish this from a textbook Pratt parser:
//!
//! - Failure is structural, not control flow. A prefix position with no
//!   usable token yields a `Missing` node, pushes the unexpected token back
//!   into the lookahead, and (when an enclosing context can resume there)
//!   sets the recovering flag.
//! - Assignment is reinterpretation. `=` takes whatever was parsed on its
//!   left and rewrites it: reads become writes, a receiverless zero-argument
//!   call turns out to have been a local variable introduction, `foo.bar`
//!   becomes a `bar=` call, `foo[i]` becomes `[]=`.

use crate::ast::NodeKind as NK;
use crate::{Context, Node, Parser, StringFlavor};
use garnet_lex::{LexMode, Token, TokenKind};
use garnet_util::Span;

/// Binding power levels, weakest first. `bp::NONE` is the minimum used when
/// any expression is acceptable.
pub(crate) mod bp {
    pub const NONE: u8 = 1;
    /// Braces (reserved level between statements and modifiers).
    pub const BRACES: u8 = 2;
    /// `if` `unless` `while` `until` as statement modifiers.
    pub const MODIFIER: u8 = 3;
    /// `and` `or`
    pub const COMPOSITION: u8 = 4;
    /// `not`
    pub const NOT: u8 = 5;
    /// `defined?`
    pub const DEFINED: u8 = 6;
    /// `=` and the operator assignments.
    pub const ASSIGNMENT: u8 = 7;
    /// `rescue` as an expression modifier.
    pub const MODIFIER_RESCUE: u8 = 8;
    /// `? :`
    pub const TERNARY: u8 = 9;
    /// `..` `...`
    pub const RANGE: u8 = 10;
    /// `||`
    pub const LOGICAL_OR: u8 = 11;
    /// `&&`
    pub const LOGICAL_AND: u8 = 12;
    /// `<=>` `==` `===` `!=` `=~` `!~`
    pub const EQUALITY: u8 = 13;
    /// `>` `>=` `<` `<=`
    pub const COMPARISON: u8 = 14;
    /// `|` `^`
    pub const BITWISE_OR: u8 = 15;
    /// `&`
    pub const BITWISE_AND: u8 = 16;
    /// `<<` `>>`
    pub const SHIFT: u8 = 17;
    /// `+` `-`
    pub const TERM: u8 = 18;
    /// `*` `/` `%`
    pub const FACTOR: u8 = 19;
    /// Unary minus.
    pub const UMINUS: u8 = 20;
    /// `**`
    pub const EXPONENT: u8 = 21;
    /// `!` `~` and unary `+`.
    pub const UNARY: u8 = 22;
    /// `[`
    pub const INDEX: u8 = 23;
    /// `.` `::` `&.`
    pub const CALL: u8 = 24;
}

/// The binding powers of one token kind. A zero left power means the token
/// never continues an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BindingPowers {
    pub left: u8,
    pub right: u8,
}

const fn left_assoc(power: u8) -> BindingPowers {
    BindingPowers { left: power, right: power + 1 }
}

const fn right_assoc(power: u8) -> BindingPowers {
    BindingPowers { left: power, right: power }
}

const NO_POWER: BindingPowers = BindingPowers { left: 0, right: 0 };

/// The binding powers for the given token kind in infix position.
pub(crate) fn binding_powers(kind: TokenKind) -> BindingPowers {
    use TokenKind::*;

    match kind {
        // if unless until while as statement modifiers
        KeywordIf | KeywordUnless | KeywordUntil | KeywordWhile => left_assoc(bp::MODIFIER),

        // and or
        KeywordAnd | KeywordOr => left_assoc(bp::COMPOSITION),

        // rescue as an expression modifier
        KeywordRescue => left_assoc(bp::MODIFIER_RESCUE),

        // = &&= &= ^= >>= <<= -= %= |= ||= += /= *= **=
        Equal
        | AmpersandAmpersandEqual
        | AmpersandEqual
        | CaretEqual
        | GreaterGreaterEqual
        | LessLessEqual
        | MinusEqual
        | PercentEqual
        | PipeEqual
        | PipePipeEqual
        | PlusEqual
        | SlashEqual
        | StarEqual
        | StarStarEqual => right_assoc(bp::ASSIGNMENT),

        // ?:
        QuestionMark => right_assoc(bp::TERNARY),

        // .. ...
        DotDot | DotDotDot => left_assoc(bp::RANGE),

        // ||
        PipePipe => left_assoc(bp::LOGICAL_OR),

        // &&
        AmpersandAmpersand => left_assoc(bp::LOGICAL_AND),

        // != !~ == === =~ <=>
        BangEqual | BangTilde | EqualEqual | EqualEqualEqual | EqualTilde | LessEqualGreater => {
            right_assoc(bp::EQUALITY)
        }

        // > >= < <=
        Greater | GreaterEqual | Less | LessEqual => right_assoc(bp::COMPARISON),

        // ^ |
        Caret | Pipe => right_assoc(bp::BITWISE_OR),

        // &
        Ampersand => right_assoc(bp::BITWISE_AND),

        // >> <<
        GreaterGreater | LessLess => right_assoc(bp::SHIFT),

        // - +
        Minus | Plus => left_assoc(bp::TERM),

        // % / *
        Percent | Slash | Star => left_assoc(bp::FACTOR),

        // **
        StarStar => right_assoc(bp::EXPONENT),

        // ! ~
        Bang | Tilde => right_assoc(bp::UNARY),

        // foo[bar]
        BracketLeft => left_assoc(bp::INDEX),

        // :: . &.
        ColonColon | Dot | AmpersandDot => right_assoc(bp::CALL),

        _ => NO_POWER,
    }
}

impl<'src, 'h> Parser<'src, 'h> {
    /// Parses one expression. Operators continue the expression only while
    /// their left binding power reaches `minimum`. If the prefix position
    /// has no usable token, `message` is recorded as an error at the end of
    /// the token before the failure and a `Missing` node is returned.
    pub(crate) fn parse_expression(&mut self, minimum: u8, message: &str) -> Node {
        let recovery = self.previous;
        let mut node = self.parse_expression_prefix();

        if node.is_missing() {
            self.handler().error(message, Span::point(recovery.span.end));
            return node;
        }

        loop {
            let powers = binding_powers(self.current.kind);
            if powers.left == 0 || powers.left < minimum {
                break;
            }

            self.bump();
            let operator = self.previous;
            node = self.parse_expression_infix(node, operator, powers.right);
        }

        node
    }

    // =========================================================================
    // Prefix positions
    // =========================================================================

    fn parse_expression_prefix(&mut self) -> Node {
        use TokenKind::*;

        let recoverable = self.previous;
        let mode = self.lex_mode();
        self.bump();

        match self.previous.kind {
            BracketLeft => self.parse_array(),
            ParenthesisLeft => self.parse_parentheses(),
            BraceLeft => self.parse_hash(),

            CharacterLiteral => {
                // ?x is a one-character string; the span splits into a
                // one-byte opener and the character itself.
                let token = self.previous;
                let opening = Token::new(StringBegin, Span::new(token.span.start, token.span.start + 1));
                let content = Token::new(StringContent, Span::new(token.span.start + 1, token.span.end));
                let closing = Token::not_provided(token.span.end);
                let unescaped = content.text(self.source()).to_vec();
                Node::new(token.span, NK::Str { opening, content, closing, unescaped })
            }

            ClassVariable => {
                let name = self.previous;
                Node::new(name.span, NK::ClassVariableRead { name })
            }
            Constant => {
                let name = self.previous;
                Node::new(name.span, NK::ConstantRead { name })
            }
            GlobalVariable | BackReference | NthReference => {
                let name = self.previous;
                Node::new(name.span, NK::GlobalVariableRead { name })
            }
            InstanceVariable => {
                let name = self.previous;
                Node::new(name.span, NK::InstanceVariableRead { name })
            }

            Float => {
                let value = self.previous;
                Node::new(value.span, NK::FloatLiteral { value })
            }
            Integer => {
                let value = self.previous;
                Node::new(value.span, NK::IntegerLiteral { value })
            }
            ImaginaryNumber => {
                let value = self.previous;
                Node::new(value.span, NK::ImaginaryLiteral { value })
            }
            RationalNumber => {
                let value = self.previous;
                Node::new(value.span, NK::RationalLiteral { value })
            }

            Identifier => self.parse_identifier(),

            KeywordAlias => {
                let keyword = self.previous;
                let new_name = self.parse_alias_or_undef_argument();
                let old_name = self.parse_alias_or_undef_argument();

                let end = old_name.span.end.max(new_name.span.end).max(keyword.span.end);
                Node::new(
                    Span::new(keyword.span.start, end),
                    NK::Alias { keyword, new_name: Box::new(new_name), old_name: Box::new(old_name) },
                )
            }

            KeywordBegin => self.parse_begin(),

            KeywordBeginUpcase => {
                let keyword = self.previous;
                self.expect(BraceLeft, "Expected '{' after 'BEGIN'.");
                let opening = self.previous;
                let statements = self.parse_statements(Context::Preexe);
                self.expect(BraceRight, "Expected '}' after 'BEGIN' statements.");
                let closing = self.previous;

                let span = Span::new(keyword.span.start, closing.span.end.max(statements.span.end));
                Node::new(
                    span,
                    NK::PreExecution { keyword, opening, statements: Box::new(statements), closing },
                )
            }
            KeywordEndUpcase => {
                let keyword = self.previous;
                self.expect(BraceLeft, "Expected '{' after 'END'.");
                let opening = self.previous;
                let statements = self.parse_statements(Context::Postexe);
                self.expect(BraceRight, "Expected '}' after 'END' statements.");
                let closing = self.previous;

                let span = Span::new(keyword.span.start, closing.span.end.max(statements.span.end));
                Node::new(
                    span,
                    NK::PostExecution { keyword, opening, statements: Box::new(statements), closing },
                )
            }

            KeywordBreak | KeywordNext | KeywordReturn | KeywordSuper | KeywordYield => {
                self.parse_jump()
            }

            KeywordClass => self.parse_class(),
            KeywordModule => self.parse_module(),
            KeywordDef => self.parse_def(),
            KeywordFor => self.parse_for(),

            KeywordDefined => {
                let keyword = self.previous;
                let lparen = if self.accept(ParenthesisLeft) { self.previous } else { self.not_provided() };

                let expression = self.parse_expression(bp::DEFINED, "Expected expression after `defined?`.");

                let rparen = if !self.recovering && lparen.kind == ParenthesisLeft {
                    self.expect(ParenthesisRight, "Expected ')' after 'defined?' expression.");
                    self.previous
                } else {
                    self.not_provided()
                };

                let end = rparen.span.end.max(expression.span.end).max(keyword.span.end);
                Node::new(
                    Span::new(keyword.span.start, end),
                    NK::Defined { keyword, lparen, expression: Box::new(expression), rparen },
                )
            }

            KeywordIf => self.parse_conditional(Context::If),
            KeywordUnless => self.parse_conditional(Context::Unless),

            KeywordUndef => {
                let keyword = self.previous;
                let mut names = Vec::new();

                let name = self.parse_alias_or_undef_argument();
                if name.is_missing() {
                    let span = Span::new(keyword.span.start, keyword.span.end);
                    return Node::new(span, NK::Undef { keyword, names });
                }
                names.push(name);

                while self.accept(Comma) {
                    let name = self.parse_alias_or_undef_argument();
                    if name.is_missing() {
                        break;
                    }
                    names.push(name);
                }

                let end = names.last().map(|n| n.span.end).unwrap_or(keyword.span.end);
                Node::new(Span::new(keyword.span.start, end), NK::Undef { keyword, names })
            }

            KeywordWhile => {
                let keyword = self.previous;
                let predicate = self.parse_expression(bp::NONE, "Expected predicate expression after `while`.");
                self.accept_any(&[KeywordDo, KeywordThen, Newline, Semicolon]);

                let statements = self.parse_statements(Context::While);
                self.expect(KeywordEnd, "Expected `end` to close `while` statement.");

                let span = Span::new(keyword.span.start, self.previous.span.end.max(statements.span.end));
                Node::new(
                    span,
                    NK::While { keyword, predicate: Box::new(predicate), statements: Box::new(statements) },
                )
            }
            KeywordUntil => {
                let keyword = self.previous;
                let predicate = self.parse_expression(bp::NONE, "Expected predicate expression after `until`.");
                self.accept_any(&[KeywordDo, KeywordThen, Newline, Semicolon]);

                let statements = self.parse_statements(Context::Until);
                self.expect(KeywordEnd, "Expected `end` to close `until` statement.");

                let span = Span::new(keyword.span.start, self.previous.span.end.max(statements.span.end));
                Node::new(
                    span,
                    NK::Until { keyword, predicate: Box::new(predicate), statements: Box::new(statements) },
                )
            }

            KeywordFalse => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::False { keyword })
            }
            KeywordNil => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::Nil { keyword })
            }
            KeywordRedo => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::Redo { keyword })
            }
            KeywordRetry => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::Retry { keyword })
            }
            KeywordSelf => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::SelfNode { keyword })
            }
            KeywordTrue => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::True { keyword })
            }
            KeywordEncoding => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::SourceEncoding { keyword })
            }
            KeywordFile => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::SourceFile { keyword })
            }
            KeywordLine => {
                let keyword = self.previous;
                Node::new(keyword.span, NK::SourceLine { keyword })
            }

            KeywordNot => {
                let operator = self.previous;
                let receiver = self.parse_expression(bp::NOT, "Expected a receiver after `not`.");
                self.unary_call_node(operator, receiver, b"!")
            }
            Bang => {
                let operator = self.previous;
                let receiver = self.parse_expression(
                    binding_powers(Bang).right,
                    "Expected a receiver after unary operator.",
                );
                self.unary_call_node(operator, receiver, b"!")
            }
            Tilde => {
                let operator = self.previous;
                let receiver = self.parse_expression(
                    binding_powers(Tilde).right,
                    "Expected a receiver after unary operator.",
                );
                self.unary_call_node(operator, receiver, b"~")
            }
            Minus => {
                let operator = self.previous;
                let receiver = self.parse_expression(
                    binding_powers(Minus).right,
                    "Expected a receiver after unary -.",
                );
                self.unary_call_node(operator, receiver, b"-@")
            }
            Plus => {
                let operator = self.previous;
                let receiver = self.parse_expression(
                    binding_powers(Plus).right,
                    "Expected a receiver after unary +.",
                );
                self.unary_call_node(operator, receiver, b"+@")
            }

            PercentLowerW => {
                let opening = self.previous;
                self.parse_word_list(opening, false, false)
            }
            PercentUpperW => {
                let opening = self.previous;
                self.parse_word_list(opening, false, true)
            }
            PercentLowerI => {
                let opening = self.previous;
                self.parse_word_list(opening, true, false)
            }
            PercentUpperI => {
                let opening = self.previous;
                self.parse_word_list(opening, true, true)
            }

            RegexpBegin => self.parse_regexp(),

            StringBegin => {
                let opening = self.previous;
                let interpolation = matches!(mode, LexMode::String { interpolation: true, .. });
                let node = self.parse_string_body(opening, interpolation, StringFlavor::Plain);

                // Adjacent string literals concatenate.
                if matches!(node.kind, NK::Str { .. }) && self.current.kind == StringBegin {
                    let right = self.parse_expression(
                        bp::CALL,
                        "Expected string on the right side of concatenation.",
                    );
                    let span = Span::new(node.span.start, right.span.end);
                    return Node::new(
                        span,
                        NK::StringConcat { left: Box::new(node), right: Box::new(right) },
                    );
                }

                node
            }
            Backtick => {
                let opening = self.previous;
                self.parse_string_body(opening, true, StringFlavor::XString)
            }
            PercentLowerX => {
                let opening = self.previous;
                self.parse_string_body(opening, true, StringFlavor::XString)
            }

            SymbolBegin => self.parse_symbol(mode),

            _ => {
                // Nothing knows how to start an expression with this token.
                // Put it back in the lookahead, drop into recovery if some
                // enclosing context can resume at it, and hand back a
                // placeholder.
                if self.context_recoverable(self.previous.kind) {
                    self.recovering = true;
                }

                self.current = self.previous;
                self.previous = recoverable;
                Node::missing(self.previous.span.end)
            }
        }
    }

    /// A bare identifier: a local variable read if the name is declared and
    /// nothing makes it a call, otherwise a receiverless call.
    fn parse_identifier(&mut self) -> Node {
        let message = self.previous;

        let text = message.text(self.source());
        let has_suffix = matches!(text.last(), Some(b'!') | Some(b'?'));

        if self.current.kind != TokenKind::ParenthesisLeft
            && !has_suffix
            && self.local_variable_defined(&message)
        {
            return Node::new(message.span, NK::LocalVariableRead { name: message });
        }

        let call_operator = Token::not_provided(message.span.start);
        let list = self.parse_arguments_list();

        let end = list.closing.span.end.max(message.span.end);
        Node::new(
            Span::new(message.span.start, end),
            NK::Call {
                receiver: None,
                call_operator,
                message,
                opening: list.opening,
                arguments: list.arguments.map(Box::new),
                closing: list.closing,
                name: text.to_vec(),
            },
        )
    }

    /// `break`/`next`/`return`/`super`/`yield` with an optional argument
    /// list. A bare `super` forwards the enclosing method's arguments.
    fn parse_jump(&mut self) -> Node {
        let keyword = self.previous;
        let list = self.parse_arguments_list();

        if keyword.kind == TokenKind::KeywordSuper && list.is_forwarding_super_shape() {
            return Node::new(keyword.span, NK::ForwardingSuper { keyword });
        }

        let end = list
            .arguments
            .as_ref()
            .map(|n| n.span.end)
            .unwrap_or(keyword.span.end)
            .max(list.closing.span.end);
        let span = Span::new(keyword.span.start, end);

        let opening = list.opening;
        let arguments = list.arguments.map(Box::new);
        let closing = list.closing;

        let kind = match keyword.kind {
            TokenKind::KeywordBreak => NK::Break { keyword, opening, arguments, closing },
            TokenKind::KeywordNext => NK::Next { keyword, opening, arguments, closing },
            TokenKind::KeywordReturn => NK::Return { keyword, opening, arguments, closing },
            TokenKind::KeywordSuper => NK::Super { keyword, opening, arguments, closing },
            _ => NK::Yield { keyword, opening, arguments, closing },
        };
        Node::new(span, kind)
    }

    /// `[ … ]`
    fn parse_array(&mut self) -> Node {
        use TokenKind::*;

        let opening = self.previous;
        let mut elements: Vec<Node> = Vec::new();

        while !matches!(self.current.kind, BracketRight | Eof) {
            if !elements.is_empty() {
                self.expect(Comma, "Expected a separator for the elements in an array.");
            }

            let element = self.parse_expression(bp::DEFINED, "Expected an element for the array.");
            let stop = element.is_missing();
            elements.push(element);
            if stop {
                break;
            }
        }

        self.expect(BracketRight, "Expected a closing bracket for the array.");
        let closing = self.previous;

        let span = Span::new(opening.span.start, closing.span.end.max(
            elements.last().map(|n| n.span.end).unwrap_or(opening.span.end),
        ));
        Node::new(span, NK::Array { opening, elements, closing })
    }

    /// `( statements )`
    fn parse_parentheses(&mut self) -> Node {
        use TokenKind::*;

        let opening = self.previous;

        let statements = if !matches!(self.current.kind, ParenthesisRight | Eof) {
            self.parse_statements(Context::Parens)
        } else {
            self.statements_node(Vec::new())
        };

        self.expect(ParenthesisRight, "Expected a closing parenthesis.");
        let closing = self.previous;

        let span = Span::new(opening.span.start, closing.span.end.max(statements.span.end));
        Node::new(span, NK::Parentheses { opening, statements: Box::new(statements), closing })
    }

    /// `{ key => value, label: value, **splat }`
    fn parse_hash(&mut self) -> Node {
        use TokenKind::*;

        let opening = self.previous;
        let mut elements: Vec<Node> = Vec::new();

        while !matches!(self.current.kind, BraceRight | Eof) {
            if !elements.is_empty() {
                self.expect(Comma, "Expected a separator between hash elements.");
                if self.current.kind == BraceRight {
                    break;
                }
            }

            match self.current.kind {
                StarStar => {
                    self.bump();
                    let operator = self.previous;
                    let value = self.parse_expression(bp::DEFINED, "Expected a value after `**`.");
                    let span = Span::new(operator.span.start, value.span.end);
                    elements.push(Node::new(span, NK::AssocSplat { operator, value: Box::new(value) }));
                }
                Label => {
                    self.bump();
                    let label = self.previous;

                    // The label doubles as a symbol key; its name drops the
                    // trailing colon.
                    let key_opening = Token::not_provided(label.span.start);
                    let key_closing = Token::not_provided(label.span.end);
                    let name_span = Span::new(label.span.start, label.span.end - 1);
                    let unescaped = name_span.text(self.source()).to_vec();
                    let key = Node::new(
                        label.span,
                        NK::Symbol { opening: key_opening, value: label, closing: key_closing, unescaped },
                    );

                    let operator = Token::not_provided(label.span.end);
                    let value = self.parse_expression(bp::DEFINED, "Expected a value in the hash literal.");
                    let span = Span::new(label.span.start, value.span.end);
                    elements.push(Node::new(
                        span,
                        NK::Assoc { key: Box::new(key), operator, value: Box::new(value) },
                    ));
                }
                _ => {
                    let key = self.parse_expression(bp::DEFINED, "Expected a key in the hash literal.");
                    if key.is_missing() {
                        elements.push(key);
                        break;
                    }

                    self.expect(EqualGreater, "Expected a `=>` between the hash key and value.");
                    let operator = self.previous;
                    let value = self.parse_expression(bp::DEFINED, "Expected a value in the hash literal.");

                    let span = Span::new(key.span.start, value.span.end);
                    elements.push(Node::new(
                        span,
                        NK::Assoc { key: Box::new(key), operator, value: Box::new(value) },
                    ));
                }
            }
        }

        self.expect(BraceRight, "Expected a closing brace for the hash literal.");
        let closing = self.previous;

        let span = Span::new(opening.span.start, closing.span.end.max(
            elements.last().map(|n| n.span.end).unwrap_or(opening.span.end),
        ));
        Node::new(span, NK::Hash { opening, elements, closing })
    }

    /// Builds the call node for a unary operator; the method name is the
    /// operator's method spelling (`-@`, `+@`, `!`, `~`).
    fn unary_call_node(&mut self, operator: Token, receiver: Node, name: &[u8]) -> Node {
        let call_operator = Token::not_provided(operator.span.start);
        let opening = Token::not_provided(operator.span.end);
        let closing = Token::not_provided(operator.span.end);

        let span = Span::new(operator.span.start, receiver.span.end.max(operator.span.end));
        Node::new(
            span,
            NK::Call {
                receiver: Some(Box::new(receiver)),
                call_operator,
                message: operator,
                opening,
                arguments: None,
                closing,
                name: name.to_vec(),
            },
        )
    }

    // =========================================================================
    // Infix positions
    // =========================================================================

    fn parse_expression_infix(&mut self, node: Node, token: Token, minimum: u8) -> Node {
        use TokenKind::*;

        match token.kind {
            Equal => self.parse_assignment(node, token, minimum),

            AmpersandAmpersandEqual => {
                let value = self.parse_expression(minimum, "Expected a value after &&=");
                let span = Span::new(node.span.start, value.span.end);
                Node::new(
                    span,
                    NK::OperatorAndAssignment {
                        target: Box::new(node),
                        operator: token,
                        value: Box::new(value),
                    },
                )
            }
            PipePipeEqual => {
                let value = self.parse_expression(minimum, "Expected a value after ||=");
                let span = Span::new(node.span.start, value.span.end);
                Node::new(
                    span,
                    NK::OperatorOrAssignment {
                        target: Box::new(node),
                        operator: token,
                        value: Box::new(value),
                    },
                )
            }
            AmpersandEqual | CaretEqual | GreaterGreaterEqual | LessLessEqual | MinusEqual
            | PercentEqual | PipeEqual | PlusEqual | SlashEqual | StarEqual | StarStarEqual => {
                let value = self.parse_expression(minimum, "Expected a value after the operator.");
                let span = Span::new(node.span.start, value.span.end);
                Node::new(
                    span,
                    NK::OperatorAssignment {
                        target: Box::new(node),
                        operator: token,
                        value: Box::new(value),
                    },
                )
            }

            AmpersandAmpersand | KeywordAnd => {
                let right = self.parse_expression(minimum, "Expected a value after the operator.");
                let span = Span::new(node.span.start, right.span.end);
                Node::new(span, NK::And { left: Box::new(node), operator: token, right: Box::new(right) })
            }
            PipePipe | KeywordOr => {
                let right = self.parse_expression(minimum, "Expected a value after the operator.");
                let span = Span::new(node.span.start, right.span.end);
                Node::new(span, NK::Or { left: Box::new(node), operator: token, right: Box::new(right) })
            }

            // The binary operators all become calls on the left operand.
            BangEqual | BangTilde | EqualEqual | EqualEqualEqual | EqualTilde | LessEqualGreater
            | Greater | GreaterEqual | Less | LessEqual | Caret | Pipe | Ampersand
            | GreaterGreater | LessLess | Minus | Plus | Percent | Slash | Star | StarStar => {
                let argument = self.parse_expression(minimum, "Expected a value after the operator.");

                let arguments_span = argument.span;
                let arguments = Node::new(arguments_span, NK::Arguments { arguments: vec![argument] });

                let call_operator = Token::not_provided(token.span.start);
                let opening = Token::not_provided(token.span.end);
                let closing = Token::not_provided(token.span.end);
                let name = token.text(self.source()).to_vec();

                let span = Span::new(node.span.start, arguments_span.end);
                Node::new(
                    span,
                    NK::Call {
                        receiver: Some(Box::new(node)),
                        call_operator,
                        message: token,
                        opening,
                        arguments: Some(Box::new(arguments)),
                        closing,
                        name,
                    },
                )
            }

            Dot | AmpersandDot => self.parse_call_chain(node, token),

            ColonColon => self.parse_constant_path(node, token, minimum),

            DotDot | DotDotDot => {
                let right = self.parse_expression(minimum, "Expected a value after the operator.");
                let span = Span::new(node.span.start, right.span.end);
                Node::new(span, NK::Range { left: Box::new(node), operator: token, right: Box::new(right) })
            }

            BracketLeft => self.parse_index(node, token),

            // Statement modifiers wrap the left expression in a
            // single-statement list.
            KeywordIf => {
                let statements = self.statements_node_from(node);
                let predicate = self.parse_expression(minimum, "Expected a predicate after 'if'");
                let end_keyword = Token::not_provided(self.previous.span.end);

                let span = Span::new(statements.span.start, predicate.span.end);
                Node::new(
                    span,
                    NK::If {
                        keyword: token,
                        predicate: Box::new(predicate),
                        statements: Box::new(statements),
                        consequent: None,
                        end_keyword,
                    },
                )
            }
            KeywordUnless => {
                let statements = self.statements_node_from(node);
                let predicate = self.parse_expression(minimum, "Expected a predicate after 'unless'");
                let end_keyword = Token::not_provided(self.previous.span.end);

                let span = Span::new(statements.span.start, predicate.span.end);
                Node::new(
                    span,
                    NK::Unless {
                        keyword: token,
                        predicate: Box::new(predicate),
                        statements: Box::new(statements),
                        consequent: None,
                        end_keyword,
                    },
                )
            }
            KeywordWhile => {
                let statements = self.statements_node_from(node);
                let predicate = self.parse_expression(minimum, "Expected a predicate after 'while'");

                let span = Span::new(statements.span.start, predicate.span.end);
                Node::new(
                    span,
                    NK::While { keyword: token, predicate: Box::new(predicate), statements: Box::new(statements) },
                )
            }
            KeywordUntil => {
                let statements = self.statements_node_from(node);
                let predicate = self.parse_expression(minimum, "Expected a predicate after 'until'");

                let span = Span::new(statements.span.start, predicate.span.end);
                Node::new(
                    span,
                    NK::Until { keyword: token, predicate: Box::new(predicate), statements: Box::new(statements) },
                )
            }

            KeywordRescue => {
                let rescue_expression = self.parse_expression(minimum, "Expected a value after `rescue`.");
                let span = Span::new(node.span.start, rescue_expression.span.end);
                Node::new(
                    span,
                    NK::RescueModifier {
                        expression: Box::new(node),
                        keyword: token,
                        rescue_expression: Box::new(rescue_expression),
                    },
                )
            }

            QuestionMark => {
                let true_expression = self.parse_expression(minimum, "Expected a value after '?'");

                if self.recovering {
                    // Synthesize the rest of the ternary so the error does
                    // not cascade through the expected ':'.
                    let colon = Token::missing(self.previous.span.end);
                    let false_expression = Node::missing(colon.span.end);

                    let span = Span::new(node.span.start, true_expression.span.end);
                    return Node::new(
                        span,
                        NK::Ternary {
                            predicate: Box::new(node),
                            question_mark: token,
                            true_expression: Box::new(true_expression),
                            colon,
                            false_expression: Box::new(false_expression),
                        },
                    );
                }

                self.expect(TokenKind::Colon, "Expected ':' after true expression in ternary operator.");
                let colon = self.previous;
                let false_expression = self.parse_expression(minimum, "Expected a value after ':'");

                let span = Span::new(node.span.start, false_expression.span.end.max(colon.span.end));
                Node::new(
                    span,
                    NK::Ternary {
                        predicate: Box::new(node),
                        question_mark: token,
                        true_expression: Box::new(true_expression),
                        colon,
                        false_expression: Box::new(false_expression),
                    },
                )
            }

            _ => node,
        }
    }

    /// Wraps an expression in a one-statement list, for the statement
    /// modifiers.
    fn statements_node_from(&self, node: Node) -> Node {
        let span = node.span;
        Node::new(span, NK::Statements { body: vec![node] })
    }

    /// Reinterprets the left operand of `=` as an assignment target.
    fn parse_assignment(&mut self, node: Node, token: Token, minimum: u8) -> Node {
        let node_span = node.span;

        match node.kind {
            NK::ClassVariableRead { name } => {
                let value = self.parse_expression(minimum, "Expected a value for the class variable after =.");
                let span = Span::new(node_span.start, value.span.end);
                Node::new(span, NK::ClassVariableWrite { name, operator: token, value: Box::new(value) })
            }

            kind @ (NK::ConstantRead { .. } | NK::ConstantPath { .. }) => {
                let target = Node::new(node_span, kind);
                let value = self.parse_expression(minimum, "Expected a value for the constant after =.");
                let span = Span::new(node_span.start, value.span.end);
                Node::new(
                    span,
                    NK::ConstantPathWrite { target: Box::new(target), operator: token, value: Box::new(value) },
                )
            }

            NK::GlobalVariableRead { name } => {
                let value = self.parse_expression(minimum, "Expected a value for the global variable after =.");
                let span = Span::new(node_span.start, value.span.end);
                Node::new(span, NK::GlobalVariableWrite { name, operator: token, value: Box::new(value) })
            }

            NK::LocalVariableRead { name } => {
                let value = self.parse_expression(minimum, "Expected a value for the local variable after =.");
                self.declare_local(name);
                let span = Span::new(node_span.start, value.span.end);
                Node::new(span, NK::LocalVariableWrite { name, operator: token, value: Box::new(value) })
            }

            NK::InstanceVariableRead { name } => {
                let value = self.parse_expression(minimum, "Expected a value for the instance variable after =.");
                let span = Span::new(node_span.start, value.span.end);
                Node::new(span, NK::InstanceVariableWrite { name, operator: token, value: Box::new(value) })
            }

            NK::Call { receiver, call_operator, message, opening, arguments, closing, name } => {
                if name == b"[]" {
                    // foo[i] = x goes through the []= call form with the
                    // value appended to the index arguments.
                    let value = self.parse_expression(minimum, "Expected a value for the element after =.");
                    let value_span = value.span;

                    let mut index_arguments = match arguments {
                        Some(boxed) => *boxed,
                        None => Node::new(Span::point(token.span.end), NK::Arguments { arguments: Vec::new() }),
                    };
                    index_arguments.span = index_arguments.span.join(value_span);
                    if let NK::Arguments { arguments: ref mut list } = index_arguments.kind {
                        list.push(value);
                    }

                    let span = Span::new(node_span.start, value_span.end);
                    return Node::new(
                        span,
                        NK::Call {
                            receiver,
                            call_operator,
                            message,
                            opening,
                            arguments: Some(Box::new(index_arguments)),
                            closing,
                            name: b"[]=".to_vec(),
                        },
                    );
                }

                if opening.kind == TokenKind::NotProvided && arguments.is_none() {
                    if receiver.is_none() {
                        // What looked like a receiverless call was really a
                        // local variable introduction: foo = 1.
                        let value = self.parse_expression(minimum, "Expected a value for the local variable after =.");
                        self.declare_local(message);
                        let span = Span::new(node_span.start, value.span.end);
                        return Node::new(
                            span,
                            NK::LocalVariableWrite { name: message, operator: token, value: Box::new(value) },
                        );
                    }

                    // foo.bar = x is a call to bar= with one argument.
                    let value = self.parse_expression(minimum, "Expected a value for the call after =.");
                    let value_span = value.span;
                    let argument_list = Node::new(value_span, NK::Arguments { arguments: vec![value] });

                    let mut writer_name = name;
                    writer_name.push(b'=');

                    let span = Span::new(node_span.start, value_span.end);
                    return Node::new(
                        span,
                        NK::Call {
                            receiver,
                            call_operator,
                            message,
                            opening: Token::not_provided(token.span.end),
                            arguments: Some(Box::new(argument_list)),
                            closing: Token::not_provided(value_span.end),
                            name: writer_name,
                        },
                    );
                }

                // A call with arguments cannot be assigned to.
                self.handler().error("Unexpected `='.", Span::point(token.span.start));
                Node::new(
                    node_span,
                    NK::Call { receiver, call_operator, message, opening, arguments, closing, name },
                )
            }

            other => {
                self.handler().error("Unexpected `='.", Span::point(token.span.start));
                Node::new(node_span, other)
            }
        }
    }

    /// `receiver.method`, `receiver&.method`, and the `receiver.(args)`
    /// shorthand, which calls `call`.
    fn parse_call_chain(&mut self, node: Node, token: Token) -> Node {
        use TokenKind::*;

        let call_operator = token;

        if self.accept(ParenthesisLeft) {
            let opening = self.previous;
            let message = Token::not_provided(opening.span.start);

            let (arguments, closing) = if self.accept(ParenthesisRight) {
                (None, self.previous)
            } else {
                let arguments = self.parse_arguments();
                (Some(arguments), self.previous)
            };

            let span = Span::new(node.span.start, closing.span.end);
            return Node::new(
                span,
                NK::Call {
                    receiver: Some(Box::new(node)),
                    call_operator,
                    message,
                    opening,
                    arguments: arguments.map(Box::new),
                    closing,
                    name: b"call".to_vec(),
                },
            );
        }

        // The message can be any method-name token: an identifier, an
        // operator spelling (`foo.+(x)`, `foo.<=>(y)`), or the aref forms
        // the lexer folds after a dot (`foo.[]`, `foo.[]=`).
        self.expect_method_name("Expected a method name after '.'");
        let message = self.previous;
        let name = message.text(self.source()).to_vec();

        let list = self.parse_arguments_list();
        let end = list.closing.span.end.max(message.span.end);

        let span = Span::new(node.span.start, end);
        Node::new(
            span,
            NK::Call {
                receiver: Some(Box::new(node)),
                call_operator,
                message,
                opening: list.opening,
                arguments: list.arguments.map(Box::new),
                closing: list.closing,
                name,
            },
        )
    }

    /// `parent::Child` is a constant path; `parent::method` re-roots the
    /// parsed call onto the receiver.
    fn parse_constant_path(&mut self, node: Node, token: Token, minimum: u8) -> Node {
        use TokenKind::*;

        let delimiter = token;

        match self.current.kind {
            Constant => {
                let child = self.parse_expression(minimum, "Expected a value after '::'");
                let span = Span::new(node.span.start, child.span.end);
                Node::new(
                    span,
                    NK::ConstantPath { parent: Box::new(node), delimiter, child: Box::new(child) },
                )
            }
            Identifier => {
                let child = self.parse_expression(minimum, "Expected a value after '::'");
                let child_span = child.span;
                match child.kind {
                    NK::Call { receiver: _, call_operator: _, message, opening, arguments, closing, name } => {
                        let span = Span::new(node.span.start, child_span.end);
                        Node::new(
                            span,
                            NK::Call {
                                receiver: Some(Box::new(node)),
                                call_operator: delimiter,
                                message,
                                opening,
                                arguments,
                                closing,
                                name,
                            },
                        )
                    }
                    kind => {
                        // A local variable read; keep it as the path child.
                        let child = Node::new(child_span, kind);
                        let span = Span::new(node.span.start, child_span.end);
                        Node::new(
                            span,
                            NK::ConstantPath { parent: Box::new(node), delimiter, child: Box::new(child) },
                        )
                    }
                }
            }
            _ => {
                self.handler().error(
                    "Expected identifier or constant after '::'",
                    Span::point(delimiter.span.end),
                );
                let child = Node::missing(delimiter.span.end);
                let span = Span::new(node.span.start, delimiter.span.end);
                Node::new(
                    span,
                    NK::ConstantPath { parent: Box::new(node), delimiter, child: Box::new(child) },
                )
            }
        }
    }

    /// `receiver[arguments]` through the `[]` call form.
    fn parse_index(&mut self, node: Node, token: Token) -> Node {
        use TokenKind::*;

        let opening = token;
        let mut list: Vec<Node> = Vec::new();

        while !matches!(self.current.kind, BracketRight | Eof) {
            if !list.is_empty() {
                self.expect(Comma, "Expected a separator for the elements in an index.");
            }

            let element = self.parse_expression(bp::DEFINED, "Expected an expression in the index.");
            let stop = element.is_missing();
            list.push(element);
            if stop {
                break;
            }
        }

        self.expect(BracketRight, "Expected a closing bracket for the index.");
        let closing = self.previous;

        let arguments = if list.is_empty() {
            None
        } else {
            let span = Span::new(
                list.first().map(|n| n.span.start).unwrap_or(opening.span.end),
                list.last().map(|n| n.span.end).unwrap_or(opening.span.end),
            );
            Some(Box::new(Node::new(span, NK::Arguments { arguments: list })))
        };

        let message = Token::not_provided(opening.span.start);
        let call_operator = Token::not_provided(opening.span.start);

        let span = Span::new(node.span.start, closing.span.end.max(opening.span.end));
        Node::new(
            span,
            NK::Call {
                receiver: Some(Box::new(node)),
                call_operator,
                message,
                opening,
                arguments,
                closing,
                name: b"[]".to_vec(),
            },
        )
    }
}
