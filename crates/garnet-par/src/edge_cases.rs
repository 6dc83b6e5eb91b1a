//! End-to-end scenarios and whole-tree invariants.
//!
//! The focused unit tests live next to the code; this module drives the
//! parser over complete sources and checks the properties that must hold
//! for the output as a whole: span sanity, recovery convergence, lex-mode
//! stack discipline, and the structure of the headline examples.

use crate::ast::NodeKind as NK;
use crate::{Node, Parser};
use garnet_lex::encoding::{self, Encoding};
use garnet_util::Handler;
use proptest::prelude::*;

fn parse(source: &[u8]) -> (Node, Vec<garnet_util::Diagnostic>) {
    let handler = Handler::new();
    let mut parser = Parser::new(source, &handler);
    let node = parser.parse();
    (node, handler.diagnostics())
}

fn statements(root: Node) -> Vec<Node> {
    match root.kind {
        NK::Program { statements, .. } => match statements.kind {
            NK::Statements { body } => body,
            other => panic!("expected statements, got {:?}", other),
        },
        other => panic!("expected program, got {:?}", other),
    }
}

/// Asserts the span invariants: ordered bounds, within the source, children
/// covered by their parents.
fn check_spans(node: &Node, source_len: u32) {
    assert!(node.span.start <= node.span.end, "inverted span {:?}", node.span);
    assert!(node.span.end <= source_len, "span {:?} outside source of {}", node.span, source_len);

    for child in node.children() {
        assert!(
            node.span.start <= child.span.start && child.span.end <= node.span.end,
            "child span {:?} escapes parent {:?} ({:?})",
            child.span,
            node.span,
            child.kind
        );
        check_spans(child, source_len);
    }
}

// =========================================================================
// The end-to-end scenarios
// =========================================================================

#[test]
fn test_scenario_binary_addition() {
    let (root, diagnostics) = parse(b"1 + 2");
    assert!(diagnostics.is_empty());

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::Call { receiver, arguments, name, .. } => {
            assert_eq!(name, b"+");
            assert!(matches!(receiver.unwrap().kind, NK::IntegerLiteral { .. }));
            match arguments.unwrap().kind {
                NK::Arguments { arguments } => {
                    assert_eq!(arguments.len(), 1);
                    assert!(matches!(arguments[0].kind, NK::IntegerLiteral { .. }));
                }
                other => panic!("expected arguments, got {:?}", other),
            }
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn test_scenario_local_variable_read_after_write() {
    let (root, diagnostics) = parse(b"foo = 1\nfoo");
    assert!(diagnostics.is_empty());

    let body = statements(root);
    assert_eq!(body.len(), 2);
    assert!(matches!(body[0].kind, NK::LocalVariableWrite { .. }));
    // The second foo must be a read, not a call.
    assert!(matches!(body[1].kind, NK::LocalVariableRead { .. }));
}

#[test]
fn test_scenario_interpolated_string() {
    let (root, diagnostics) = parse(b"\"a#{1+2}b\"");
    assert!(diagnostics.is_empty());

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::InterpolatedString { parts, .. } => {
            assert_eq!(parts.len(), 3);
            match &parts[0].kind {
                NK::Str { unescaped, .. } => assert_eq!(unescaped, b"a"),
                other => panic!("expected string part, got {:?}", other),
            }
            match &parts[1].kind {
                NK::StringInterpolated { statements, .. } => match &statements.kind {
                    NK::Statements { body } => {
                        assert_eq!(body.len(), 1);
                        match &body[0].kind {
                            NK::Call { name, .. } => assert_eq!(name, b"+"),
                            other => panic!("expected call, got {:?}", other),
                        }
                    }
                    other => panic!("expected statements, got {:?}", other),
                },
                other => panic!("expected interpolation part, got {:?}", other),
            }
            match &parts[2].kind {
                NK::Str { unescaped, .. } => assert_eq!(unescaped, b"b"),
                other => panic!("expected string part, got {:?}", other),
            }
        }
        other => panic!("expected interpolated string, got {:?}", other),
    }
}

#[test]
fn test_scenario_interpolated_symbol() {
    let (root, diagnostics) = parse(b":\"x#{y}\"");
    assert!(diagnostics.is_empty());

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::InterpolatedSymbol { parts, .. } => {
            assert_eq!(parts.len(), 2);
            match &parts[0].kind {
                NK::Str { unescaped, .. } => assert_eq!(unescaped, b"x"),
                other => panic!("expected string part, got {:?}", other),
            }
            match &parts[1].kind {
                NK::StringInterpolated { statements, .. } => match &statements.kind {
                    NK::Statements { body } => match &body[0].kind {
                        NK::Call { name, .. } => assert_eq!(name, b"y"),
                        other => panic!("expected call, got {:?}", other),
                    },
                    other => panic!("expected statements, got {:?}", other),
                },
                other => panic!("expected interpolation part, got {:?}", other),
            }
        }
        other => panic!("expected interpolated symbol, got {:?}", other),
    }
}

#[test]
fn test_scenario_elsif_chain() {
    let (root, diagnostics) = parse(b"if x\n 1\nelsif y\n 2\nelse\n 3\nend");
    assert!(diagnostics.is_empty());

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::If { statements: if_statements, consequent, .. } => {
            match if_statements.kind {
                NK::Statements { body } => assert!(matches!(body[0].kind, NK::IntegerLiteral { .. })),
                other => panic!("expected statements, got {:?}", other),
            }

            // The elsif is the consequent of the if.
            match consequent.expect("elsif clause").kind {
                NK::If { statements: elsif_statements, consequent, .. } => {
                    match elsif_statements.kind {
                        NK::Statements { body } => {
                            assert!(matches!(body[0].kind, NK::IntegerLiteral { .. }))
                        }
                        other => panic!("expected statements, got {:?}", other),
                    }

                    // And the else is the consequent of the elsif.
                    match consequent.expect("else clause").kind {
                        NK::Else { statements: else_statements, .. } => match else_statements.kind {
                            NK::Statements { body } => {
                                assert!(matches!(body[0].kind, NK::IntegerLiteral { .. }))
                            }
                            other => panic!("expected statements, got {:?}", other),
                        },
                        other => panic!("expected else, got {:?}", other),
                    }
                }
                other => panic!("expected elsif, got {:?}", other),
            }
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_scenario_regexp_named_captures() {
    let source = b"/(?<n>a)(?<m>b)/";
    let (root, diagnostics) = parse(source);
    assert!(diagnostics.is_empty());

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::RegularExpression { named_captures, .. } => {
            let names: Vec<&[u8]> = named_captures.iter().map(|span| span.text(source)).collect();
            assert_eq!(names, vec![b"n".as_slice(), b"m".as_slice()]);
        }
        other => panic!("expected regexp, got {:?}", other),
    }
}

#[test]
fn test_scenario_trailing_operator_recovers() {
    let (root, diagnostics) = parse(b"a + ");
    assert_eq!(diagnostics.len(), 1, "diagnostics: {:?}", diagnostics);

    let mut body = statements(root);
    match body.remove(0).kind {
        NK::Call { receiver, arguments, name, .. } => {
            assert_eq!(name, b"+");
            assert!(receiver.is_some());
            match arguments.unwrap().kind {
                NK::Arguments { arguments } => {
                    assert_eq!(arguments.len(), 1);
                    assert!(arguments[0].is_missing());
                }
                other => panic!("expected arguments, got {:?}", other),
            }
        }
        other => panic!("expected call, got {:?}", other),
    }
}

// =========================================================================
// Recovery
// =========================================================================

#[test]
fn test_missing_end_recovers_with_diagnostic() {
    let (root, diagnostics) = parse(b"def foo\n 1\n");
    assert!(!diagnostics.is_empty());
    let body = statements(root);
    assert!(matches!(body[0].kind, NK::Def { .. }));
}

#[test]
fn test_unexpected_token_in_prefix_position() {
    let (root, diagnostics) = parse(b"1 + * 2");
    assert!(!diagnostics.is_empty());
    let body = statements(root);
    assert!(!body.is_empty());
}

#[test]
fn test_invalid_assignment_target() {
    let (_, diagnostics) = parse(b"1 = 2");
    assert!(diagnostics.iter().any(|d| d.message.contains("Unexpected `='")));
}

#[test]
fn test_error_inside_nested_context_does_not_cascade() {
    // One broken expression inside the method; the class and def still
    // close properly.
    let (root, diagnostics) = parse(b"class Foo\n def bar\n x = \n end\nend\n");
    assert!(!diagnostics.is_empty());
    let body = statements(root);
    assert!(matches!(body[0].kind, NK::Class { .. }));
}

#[test]
fn test_ternary_recovery_synthesizes_branches() {
    let (root, diagnostics) = parse(b"a ? ");
    assert!(!diagnostics.is_empty());
    let mut body = statements(root);
    match body.remove(0).kind {
        NK::Ternary { true_expression, false_expression, .. } => {
            assert!(true_expression.is_missing());
            assert!(false_expression.is_missing());
        }
        other => panic!("expected ternary, got {:?}", other),
    }
}

#[test]
fn test_unterminated_string_recovers() {
    let (_, diagnostics) = parse(b"x = \"abc");
    assert!(!diagnostics.is_empty());
}

// =========================================================================
// Whole-tree invariants
// =========================================================================

const INVARIANT_SOURCES: &[&[u8]] = &[
    b"",
    b"1 + 2 * 3",
    b"foo = 1\nbar = foo\nbar",
    b"\"a#{1+2}b\"",
    b"if a\n b\nelsif c\n d\nelse\n e\nend",
    b"def f(a, b = 1, *rest, key:, **opts, &blk)\n a + b\nend",
    b"def self.build\n new\nend",
    b"def <=>(other)\n 0\nend",
    b"def []=(i, v)\n v\nend",
    b"x.[]=(0, x.[](1))",
    b"class Foo < Bar\n def baz\n  @x = 1\n end\nend",
    b"module M\n class << self\n  1\n end\nend",
    b"begin\n 1\nrescue A => e\n 2\nelse\n 3\nensure\n 4\nend",
    b"%w[a b c]",
    b"%I[a#{b} c]",
    b"{ a: 1, :b => 2, **splat }",
    b"for a, b in list do\n a\nend",
    b"x[1] = x[0] + 1",
    b"alias a b\nundef c, :d",
    b"a + ",
    b"def broken\n x = \n",
    b"1 = 2",
    b"(((",
    b"class\nend",
];

#[test]
fn test_span_invariants() {
    for source in INVARIANT_SOURCES {
        let (root, _) = parse(source);
        check_spans(&root, source.len() as u32);
    }
}

#[test]
fn test_lex_mode_stack_discipline() {
    for source in INVARIANT_SOURCES {
        let handler = Handler::new();
        let mut parser = Parser::new(source, &handler);
        parser.parse();
        assert_eq!(parser.lex_mode_depth(), 1, "stack not restored for {:?}", source);
    }
}

#[test]
fn test_parse_always_returns_a_program() {
    for source in INVARIANT_SOURCES {
        let (root, _) = parse(source);
        assert!(matches!(root.kind, NK::Program { .. }));
    }
}

// =========================================================================
// Encoding callback
// =========================================================================

fn resolve_custom(name: &[u8]) -> Option<Encoding> {
    if name == b"custom" {
        encoding::lookup(b"iso-8859-9")
    } else {
        None
    }
}

#[test]
fn test_encoding_callback_is_idempotent() {
    let source = b"# encoding: custom\nfoo = 1\nfoo\n";

    let run = || {
        let handler = Handler::new();
        let mut parser = Parser::new(source, &handler);
        parser.register_encoding_decode_callback(resolve_custom);
        let root = parser.parse();
        (format!("{:?}", root), handler.diagnostics().len())
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first.1, 0);
}

#[test]
fn test_unknown_encoding_without_callback_is_diagnosed() {
    let (_, diagnostics) = parse(b"# encoding: custom\n1\n");
    assert_eq!(diagnostics.len(), 1);
}

// =========================================================================
// Properties
// =========================================================================

proptest! {
    /// Parsing terminates and yields a Program for arbitrary bytes.
    #[test]
    fn prop_recovery_convergence(source in proptest::collection::vec(any::<u8>(), 0..200)) {
        let handler = Handler::new();
        let mut parser = Parser::new(&source, &handler);
        let root = parser.parse();
        let is_program = matches!(root.kind, NK::Program { .. });
        prop_assert!(is_program);
    }

    /// Span invariants hold on arbitrary printable input, valid or not.
    #[test]
    fn prop_span_invariants_on_ascii(source in "[ -~\n]{0,120}") {
        let bytes = source.as_bytes();
        let (root, _) = parse(bytes);
        check_spans(&root, bytes.len() as u32);
    }
}
