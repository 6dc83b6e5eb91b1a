//! Binary serialization of the syntax tree.
//!
//! Layout: a 4-byte magic, one byte each for the major/minor/patch version,
//! the node tree, and a terminating NUL. Each node is written as
//!
//! ```text
//! u8  kind
//! u64 payload length (bytes following this field that belong to the node)
//! u64 span start
//! u64 span end
//! …per-kind fields…
//! ```
//!
//! Tokens are `u8 kind, u64 start, u64 end`; lists are a `u64` count
//! followed by the elements; an optional child is a single `0` byte when
//! absent (node kind identifiers start at 1). Multi-byte integers use the
//! host byte order: the artifact is consumed in-process, not exchanged.

use crate::ast::{Node, NodeKind};
use crate::Parser;
use garnet_lex::Token;
use garnet_util::{Handler, Span};

const MAGIC: &[u8; 4] = b"YARP";
const VERSION_MAJOR: u8 = 0;
const VERSION_MINOR: u8 = 0;
const VERSION_PATCH: u8 = 3;

fn append_u64(buffer: &mut Vec<u8>, value: u64) {
    buffer.extend_from_slice(&value.to_ne_bytes());
}

fn append_token(buffer: &mut Vec<u8>, token: &Token) {
    buffer.push(token.kind as u8);
    append_u64(buffer, u64::from(token.span.start));
    append_u64(buffer, u64::from(token.span.end));
}

fn append_bytes(buffer: &mut Vec<u8>, bytes: &[u8]) {
    append_u64(buffer, bytes.len() as u64);
    buffer.extend_from_slice(bytes);
}

fn append_node_list(buffer: &mut Vec<u8>, nodes: &[Node]) {
    append_u64(buffer, nodes.len() as u64);
    for node in nodes {
        append_node(buffer, node);
    }
}

fn append_token_list(buffer: &mut Vec<u8>, tokens: &[Token]) {
    append_u64(buffer, tokens.len() as u64);
    for token in tokens {
        append_token(buffer, token);
    }
}

fn append_span_list(buffer: &mut Vec<u8>, spans: &[Span]) {
    append_u64(buffer, spans.len() as u64);
    for span in spans {
        append_u64(buffer, u64::from(span.start));
        append_u64(buffer, u64::from(span.end));
    }
}

fn append_optional_node(buffer: &mut Vec<u8>, node: &Option<Box<Node>>) {
    match node {
        Some(node) => append_node(buffer, node),
        None => buffer.push(0),
    }
}

fn append_node(buffer: &mut Vec<u8>, node: &Node) {
    use NodeKind::*;

    buffer.push(node.kind.id());

    // The payload length is patched in once the fields are written.
    let length_offset = buffer.len();
    append_u64(buffer, 0);

    append_u64(buffer, u64::from(node.span.start));
    append_u64(buffer, u64::from(node.span.end));

    match &node.kind {
        Alias { keyword, new_name, old_name } => {
            append_token(buffer, keyword);
            append_node(buffer, new_name);
            append_node(buffer, old_name);
        }
        And { left, operator, right } | Or { left, operator, right } => {
            append_node(buffer, left);
            append_token(buffer, operator);
            append_node(buffer, right);
        }
        Arguments { arguments } => append_node_list(buffer, arguments),
        Array { opening, elements, closing } | Hash { opening, elements, closing } => {
            append_token(buffer, opening);
            append_node_list(buffer, elements);
            append_token(buffer, closing);
        }
        Assoc { key, operator, value } => {
            append_node(buffer, key);
            append_token(buffer, operator);
            append_node(buffer, value);
        }
        AssocSplat { operator, value } => {
            append_token(buffer, operator);
            append_node(buffer, value);
        }
        Begin { begin_keyword, statements, rescue_clause, else_clause, ensure_clause, end_keyword } => {
            append_token(buffer, begin_keyword);
            append_node(buffer, statements);
            append_optional_node(buffer, rescue_clause);
            append_optional_node(buffer, else_clause);
            append_optional_node(buffer, ensure_clause);
            append_token(buffer, end_keyword);
        }
        BlockParameter { operator, name } | KeywordRestParameter { operator, name } | RestParameter { operator, name } => {
            append_token(buffer, operator);
            append_token(buffer, name);
        }
        Break { keyword, opening, arguments, closing }
        | Next { keyword, opening, arguments, closing }
        | Return { keyword, opening, arguments, closing }
        | Super { keyword, opening, arguments, closing }
        | Yield { keyword, opening, arguments, closing } => {
            append_token(buffer, keyword);
            append_token(buffer, opening);
            append_optional_node(buffer, arguments);
            append_token(buffer, closing);
        }
        Call { receiver, call_operator, message, opening, arguments, closing, name } => {
            append_optional_node(buffer, receiver);
            append_token(buffer, call_operator);
            append_token(buffer, message);
            append_token(buffer, opening);
            append_optional_node(buffer, arguments);
            append_token(buffer, closing);
            append_bytes(buffer, name);
        }
        Class { scope, class_keyword, name, inheritance_operator, superclass, statements, end_keyword } => {
            append_node(buffer, scope);
            append_token(buffer, class_keyword);
            append_node(buffer, name);
            append_token(buffer, inheritance_operator);
            append_optional_node(buffer, superclass);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        ClassVariableRead { name }
        | ConstantRead { name }
        | GlobalVariableRead { name }
        | InstanceVariableRead { name }
        | LocalVariableRead { name } => append_token(buffer, name),
        ClassVariableWrite { name, operator, value }
        | GlobalVariableWrite { name, operator, value }
        | InstanceVariableWrite { name, operator, value }
        | LocalVariableWrite { name, operator, value } => {
            append_token(buffer, name);
            append_token(buffer, operator);
            append_node(buffer, value);
        }
        ConstantPath { parent, delimiter, child } => {
            append_node(buffer, parent);
            append_token(buffer, delimiter);
            append_node(buffer, child);
        }
        ConstantPathWrite { target, operator, value }
        | OperatorAndAssignment { target, operator, value }
        | OperatorAssignment { target, operator, value }
        | OperatorOrAssignment { target, operator, value } => {
            append_node(buffer, target);
            append_token(buffer, operator);
            append_node(buffer, value);
        }
        Def { name, receiver, parameters, statements, scope, def_keyword, operator, lparen, rparen, equal, end_keyword } => {
            append_token(buffer, name);
            append_optional_node(buffer, receiver);
            append_node(buffer, parameters);
            append_node(buffer, statements);
            append_node(buffer, scope);
            append_token(buffer, def_keyword);
            append_token(buffer, operator);
            append_token(buffer, lparen);
            append_token(buffer, rparen);
            append_token(buffer, equal);
            append_token(buffer, end_keyword);
        }
        Defined { keyword, lparen, expression, rparen } => {
            append_token(buffer, keyword);
            append_token(buffer, lparen);
            append_node(buffer, expression);
            append_token(buffer, rparen);
        }
        Else { else_keyword, statements, end_keyword } => {
            append_token(buffer, else_keyword);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        Ensure { ensure_keyword, statements, end_keyword } => {
            append_token(buffer, ensure_keyword);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        False { keyword }
        | ForwardingSuper { keyword }
        | Nil { keyword }
        | Redo { keyword }
        | Retry { keyword }
        | SelfNode { keyword }
        | SourceEncoding { keyword }
        | SourceFile { keyword }
        | SourceLine { keyword }
        | True { keyword } => append_token(buffer, keyword),
        FloatLiteral { value }
        | ImaginaryLiteral { value }
        | IntegerLiteral { value }
        | RationalLiteral { value } => append_token(buffer, value),
        For { for_keyword, index, in_keyword, collection, do_keyword, statements, end_keyword } => {
            append_token(buffer, for_keyword);
            append_node(buffer, index);
            append_token(buffer, in_keyword);
            append_node(buffer, collection);
            append_token(buffer, do_keyword);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        ForwardingArguments { token } | ForwardingParameter { token } => append_token(buffer, token),
        If { keyword, predicate, statements, consequent, end_keyword }
        | Unless { keyword, predicate, statements, consequent, end_keyword } => {
            append_token(buffer, keyword);
            append_node(buffer, predicate);
            append_node(buffer, statements);
            append_optional_node(buffer, consequent);
            append_token(buffer, end_keyword);
        }
        InterpolatedString { opening, parts, closing }
        | InterpolatedSymbol { opening, parts, closing }
        | InterpolatedXString { opening, parts, closing } => {
            append_token(buffer, opening);
            append_node_list(buffer, parts);
            append_token(buffer, closing);
        }
        KeywordParameter { name } | RequiredParameter { name } => append_token(buffer, name),
        Missing => {}
        Module { scope, module_keyword, name, statements, end_keyword } => {
            append_node(buffer, scope);
            append_token(buffer, module_keyword);
            append_node(buffer, name);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        MultiTarget { targets } => append_node_list(buffer, targets),
        NoKeywordsParameter { operator, keyword } => {
            append_token(buffer, operator);
            append_token(buffer, keyword);
        }
        OptionalParameter { name, operator, value } => {
            append_token(buffer, name);
            append_token(buffer, operator);
            append_node(buffer, value);
        }
        Parameters { requireds, optionals, rest, keywords, keyword_rest, block } => {
            append_node_list(buffer, requireds);
            append_node_list(buffer, optionals);
            append_optional_node(buffer, rest);
            append_node_list(buffer, keywords);
            append_optional_node(buffer, keyword_rest);
            append_optional_node(buffer, block);
        }
        Parentheses { opening, statements, closing } => {
            append_token(buffer, opening);
            append_node(buffer, statements);
            append_token(buffer, closing);
        }
        PostExecution { keyword, opening, statements, closing }
        | PreExecution { keyword, opening, statements, closing } => {
            append_token(buffer, keyword);
            append_token(buffer, opening);
            append_node(buffer, statements);
            append_token(buffer, closing);
        }
        Program { scope, statements } => {
            append_node(buffer, scope);
            append_node(buffer, statements);
        }
        Range { left, operator, right } => {
            append_node(buffer, left);
            append_token(buffer, operator);
            append_node(buffer, right);
        }
        RegularExpression { opening, content, closing, named_captures } => {
            append_token(buffer, opening);
            append_token(buffer, content);
            append_token(buffer, closing);
            append_span_list(buffer, named_captures);
        }
        Rescue { keyword, exceptions, operator, exception_target, statements, consequent } => {
            append_token(buffer, keyword);
            append_node_list(buffer, exceptions);
            append_token(buffer, operator);
            append_optional_node(buffer, exception_target);
            append_node(buffer, statements);
            append_optional_node(buffer, consequent);
        }
        RescueModifier { expression, keyword, rescue_expression } => {
            append_node(buffer, expression);
            append_token(buffer, keyword);
            append_node(buffer, rescue_expression);
        }
        SClass { scope, class_keyword, operator, expression, statements, end_keyword } => {
            append_node(buffer, scope);
            append_token(buffer, class_keyword);
            append_token(buffer, operator);
            append_node(buffer, expression);
            append_node(buffer, statements);
            append_token(buffer, end_keyword);
        }
        Scope { locals } => append_token_list(buffer, locals),
        Statements { body } => append_node_list(buffer, body),
        Str { opening, content, closing, unescaped }
        | XString { opening, content, closing, unescaped } => {
            append_token(buffer, opening);
            append_token(buffer, content);
            append_token(buffer, closing);
            append_bytes(buffer, unescaped);
        }
        StringConcat { left, right } => {
            append_node(buffer, left);
            append_node(buffer, right);
        }
        StringInterpolated { opening, statements, closing } => {
            append_token(buffer, opening);
            append_node(buffer, statements);
            append_token(buffer, closing);
        }
        Symbol { opening, value, closing, unescaped } => {
            append_token(buffer, opening);
            append_token(buffer, value);
            append_token(buffer, closing);
            append_bytes(buffer, unescaped);
        }
        Ternary { predicate, question_mark, true_expression, colon, false_expression } => {
            append_node(buffer, predicate);
            append_token(buffer, question_mark);
            append_node(buffer, true_expression);
            append_token(buffer, colon);
            append_node(buffer, false_expression);
        }
        Undef { keyword, names } => {
            append_token(buffer, keyword);
            append_node_list(buffer, names);
        }
        Until { keyword, predicate, statements } | While { keyword, predicate, statements } => {
            append_token(buffer, keyword);
            append_node(buffer, predicate);
            append_node(buffer, statements);
        }
    }

    let payload = (buffer.len() - length_offset - 8) as u64;
    buffer[length_offset..length_offset + 8].copy_from_slice(&payload.to_ne_bytes());
}

/// Serializes a parsed tree into `buffer`: magic, version, nodes, NUL.
pub fn serialize(node: &Node, buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(MAGIC);
    buffer.push(VERSION_MAJOR);
    buffer.push(VERSION_MINOR);
    buffer.push(VERSION_PATCH);

    append_node(buffer, node);
    buffer.push(0);
}

/// Parses `source` and serializes the resulting tree into `buffer`.
/// Diagnostics are not part of the artifact; callers that need them parse
/// with their own [`Handler`].
pub fn parse_serialize(source: &[u8], buffer: &mut Vec<u8>) {
    let handler = Handler::new();
    let mut parser = Parser::new(source, &handler);
    let node = parser.parse();
    serialize(&node, buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of(buffer: &[u8]) -> (&[u8], u8, u8, u8) {
        (&buffer[0..4], buffer[4], buffer[5], buffer[6])
    }

    #[test]
    fn test_header_and_terminator() {
        let mut buffer = Vec::new();
        parse_serialize(b"1", &mut buffer);

        let (magic, major, minor, patch) = header_of(&buffer);
        assert_eq!(magic, MAGIC);
        assert_eq!((major, minor, patch), (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH));
        assert_eq!(*buffer.last().unwrap(), 0);
    }

    #[test]
    fn test_root_is_a_program_node() {
        let mut buffer = Vec::new();
        parse_serialize(b"1 + 2", &mut buffer);

        // Immediately after the 7-byte header comes the root node's kind.
        let handler = Handler::new();
        let mut parser = Parser::new(b"x", &handler);
        let program = parser.parse();
        assert_eq!(buffer[7], program.kind.id());
    }

    #[test]
    fn test_root_span_follows_length_field() {
        let source = b"1 + 2";
        let mut buffer = Vec::new();
        parse_serialize(source, &mut buffer);

        // header(7) + kind(1) + length(8) = 16; then span start and end.
        let start = u64::from_ne_bytes(buffer[16..24].try_into().unwrap());
        let end = u64::from_ne_bytes(buffer[24..32].try_into().unwrap());
        assert_eq!(start, 0);
        assert_eq!(end, source.len() as u64);
    }

    #[test]
    fn test_payload_length_covers_rest_of_root() {
        let mut buffer = Vec::new();
        parse_serialize(b"foo = [1, :two, \"three\"]", &mut buffer);

        let length = u64::from_ne_bytes(buffer[8..16].try_into().unwrap()) as usize;
        // Everything between the length field and the trailing NUL belongs
        // to the root node.
        assert_eq!(16 + length, buffer.len() - 1);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let source = b"def f(a, b = 1)\n a + b\nend\n";
        let mut first = Vec::new();
        let mut second = Vec::new();
        parse_serialize(source, &mut first);
        parse_serialize(source, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_broken_source_still_serializes() {
        let mut buffer = Vec::new();
        parse_serialize(b"a + ", &mut buffer);
        assert_eq!(&buffer[0..4], MAGIC);
        assert_eq!(*buffer.last().unwrap(), 0);
    }

    #[test]
    fn test_every_construct_serializes() {
        // One source file touching a broad slice of the node kinds; the
        // assertion is that serialization visits them without panicking and
        // produces a well-formed artifact.
        let source = br#"
module Outer
  class Inner < Base
    def self.make
      new
    end
    def <=>(other) = 0
    def []=(i, v)
      store.[]=(i, v)
    end
    def process(a, b = 1, *rest, key:, **opts, &blk)
      x = a + b
      y = x > 1 ? "big" : 'small'
      z = "interp #{x} done"
      list = [1, 2.5, 3r, 4i, :sym, %w[a b], %i[c d]]
      hash = { a: 1, :b => 2, **opts }
      regex = /(?<name>\d+)/
      begin
        yield(x)
      rescue Error => e
        retry
      ensure
        nil
      end
      result = x.method(y)[0] rescue nil
      self.value = result if result
      super()
    end
  end
end
BEGIN { 1 }
END { 2 }
alias new_name old_name
undef gone
for i in 1..3 do
  next if i == 2
end
defined?(Outer) and true or false
x = not true
"#;

        let mut buffer = Vec::new();
        parse_serialize(source, &mut buffer);

        assert_eq!(&buffer[0..4], MAGIC);
        assert_eq!(*buffer.last().unwrap(), 0);
        let length = u64::from_ne_bytes(buffer[8..16].try_into().unwrap()) as usize;
        assert_eq!(16 + length, buffer.len() - 1);
    }
}
