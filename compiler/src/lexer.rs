// Lexer for .stencil source files.
//
// Uses the `logos` crate for DFA-based lexing. Whitespace, newlines, and
// `#` line comments are insignificant; statements end with `;`.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Stencil token types.
///
/// Numbers are unsigned; a leading `-` is always the `Minus` operator so
/// that `x-1` lexes as three tokens. Identifiers carry no value; use the
/// span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("solution")]
    Solution,
    #[token("set")]
    Set,
    #[token("step")]
    Step,
    #[token("domain")]
    Domain,
    #[token("grid")]
    Grid,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("=")]
    Equals,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    // ── Literals ──
    /// Numeric literal (int, float, exponent).
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", parse_number)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", parse_number)]
    Number(f64),

    // ── Identifier ──
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Solution => write!(f, "solution"),
            Token::Set => write!(f, "set"),
            Token::Step => write!(f, "step"),
            Token::Domain => write!(f, "domain"),
            Token::Grid => write!(f, "grid"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Equals => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Number(v) => write!(f, "{v}"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_number(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex a stencil source string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords() {
        let tokens = lex_ok("solution set step domain grid");
        assert_eq!(
            tokens,
            vec![
                Token::Solution,
                Token::Set,
                Token::Step,
                Token::Domain,
                Token::Grid,
            ]
        );
    }

    #[test]
    fn keyword_prefix_is_ident() {
        assert_eq!(lex_ok("steps grid2"), vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn offsets_split_into_operator_and_number() {
        assert_eq!(
            lex_ok("x-1"),
            vec![Token::Ident, Token::Minus, Token::Number(1.0)]
        );
        assert_eq!(
            lex_ok("t+1"),
            vec![Token::Ident, Token::Plus, Token::Number(1.0)]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_ok("7 0.5 .25 1e-3 2.5E2"),
            vec![
                Token::Number(7.0),
                Token::Number(0.5),
                Token::Number(0.25),
                Token::Number(0.001),
                Token::Number(250.0),
            ]
        );
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        let tokens = lex_ok("# heading\nstep t; # trailing\n\n");
        assert_eq!(tokens, vec![Token::Step, Token::Ident, Token::Semi]);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("grid u;");
        assert_eq!(result.tokens[1].1, Span { start: 5, end: 6 });
    }

    #[test]
    fn bad_character_is_reported_and_skipped() {
        let result = lex("u @ v");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 2, end: 3 });
        assert_eq!(result.tokens.len(), 2);
    }
}
