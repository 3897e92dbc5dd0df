//! Lexical analysis for the condition/grading expression language.
//!
//! This module provides tokenization of expression source using logos.
//!
//! # Design
//!
//! - `Token` — all expression token types (sigils, operators, literals, identifiers)
//! - Sigils select a namespace: `@` scoped component state, `$` static content,
//!   `&` global variables
//! - Template strings are captured raw (backticks included stripped) and their
//!   `${...}` holes are sub-parsed by the parser
//!
//! # Examples
//!
//! ```
//! # use folio_expr::lexer::*;
//! # use logos::Logos;
//! let source = "@q.correct === correctness.correct";
//! let tokens: Vec<_> = Token::lexer(source).filter_map(Result::ok).collect();
//! assert_eq!(tokens.len(), 8);
//! ```

use logos::Logos;

/// Expression token.
///
/// Represents all lexical elements of the expression language: namespace
/// sigils, operators, delimiters, literals, and identifiers.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")] // Skip whitespace
pub enum Token {
    // === Sigils ===
    /// Sigil `@` (scoped component state namespace)
    #[token("@")]
    At,
    /// Sigil `$` (static content namespace)
    #[token("$")]
    Dollar,
    /// Sigil `&` (global variable namespace)
    #[token("&")]
    Amp,

    // === Operators ===

    // Arithmetic
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `%`
    #[token("%")]
    Percent,

    // Comparison
    /// Operator `===` (strict equality)
    #[token("===")]
    EqEqEq,
    /// Operator `!==` (strict inequality)
    #[token("!==")]
    BangEqEq,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,

    // Logic
    /// Operator `&&` (logical and)
    #[token("&&")]
    AndAnd,
    /// Operator `||` (logical or)
    #[token("||")]
    OrOr,
    /// Operator `!` (logical not)
    #[token("!")]
    Bang,

    // Ternary & arrows
    /// Operator `?`
    #[token("?")]
    Question,
    /// Operator `:`
    #[token(":")]
    Colon,
    /// Operator `=>` (arrow-function callback)
    #[token("=>")]
    FatArrow,

    // Other
    /// Operator `.`
    #[token(".")]
    Dot,
    /// Operator `,`
    #[token(",")]
    Comma,

    // === Delimiters ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `{`
    #[token("{")]
    LBrace,
    /// Delimiter `}`
    #[token("}")]
    RBrace,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,

    // === Keyword literals ===
    /// Boolean literal `true`
    #[token("true")]
    True,
    /// Boolean literal `false`
    #[token("false")]
    False,
    /// Literal `null`
    #[token("null")]
    Null,

    // === Literals ===
    /// Number literal (e.g., 42, 3.14, 5e-3)
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// String literal, double- or single-quoted (e.g., "hello", 'world')
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(strip_quotes(lex.slice())))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(strip_quotes(lex.slice())))]
    Str(String),

    /// Template string literal, backtick-quoted, captured raw.
    ///
    /// Interpolation holes (`${...}`) are split out and sub-parsed by the
    /// parser, so the lexer only needs to find the closing backtick.
    #[regex(r"`([^`\\]|\\.)*`", |lex| strip_quotes(lex.slice()).to_string())]
    Template(String),

    /// Identifier (e.g., correctness, wordCount, response)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Strip the surrounding quote characters from a quoted slice.
fn strip_quotes(s: &str) -> &str {
    &s[1..s.len() - 1]
}

/// Resolve backslash escapes in a string literal body.
pub(crate) fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '`' => out.push('`'),
            '$' => out.push('$'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Tokenize a source string, pairing each token with its byte span.
///
/// Lexing failures (characters outside the token set) are reported with the
/// span of the offending input so the parser can produce a located error.
pub fn tokenize(source: &str) -> Result<Vec<(Token, std::ops::Range<usize>)>, std::ops::Range<usize>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span()),
        }
    }
    Ok(tokens)
}
