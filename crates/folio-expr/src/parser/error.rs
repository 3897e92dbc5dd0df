//! Parse error types.

use crate::ast::Span;
use crate::lexer::Token;
use std::fmt;

/// Expression syntax error with source location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionSyntaxError {
    /// Kind of syntax error
    pub kind: SyntaxErrorKind,
    /// Source location where the error occurred (byte offsets)
    pub span: Span,
    /// Human-readable error message
    pub message: String,
}

/// Category of syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// A character that is not part of any token.
    InvalidToken,

    /// Unexpected token encountered where a specific token was expected.
    UnexpectedToken,

    /// Unexpected end of input while parsing was incomplete.
    UnexpectedEof,

    /// Tokens are present but violate the expression grammar.
    InvalidSyntax,
}

impl ExpressionSyntaxError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: Token, found: Option<Token>, span: Span) -> Self {
        let message = match &found {
            Some(token) => format!("expected {:?}, found {:?}", expected, token),
            None => format!("expected {:?}, found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                SyntaxErrorKind::UnexpectedEof
            } else {
                SyntaxErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("unexpected {:?} {}", token, context),
            None => format!("unexpected end of input {}", context),
        };
        Self {
            kind: if found.is_none() {
                SyntaxErrorKind::UnexpectedEof
            } else {
                SyntaxErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::InvalidSyntax,
            span,
            message: message.into(),
        }
    }

    /// Create an "invalid token" error from a lexer failure.
    pub fn invalid_token(span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::InvalidToken,
            span,
            message: "character is not part of the expression language".to_string(),
        }
    }

    /// Byte offset where the error starts, for author-facing diagnostics.
    pub fn offset(&self) -> u32 {
        self.span.start
    }
}

impl fmt::Display for ExpressionSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl std::error::Error for ExpressionSyntaxError {}
