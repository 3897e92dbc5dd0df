//! Token stream wrapper for the hand-written parser.

use crate::ast::Span;
use crate::lexer::Token;
use std::ops::Range;

/// Token stream with lookahead and position tracking.
///
/// Provides methods for consuming tokens, lookahead, and span tracking for
/// the recursive descent parser. Each token is paired with its byte span from
/// the source, enabling accurate error message locations.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    /// Offset added to every span; non-zero when sub-parsing a template hole.
    base: u32,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream from tokens with their byte spans.
    pub fn new(tokens: &'src [(Token, Range<usize>)]) -> Self {
        Self {
            tokens,
            pos: 0,
            base: 0,
        }
    }

    /// Create a stream whose spans are offset into an enclosing source.
    pub fn with_base(tokens: &'src [(Token, Range<usize>)], base: u32) -> Self {
        Self {
            tokens,
            pos: 0,
            base,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token discriminant.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Expect a specific token and advance if it matches.
    ///
    /// Returns an error if the token doesn't match.
    pub fn expect(&mut self, expected: Token) -> Result<Span, super::ExpressionSyntaxError> {
        if self.check(&expected) {
            let start = self.pos;
            self.advance();
            Ok(self.span_from(start))
        } else {
            Err(super::ExpressionSyntaxError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Create a span from a starting token position to the current position.
    ///
    /// Uses actual byte offsets from the source for accurate error locations.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .map(|(_, span)| span.start)
            .unwrap_or_else(|| self.tokens.last().map(|(_, s)| s.end).unwrap_or(0));

        let end_byte = if self.pos > 0 && self.pos <= self.tokens.len() {
            // Use the end of the last consumed token
            self.tokens
                .get(self.pos - 1)
                .map(|(_, span)| span.end)
                .unwrap_or(start_byte)
        } else {
            start_byte
        };

        Span::new(self.base + start_byte as u32, self.base + end_byte as u32)
    }

    /// Get a span for the current token.
    ///
    /// At EOF, points at the end of the last token.
    pub fn current_span(&self) -> Span {
        if let Some((_, span)) = self.tokens.get(self.pos) {
            Span::new(self.base + span.start as u32, self.base + span.end as u32)
        } else if let Some((_, span)) = self.tokens.last() {
            Span::new(self.base + span.end as u32, self.base + span.end as u32)
        } else {
            Span::new(self.base, self.base)
        }
    }

    /// Byte span of the current token in the enclosing source.
    pub fn current_byte_range(&self) -> Option<Range<usize>> {
        self.tokens.get(self.pos).map(|(_, span)| span.clone())
    }
}
