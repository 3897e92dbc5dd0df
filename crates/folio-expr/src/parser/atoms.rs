//! Atomic expressions - literals, sigil references, identifiers, object
//! literals, template strings, parenthesized expressions.

use super::{ExpressionSyntaxError, TokenStream};
use crate::ast::{Expr, ExprKind, Namespace, Span, TemplatePart};
use crate::lexer::{self, Token};

/// Parse atomic expressions.
pub(super) fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();

    match stream.peek() {
        Some(Token::True) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Bool(true), stream.span_from(start)))
        }
        Some(Token::False) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Bool(false), stream.span_from(start)))
        }
        Some(Token::Null) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Null, stream.span_from(start)))
        }
        Some(Token::Number(_)) => {
            let span = stream.current_span();
            match stream.advance() {
                Some(Token::Number(n)) => {
                    let n = *n;
                    Ok(Expr::new(ExprKind::Number(n), stream.span_from(start)))
                }
                other => Err(ExpressionSyntaxError::unexpected_token(
                    other,
                    "where a number was expected",
                    span,
                )),
            }
        }
        Some(Token::Str(_)) => {
            let span = stream.current_span();
            match stream.advance() {
                Some(Token::Str(s)) => {
                    let s = s.clone();
                    Ok(Expr::new(ExprKind::Str(s), stream.span_from(start)))
                }
                other => Err(ExpressionSyntaxError::unexpected_token(
                    other,
                    "where a string literal was expected",
                    span,
                )),
            }
        }
        Some(Token::At) => parse_sigil_ref(stream, Namespace::State),
        Some(Token::Dollar) => parse_sigil_ref(stream, Namespace::Content),
        Some(Token::Amp) => parse_sigil_ref(stream, Namespace::Global),
        Some(Token::Template(_)) => parse_template(stream),
        Some(Token::LBrace) => parse_object_literal(stream),
        Some(Token::LParen) => parse_parenthesized(stream),
        Some(Token::Ident(_)) => {
            let span = stream.current_span();
            match stream.advance() {
                Some(Token::Ident(name)) => {
                    let name = name.clone();
                    Ok(Expr::new(ExprKind::Ident(name), stream.span_from(start)))
                }
                other => Err(ExpressionSyntaxError::unexpected_token(
                    other,
                    "where an identifier was expected",
                    span,
                )),
            }
        }
        other => Err(ExpressionSyntaxError::unexpected_token(
            other,
            "in expression",
            stream.current_span(),
        )),
    }
}

/// Parse a sigil reference: `@name`, `$name`, `&name`.
///
/// Dotted field access on the reference is handled by the postfix loop.
fn parse_sigil_ref(
    stream: &mut TokenStream,
    namespace: Namespace,
) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();
    stream.advance(); // consume the sigil

    let span = stream.current_span();
    let name = match stream.advance() {
        Some(Token::Ident(s)) => s.clone(),
        other => {
            return Err(ExpressionSyntaxError::unexpected_token(
                other,
                &format!("after '{}' sigil", namespace.sigil()),
                span,
            ));
        }
    };

    Ok(Expr::new(
        ExprKind::SigilRef { namespace, name },
        stream.span_from(start),
    ))
}

/// Parse a parenthesized expression: `(expr)`.
fn parse_parenthesized(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    stream.expect(Token::LParen)?;
    let expr = super::parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    Ok(expr)
}

/// Parse an object literal: `{ key: expr, ... }`.
///
/// Keys are identifiers or string literals. Used as option bags for
/// registered functions.
fn parse_object_literal(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;

    let mut entries = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        let span = stream.current_span();
        let key = match stream.advance() {
            Some(Token::Ident(s)) => s.clone(),
            Some(Token::Str(s)) => s.clone(),
            other => {
                return Err(ExpressionSyntaxError::unexpected_token(
                    other,
                    "where an object key was expected",
                    span,
                ));
            }
        };
        stream.expect(Token::Colon)?;
        let value = super::parse_expr(stream)?;
        entries.push((key, value));

        if !matches!(stream.peek(), Some(Token::RBrace)) {
            stream.expect(Token::Comma)?;
        }
    }

    stream.expect(Token::RBrace)?;
    Ok(Expr::new(ExprKind::Object(entries), stream.span_from(start)))
}

/// Parse a template string, sub-parsing each `${...}` hole.
fn parse_template(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();
    // Offset of the raw content in the enclosing source: the token span plus
    // the opening backtick.
    let content_base = stream
        .current_byte_range()
        .map(|r| r.start as u32 + 1)
        .unwrap_or(0);
    let span = stream.current_span();
    let raw = match stream.advance() {
        Some(Token::Template(s)) => s.clone(),
        other => {
            return Err(ExpressionSyntaxError::unexpected_token(
                other,
                "where a template string was expected",
                span,
            ));
        }
    };

    let parts = split_template(&raw, content_base)?;
    Ok(Expr::new(
        ExprKind::Template(parts),
        stream.span_from(start),
    ))
}

/// Split raw template content into text runs and parsed interpolation holes.
fn split_template(raw: &str, base: u32) -> Result<Vec<TemplatePart>, ExpressionSyntaxError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            // Escapes in text runs resolve here; holes keep theirs for the
            // sub-lexer.
            text.push_str(&raw[i..i + 2]);
            i += 2;
            continue;
        }
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            let hole_start = i + 2;
            let hole_end = find_hole_end(raw, hole_start).ok_or_else(|| {
                ExpressionSyntaxError::invalid_syntax(
                    "unterminated '${' interpolation in template string",
                    Span::new(base + i as u32, base + raw.len() as u32),
                )
            })?;

            if !text.is_empty() {
                parts.push(TemplatePart::Text(unescape_text(&text, base, i)?));
                text.clear();
            }

            let hole_src = &raw[hole_start..hole_end];
            let expr = parse_hole(hole_src, base + hole_start as u32)?;
            parts.push(TemplatePart::Hole(expr));

            i = hole_end + 1; // past the closing '}'
            continue;
        }
        let ch = raw[i..].chars().next().unwrap_or('\u{fffd}');
        text.push(ch);
        i += ch.len_utf8();
    }

    if !text.is_empty() {
        parts.push(TemplatePart::Text(unescape_text(&text, base, i)?));
    }

    Ok(parts)
}

/// Find the `}` closing an interpolation hole, honoring nested braces and
/// quoted strings inside the hole.
fn find_hole_end(raw: &str, from: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'"' | b'\'' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parse the expression inside one interpolation hole.
fn parse_hole(src: &str, base: u32) -> Result<Expr, ExpressionSyntaxError> {
    let tokens = lexer::tokenize(src).map_err(|range| {
        ExpressionSyntaxError::invalid_token(Span::new(
            base + range.start as u32,
            base + range.end as u32,
        ))
    })?;
    if tokens.is_empty() {
        return Err(ExpressionSyntaxError::invalid_syntax(
            "empty '${}' interpolation in template string",
            Span::new(base, base),
        ));
    }
    let mut stream = TokenStream::with_base(&tokens, base);
    let expr = super::parse_expr(&mut stream)?;
    if !stream.at_end() {
        return Err(ExpressionSyntaxError::unexpected_token(
            stream.peek(),
            "after interpolation expression",
            stream.current_span(),
        ));
    }
    Ok(expr)
}

/// Resolve escapes in a text run.
fn unescape_text(text: &str, base: u32, at: usize) -> Result<String, ExpressionSyntaxError> {
    lexer::unescape(text).ok_or_else(|| {
        ExpressionSyntaxError::invalid_syntax(
            "dangling escape in template string",
            Span::new(base + at as u32, base + at as u32),
        )
    })
}
