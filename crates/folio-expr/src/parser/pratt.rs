//! Pratt parser core - precedence climbing for binary and unary operators.

use super::{atoms, ExpressionSyntaxError, TokenStream};
use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::lexer::Token;

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
}

/// Get binary operator metadata (precedence, associativity, and operator enum).
///
/// Returns (precedence, associativity, op) where higher precedence = tighter
/// binding. This is the single source of truth for binary operator parsing.
fn binary_op_info(token: &Token) -> Option<(u8, Assoc, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, Assoc::Left, BinaryOp::Or)),
        Token::AndAnd => Some((20, Assoc::Left, BinaryOp::And)),
        Token::EqEq => Some((30, Assoc::Left, BinaryOp::Eq)),
        Token::BangEq => Some((30, Assoc::Left, BinaryOp::Ne)),
        Token::EqEqEq => Some((30, Assoc::Left, BinaryOp::StrictEq)),
        Token::BangEqEq => Some((30, Assoc::Left, BinaryOp::StrictNe)),
        Token::Lt => Some((35, Assoc::Left, BinaryOp::Lt)),
        Token::LtEq => Some((35, Assoc::Left, BinaryOp::Le)),
        Token::Gt => Some((35, Assoc::Left, BinaryOp::Gt)),
        Token::GtEq => Some((35, Assoc::Left, BinaryOp::Ge)),
        Token::Plus => Some((40, Assoc::Left, BinaryOp::Add)),
        Token::Minus => Some((40, Assoc::Left, BinaryOp::Sub)),
        Token::Star => Some((50, Assoc::Left, BinaryOp::Mul)),
        Token::Slash => Some((50, Assoc::Left, BinaryOp::Div)),
        Token::Percent => Some((50, Assoc::Left, BinaryOp::Mod)),
        _ => None,
    }
}

/// Pratt parser - handles binary operators with precedence climbing.
pub(super) fn parse_pratt(
    stream: &mut TokenStream,
    min_prec: u8,
) -> Result<Expr, ExpressionSyntaxError> {
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        if let Some((prec, assoc, op)) = binary_op_info(token) {
            if prec < min_prec {
                break;
            }

            stream.advance();

            let next_prec = match assoc {
                Assoc::Left => prec + 1,
            };
            let right = parse_pratt(stream, next_prec)?;

            let span = crate::ast::Span::merge(left.span, right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        } else {
            break;
        }
    }

    Ok(left)
}

/// Parse prefix expressions (unary operators, then postfix chains).
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    match stream.peek() {
        Some(Token::Minus) | Some(Token::Bang) => parse_unary(stream),
        _ => parse_postfix(stream),
    }
}

/// Parse unary operators.
fn parse_unary(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();
    let span = stream.current_span();
    let op = match stream.advance() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Bang) => UnaryOp::Not,
        other => {
            return Err(ExpressionSyntaxError::unexpected_token(
                other,
                "where a unary operator was expected",
                span,
            ));
        }
    };

    let operand = parse_prefix(stream)?;
    let span = stream.span_from(start);

    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    ))
}

/// Parse postfix expressions (member access, function calls, method calls).
fn parse_postfix(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let start = stream.current_pos();
    let mut expr = atoms::parse_atom(stream)?;

    loop {
        match stream.peek() {
            Some(Token::Dot) => {
                stream.advance();
                let span = stream.current_span();
                let field = match stream.advance() {
                    Some(Token::Ident(s)) => s.clone(),
                    other => {
                        return Err(ExpressionSyntaxError::unexpected_token(
                            other,
                            "after '.'",
                            span,
                        ));
                    }
                };

                if matches!(stream.peek(), Some(Token::LParen)) {
                    // Method call: obj.method(args)
                    let args = parse_call_args(stream)?;
                    let span = stream.span_from(start);
                    expr = Expr::new(
                        ExprKind::MethodCall {
                            object: Box::new(expr),
                            method: field,
                            args,
                        },
                        span,
                    );
                } else {
                    // Regular field access
                    let span = stream.span_from(start);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
            }
            Some(Token::LParen) => {
                // Only named functions are callable; there is no dynamic
                // dispatch on computed values.
                let name = match &expr.kind {
                    ExprKind::Ident(name) => name.clone(),
                    _ => {
                        return Err(ExpressionSyntaxError::invalid_syntax(
                            "only named functions can be called",
                            stream.current_span(),
                        ));
                    }
                };
                let args = parse_call_args(stream)?;
                let span = stream.span_from(start);
                expr = Expr::new(ExprKind::Call { name, args }, span);
            }
            _ => break,
        }
    }

    Ok(expr)
}

/// Parse function call arguments.
///
/// Arrow-function callbacks (`x => body`) are accepted only here, so arrows
/// never leak into value position.
fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ExpressionSyntaxError> {
    stream.expect(Token::LParen)?;

    let mut args = Vec::new();
    while !matches!(stream.peek(), Some(Token::RParen)) {
        args.push(parse_arg(stream)?);

        if !matches!(stream.peek(), Some(Token::RParen)) {
            stream.expect(Token::Comma)?;
        }
    }

    stream.expect(Token::RParen)?;
    Ok(args)
}

/// Parse a single call argument: an arrow callback or an ordinary expression.
fn parse_arg(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    if let (Some(Token::Ident(_)), Some(Token::FatArrow)) = (stream.peek(), stream.peek_nth(1)) {
        let start = stream.current_pos();
        let param = match stream.advance() {
            Some(Token::Ident(s)) => s.clone(),
            _ => unreachable!("peeked Ident above"),
        };
        stream.expect(Token::FatArrow)?;
        let body = super::parse_expr(stream)?;
        let span = stream.span_from(start);
        return Ok(Expr::new(
            ExprKind::Arrow {
                param,
                body: Box::new(body),
            },
            span,
        ));
    }
    super::parse_expr(stream)
}
