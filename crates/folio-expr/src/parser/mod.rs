//! Hand-written recursive descent parser for the expression language.
//!
//! # Architecture
//!
//! - `stream` — token stream with lookahead and span tracking
//! - `pratt` — precedence climbing for binary/unary operators, postfix chains
//! - `atoms` — literals, sigil references, object literals, template strings
//! - `error` — [`ExpressionSyntaxError`] with byte-offset spans
//!
//! The public surface is [`parse`] (error-carrying) and [`try_parse`]
//! (validation-time, `None` on any failure).

mod atoms;
mod error;
mod pratt;
mod stream;

pub use error::{ExpressionSyntaxError, SyntaxErrorKind};
pub use stream::TokenStream;

use crate::ast::{Expr, ExprKind, Span};
use crate::lexer::{self, Token};

/// Parse an expression source string into an AST.
///
/// Fails with [`ExpressionSyntaxError`] (including a byte offset) on
/// malformed input, including trailing tokens after a complete expression.
pub fn parse(source: &str) -> Result<Expr, ExpressionSyntaxError> {
    let tokens = lexer::tokenize(source).map_err(|range| {
        ExpressionSyntaxError::invalid_token(Span::new(range.start as u32, range.end as u32))
    })?;

    if tokens.is_empty() {
        return Err(ExpressionSyntaxError::invalid_syntax(
            "empty expression",
            Span::new(0, 0),
        ));
    }

    let mut stream = TokenStream::new(&tokens);
    let expr = parse_expr(&mut stream)?;

    if !stream.at_end() {
        return Err(ExpressionSyntaxError::unexpected_token(
            stream.peek(),
            "after expression",
            stream.current_span(),
        ));
    }

    Ok(expr)
}

/// Non-throwing variant of [`parse`] for validation passes that want to
/// report many errors without aborting.
pub fn try_parse(source: &str) -> Option<Expr> {
    parse(source).ok()
}

/// Parse one expression, including the ternary layer.
///
/// Ternaries bind loosest and associate to the right:
/// `a ? b : c ? d : e` is `a ? b : (c ? d : e)`.
pub(crate) fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ExpressionSyntaxError> {
    let cond = pratt::parse_pratt(stream, 0)?;

    if matches!(stream.peek(), Some(Token::Question)) {
        stream.advance();
        let then_branch = parse_expr(stream)?;
        stream.expect(Token::Colon)?;
        let else_branch = parse_expr(stream)?;
        let span = Span::merge(cond.span, else_branch.span);
        return Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ));
    }

    Ok(cond)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Namespace, TemplatePart, UnaryOp};

    fn parse_ok(source: &str) -> Expr {
        parse(source).unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"))
    }

    #[test]
    fn test_sigil_with_member_access() {
        let expr = parse_ok("@q.correct");
        let ExprKind::Member { object, field } = &expr.kind else {
            panic!("expected member access, got {:?}", expr.kind);
        };
        assert_eq!(field, "correct");
        assert_eq!(
            object.kind,
            ExprKind::SigilRef {
                namespace: Namespace::State,
                name: "q".into()
            }
        );
    }

    #[test]
    fn test_strict_equality_parses() {
        let expr = parse_ok("@q.correct === correctness.correct");
        let ExprKind::Binary { op, .. } = &expr.kind else {
            panic!("expected binary, got {:?}", expr.kind);
        };
        assert_eq!(*op, BinaryOp::StrictEq);
    }

    #[test]
    fn test_precedence_and_over_or() {
        // a || b && c parses as a || (b && c)
        let expr = parse_ok("a || b && c");
        let ExprKind::Binary { op, right, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_arithmetic_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_ok("1 + 2 * 3");
        let ExprKind::Binary { op, right, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_unary_not() {
        let expr = parse_ok("!@q.done");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
    }

    #[test]
    fn test_ternary_right_associative() {
        let expr = parse_ok("a ? 1 : b ? 2 : 3");
        let ExprKind::Ternary { else_branch, .. } = &expr.kind else {
            panic!("expected ternary");
        };
        assert!(matches!(else_branch.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn test_method_call_with_arrow() {
        let expr = parse_ok("@items.every(k => k.done)");
        let ExprKind::MethodCall { method, args, .. } = &expr.kind else {
            panic!("expected method call, got {:?}", expr.kind);
        };
        assert_eq!(method, "every");
        assert_eq!(args.len(), 1);
        let ExprKind::Arrow { param, .. } = &args[0].kind else {
            panic!("expected arrow argument");
        };
        assert_eq!(param, "k");
    }

    #[test]
    fn test_function_call_with_object_bag() {
        let expr = parse_ok("wordCount($essay.text, { trim: true })");
        let ExprKind::Call { name, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(name, "wordCount");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].kind, ExprKind::Object(_)));
    }

    #[test]
    fn test_template_parts() {
        let expr = parse_ok("`score: ${@q.score} of ${total}`");
        let ExprKind::Template(parts) = &expr.kind else {
            panic!("expected template");
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "score: "));
        assert!(matches!(&parts[1], TemplatePart::Hole(_)));
        assert!(matches!(&parts[2], TemplatePart::Text(t) if t == " of "));
        assert!(matches!(&parts[3], TemplatePart::Hole(_)));
    }

    #[test]
    fn test_error_offset() {
        let err = parse("@q.correct ===").expect_err("dangling operator");
        assert!(err.offset() >= 11, "offset points at the gap: {err}");
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("1 + 2 3").is_err());
    }

    #[test]
    fn test_empty_expression_rejected() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn test_try_parse_matches_parse() {
        assert!(try_parse("@q.done && &threshold <= 3").is_some());
        assert!(try_parse("@q.done &&").is_none());
    }

    #[test]
    fn test_dynamic_call_rejected() {
        assert!(parse("1(2)").is_err());
        assert!(parse("(1 + 2)(3)").is_err());
    }
}
