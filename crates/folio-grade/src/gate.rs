//! Progression gating.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use folio_expr::{evaluate, parse, EvalContext, Expr};

use crate::GradeError;

/// Evaluates gate conditions against document state.
///
/// Gate sources are parsed once and cached by source string; parsing is pure,
/// so equal sources always yield the same AST.
#[derive(Default)]
pub struct Gate {
    parsed: RefCell<IndexMap<String, Rc<Expr>>>,
}

impl Gate {
    /// Create a gate with an empty parse cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a condition expression to a boolean.
    ///
    /// The result is the truthiness of the evaluated value, so conditions
    /// may be written directly against possibly-missing state
    /// (`@q.done && @q.score >= 0.5`).
    pub fn evaluate(&self, source: &str, ctx: &EvalContext) -> Result<bool, GradeError> {
        let expr = self.parse_cached(source)?;
        let value = evaluate(&expr, ctx)?;
        Ok(value.truthy())
    }

    /// Check a condition source for syntax errors without evaluating.
    pub fn check(&self, source: &str) -> Result<(), GradeError> {
        self.parse_cached(source).map(|_| ())
    }

    fn parse_cached(&self, source: &str) -> Result<Rc<Expr>, GradeError> {
        if let Some(expr) = self.parsed.borrow().get(source) {
            return Ok(expr.clone());
        }
        let expr = Rc::new(parse(source)?);
        self.parsed
            .borrow_mut()
            .insert(source.to_string(), expr.clone());
        Ok(expr)
    }
}
