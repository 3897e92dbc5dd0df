//! # Folio grading and gating
//!
//! The consumer layer over the identifier resolver and the expression
//! language: it resolves target references to scoped state and evaluates
//! expressions or registered predicates against that state.
//!
//! Two surfaces:
//!
//! - [`Gate`] — "may the learner proceed?": parses a condition expression
//!   (cached per source string, since parsing is pure), evaluates it against
//!   a context, and coerces the result to a boolean.
//! - [`Grader`] — "is this answer correct?": resolves the target reference
//!   under the current scope, reads the response state from the reactive
//!   store, and applies either a registered predicate or a grading
//!   expression whose `@` namespace is seeded from the target's state.

mod gate;
mod grader;

pub use gate::Gate;
pub use grader::{
    Grader, GradeSpec, Outcome, PredicateDescriptor, PredicateFn, PredicateRegistry,
    ResponseState, Verdict,
};

use thiserror::Error;

/// Errors from gating and grading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    /// The target reference string was malformed or unsupported.
    #[error(transparent)]
    Reference(#[from] folio_runtime::Error),

    /// The condition/grading expression failed to parse.
    #[error(transparent)]
    Syntax(#[from] folio_expr::ExpressionSyntaxError),

    /// The condition/grading expression failed to evaluate.
    #[error(transparent)]
    Eval(#[from] folio_expr::EvalError),

    /// No predicate registered under the requested name.
    #[error("unknown predicate '{name}'")]
    UnknownPredicate {
        /// The unresolved name
        name: String,
    },

    /// The target instance has no recorded state to grade.
    #[error("no state recorded for '{key}'")]
    MissingState {
        /// The scoped state key that was empty
        key: String,
    },
}
