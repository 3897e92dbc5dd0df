//! # Folio expression language
//!
//! The small expression language used by interactive documents to gate
//! progression and grade answers against scoped component state.
//!
//! ## Architecture
//!
//! ```text
//! lexer   - tokenization (logos)
//! ast     - untyped expressions with byte spans
//! parser  - hand-written recursive descent / Pratt parser
//! eval    - tree-walking evaluator over an injected context
//! ```
//!
//! Expressions read three sigil-selected namespaces: `@name` for scoped
//! component state, `$name` for static content, `&name` for global
//! variables. Bare identifiers resolve to built-in status enumerations
//! (`correctness.*`, `progress.*`), the numeric namespace (`math.*`), or
//! caller bindings. Named functions come from an injected
//! [`FunctionRegistry`]; there is no global registration state, so
//! independent documents and tests never cross-contaminate.
//!
//! ## Usage
//!
//! ```
//! use folio_expr::{create_context, evaluate, parse, ContextSeed, Value};
//! use indexmap::IndexMap;
//!
//! let expr = parse("@q.correct === correctness.correct").unwrap();
//!
//! let mut q = IndexMap::new();
//! q.insert("correct".to_string(), Value::Str("correct".to_string()));
//! let mut state = IndexMap::new();
//! state.insert("q".to_string(), Value::Object(q));
//!
//! let ctx = create_context(ContextSeed {
//!     component_state: Some(state),
//!     ..Default::default()
//! });
//! assert_eq!(evaluate(&expr, &ctx), Ok(Value::Bool(true)));
//! ```

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, ExprKind, Namespace, Span, TemplatePart, UnaryOp};
pub use eval::{
    create_context, evaluate, Arity, ContextSeed, EvalContext, EvalError, FunctionDescriptor,
    FunctionRegistry, NativeFn, Value,
};
pub use parser::{parse, try_parse, ExpressionSyntaxError, SyntaxErrorKind};
