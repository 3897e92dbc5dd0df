//! Tree-walking evaluator for the expression language.
//!
//! `evaluate` is a pure function of the AST and the context. Missing sigil
//! references evaluate to `undefined` so conditions can be written
//! defensively; calling an unregistered function is a programmer error and
//! fails fast.

mod context;
mod functions;
mod namespaces;
mod value;

pub use context::{create_context, ContextSeed, EvalContext};
pub use functions::{Arity, FunctionDescriptor, FunctionRegistry, NativeFn};
pub use value::Value;

use crate::ast::{BinaryOp, Expr, ExprKind, Namespace, TemplatePart, UnaryOp};
use thiserror::Error;

/// Evaluation errors.
///
/// Structural absences (missing state, unknown fields) evaluate to
/// `undefined` instead of erroring; these variants are reserved for genuine
/// misuse that authors need to hear about directly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Call to a function name absent from the injected registry.
    #[error("unknown function '{name}'")]
    UnknownFunction {
        /// The unresolved name
        name: String,
    },

    /// Wrong number of arguments for a registered function.
    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Expected arity description
        expected: String,
        /// Actual argument count
        got: usize,
    },

    /// Method call on `undefined` or `null`.
    #[error("cannot call .{method}() on {receiver}: the value is undefined or null")]
    NullishMethodCall {
        /// Method name
        method: String,
        /// Source-shaped description of the receiver (e.g. `@items`)
        receiver: String,
    },

    /// Method name not supported for the receiver's type.
    #[error("unknown method .{method}() for {kind} values")]
    UnknownMethod {
        /// Method name
        method: String,
        /// Receiver type name
        kind: &'static str,
    },

    /// Operand or argument of the wrong type.
    #[error("{context}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Where the mismatch occurred
        context: String,
        /// Expected type
        expected: &'static str,
        /// Actual type
        got: &'static str,
    },

    /// Arrow callback used outside a method-argument position.
    #[error("arrow callbacks are only valid as arguments to every/some/filter")]
    ArrowOutsideCallback,
}

/// Evaluate an expression against a context.
///
/// Pure in both inputs: equal expression and context always produce equal
/// results.
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Result<Value, EvalError> {
    let mut evaluator = Evaluator {
        ctx,
        locals: Vec::new(),
    };
    evaluator.eval(expr)
}

struct Evaluator<'c> {
    ctx: &'c EvalContext,
    /// Arrow-parameter bindings, innermost last.
    locals: Vec<(String, Value)>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),

            ExprKind::SigilRef { namespace, name } => Ok(self.sigil_ref(*namespace, name)),

            ExprKind::Ident(name) => Ok(self.ident(name)),

            ExprKind::Binary { op, left, right } => self.binary(*op, left, right),

            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value.as_number() {
                        Some(n) => Ok(Value::Number(-n)),
                        None => Err(EvalError::TypeMismatch {
                            context: "unary '-'".to_string(),
                            expected: "number",
                            got: value.kind(),
                        }),
                    },
                }
            }

            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }

            ExprKind::Member { object, field } => {
                let value = self.eval(object)?;
                Ok(member(&value, field))
            }

            ExprKind::Call { name, args } => self.call(name, args),

            ExprKind::MethodCall {
                object,
                method,
                args,
            } => self.method_call(object, method, args),

            ExprKind::Arrow { .. } => Err(EvalError::ArrowOutsideCallback),

            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Hole(hole) => {
                            let value = self.eval(hole)?;
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::Str(out))
            }

            ExprKind::Object(entries) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value_expr) in entries {
                    map.insert(key.clone(), self.eval(value_expr)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Read a sigil reference; absent names yield `Undefined`.
    fn sigil_ref(&self, namespace: Namespace, name: &str) -> Value {
        let map = match namespace {
            Namespace::State => &self.ctx.component_state,
            Namespace::Content => &self.ctx.content,
            Namespace::Global => &self.ctx.globals,
        };
        map.get(name).cloned().unwrap_or(Value::Undefined)
    }

    /// Resolve a bare identifier.
    ///
    /// Order: arrow-parameter bindings (innermost first), built-in
    /// enumerations, built-in numeric namespace, caller context bindings,
    /// then `Undefined`.
    fn ident(&self, name: &str) -> Value {
        for (param, value) in self.locals.iter().rev() {
            if param == name {
                return value.clone();
            }
        }
        if let Some(builtin) = namespaces::lookup(name) {
            return builtin;
        }
        self.ctx
            .bindings
            .get(name)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        // Short-circuit forms evaluate the right operand only when needed and
        // return the deciding operand's value.
        match op {
            BinaryOp::And => {
                let lhs = self.eval(left)?;
                if !lhs.truthy() {
                    return Ok(lhs);
                }
                return self.eval(right);
            }
            BinaryOp::Or => {
                let lhs = self.eval(left)?;
                if lhs.truthy() {
                    return Ok(lhs);
                }
                return self.eval(right);
            }
            _ => {}
        }

        // Left operand before right.
        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;

        match op {
            BinaryOp::StrictEq => Ok(Value::Bool(lhs == rhs)),
            BinaryOp::StrictNe => Ok(Value::Bool(lhs != rhs)),
            BinaryOp::Eq => Ok(Value::Bool(loose_eq(&lhs, &rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&lhs, &rhs))),

            BinaryOp::Lt => compare(op, &lhs, &rhs, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Le => compare(op, &lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Gt => compare(op, &lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::Ge => compare(op, &lhs, &rhs, |o| o != std::cmp::Ordering::Less),

            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{lhs}{rhs}")))
                }
                _ => Err(numeric_mismatch("'+'", &lhs, &rhs)),
            },
            BinaryOp::Sub => arith(op, &lhs, &rhs, |a, b| a - b),
            BinaryOp::Mul => arith(op, &lhs, &rhs, |a, b| a * b),
            BinaryOp::Div => arith(op, &lhs, &rhs, |a, b| a / b),
            BinaryOp::Mod => arith(op, &lhs, &rhs, |a, b| a % b),

            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            if matches!(arg.kind, ExprKind::Arrow { .. }) {
                return Err(EvalError::ArrowOutsideCallback);
            }
            values.push(self.eval(arg)?);
        }

        let descriptor =
            self.ctx
                .functions
                .get(name)
                .ok_or_else(|| EvalError::UnknownFunction {
                    name: name.to_string(),
                })?;
        descriptor.eval(&values)
    }

    fn method_call(
        &mut self,
        object: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        let receiver = self.eval(object)?;
        if receiver.is_nullish() {
            return Err(EvalError::NullishMethodCall {
                method: method.to_string(),
                receiver: describe(object),
            });
        }

        let Value::List(items) = &receiver else {
            return Err(EvalError::UnknownMethod {
                method: method.to_string(),
                kind: receiver.kind(),
            });
        };

        match method {
            "every" => {
                let (param, body) = predicate_arg(method, args)?;
                // Stop scanning once the result is determined.
                for item in items {
                    if !self.apply_predicate(param, item, body)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "some" => {
                let (param, body) = predicate_arg(method, args)?;
                for item in items {
                    if self.apply_predicate(param, item, body)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "filter" => {
                let (param, body) = predicate_arg(method, args)?;
                let mut kept = Vec::new();
                for item in items {
                    if self.apply_predicate(param, item, body)? {
                        kept.push(item.clone());
                    }
                }
                Ok(Value::List(kept))
            }
            _ => Err(EvalError::UnknownMethod {
                method: method.to_string(),
                kind: "list",
            }),
        }
    }

    /// Evaluate an arrow body with the parameter bound to one element.
    fn apply_predicate(
        &mut self,
        param: &str,
        item: &Value,
        body: &Expr,
    ) -> Result<bool, EvalError> {
        self.locals.push((param.to_string(), item.clone()));
        let result = self.eval(body);
        self.locals.pop();
        Ok(result?.truthy())
    }
}

/// Property access on a value; defensive reads yield `Undefined`.
fn member(value: &Value, field: &str) -> Value {
    match (value, field) {
        (Value::List(items), "length") => Value::Number(items.len() as f64),
        (Value::Str(s), "length") => Value::Number(s.chars().count() as f64),
        (Value::Object(_), _) => value.get(field),
        _ => Value::Undefined,
    }
}

/// Loose equality: strict equality plus numeric-string coercion.
fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    if lhs == rhs {
        return true;
    }
    match (lhs, rhs) {
        (Value::Number(n), Value::Str(s)) | (Value::Str(s), Value::Number(n)) => {
            s.trim().parse::<f64>().map(|parsed| parsed == *n).unwrap_or(false)
        }
        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
        _ => false,
    }
}

/// Ordering comparison for numbers and strings.
fn compare(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(
            a.partial_cmp(b).map(&accept).unwrap_or(false),
        )),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(accept(a.cmp(b)))),
        _ => Err(EvalError::TypeMismatch {
            context: format!("comparison {op:?}"),
            expected: "two numbers or two strings",
            got: lhs.kind(),
        }),
    }
}

fn arith(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok(Value::Number(apply(a, b))),
        _ => Err(numeric_mismatch(
            match op {
                BinaryOp::Sub => "'-'",
                BinaryOp::Mul => "'*'",
                BinaryOp::Div => "'/'",
                BinaryOp::Mod => "'%'",
                _ => "arithmetic",
            },
            lhs,
            rhs,
        )),
    }
}

fn numeric_mismatch(context: &str, lhs: &Value, rhs: &Value) -> EvalError {
    let got = if lhs.as_number().is_none() {
        lhs.kind()
    } else {
        rhs.kind()
    };
    EvalError::TypeMismatch {
        context: context.to_string(),
        expected: "number",
        got,
    }
}

/// Extract the single arrow callback expected by every/some/filter.
fn predicate_arg<'a>(
    method: &str,
    args: &'a [Expr],
) -> Result<(&'a str, &'a Expr), EvalError> {
    match args {
        [Expr {
            kind: ExprKind::Arrow { param, body },
            ..
        }] => Ok((param.as_str(), body.as_ref())),
        _ => Err(EvalError::TypeMismatch {
            context: format!(".{method}() argument"),
            expected: "a single arrow callback",
            got: "other arguments",
        }),
    }
}

/// Render an expression back to a source-shaped description for error
/// messages (`@items`, `$essay.text`).
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::SigilRef { namespace, name } => format!("{}{}", namespace.sigil(), name),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Member { object, field } => format!("{}.{}", describe(object), field),
        ExprKind::Call { name, .. } => format!("{name}(...)"),
        ExprKind::MethodCall { object, method, .. } => {
            format!("{}.{}(...)", describe(object), method)
        }
        _ => "the expression".to_string(),
    }
}
