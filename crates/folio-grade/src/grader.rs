//! Answer grading.

use std::fmt;

use indexmap::IndexMap;

use folio_expr::{create_context, evaluate, parse, ContextSeed, FunctionRegistry, Value};
use folio_runtime::{Reference, ScopePrefix, StateStore};

use crate::GradeError;

/// Grading outcome for one response.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Fully correct
    Correct,
    /// Fully incorrect
    Incorrect,
    /// Partial credit in `0.0..1.0`
    PartiallyCorrect(f64),
}

impl Outcome {
    /// The matching `correctness.*` constant of the expression language.
    pub fn as_correctness(&self) -> &'static str {
        match self {
            Outcome::Correct => "correct",
            Outcome::Incorrect => "incorrect",
            Outcome::PartiallyCorrect(_) => "partiallyCorrect",
        }
    }

    /// Credit in `0.0..=1.0`.
    pub fn credit(&self) -> f64 {
        match self {
            Outcome::Correct => 1.0,
            Outcome::Incorrect => 0.0,
            Outcome::PartiallyCorrect(credit) => *credit,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_correctness())
    }
}

/// A graded response: the instance it belongs to and how it scored.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Scoped state key of the graded instance
    pub key: folio_runtime::ScopedStateKey,
    /// How the response scored
    pub outcome: Outcome,
}

/// The response state handed to predicates: field name to value.
pub type ResponseState = IndexMap<String, Value>;

/// Signature for registered grading predicates: pure over the response state.
pub type PredicateFn = fn(&ResponseState) -> Outcome;

/// Descriptor for a registered grading predicate.
pub struct PredicateDescriptor {
    /// Predicate name referenced by authored grading specs
    pub name: &'static str,
    /// Documentation string
    pub doc: &'static str,
    /// The implementation
    pub implementation: PredicateFn,
}

/// Registry of grading predicates, injected into the grader.
#[derive(Default)]
pub struct PredicateRegistry {
    predicates: IndexMap<&'static str, PredicateDescriptor>,
}

impl PredicateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate. A later registration with the same name wins.
    pub fn register(&mut self, descriptor: PredicateDescriptor) {
        self.predicates.insert(descriptor.name, descriptor);
    }

    /// Look up a predicate by name.
    pub fn get(&self, name: &str) -> Option<&PredicateDescriptor> {
        self.predicates.get(name)
    }

    /// Check whether a name is registered.
    pub fn is_known(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
}

/// How to grade a target.
pub enum GradeSpec<'a> {
    /// Apply a registered predicate by name.
    Predicate(&'a str),
    /// Evaluate a grading expression. The `@` namespace is seeded with the
    /// target's state under its bare identifier, so authors write
    /// `@response.value` regardless of the scope the instance lives under.
    Expression(&'a str),
}

/// Grades responses by resolving target references to scoped state.
pub struct Grader<'a> {
    store: &'a dyn StateStore,
    predicates: PredicateRegistry,
    functions: FunctionRegistry,
}

impl<'a> Grader<'a> {
    /// Create a grader over a reactive store.
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            store,
            predicates: PredicateRegistry::new(),
            functions: FunctionRegistry::with_builtins(),
        }
    }

    /// Replace the predicate registry.
    pub fn with_predicates(mut self, predicates: PredicateRegistry) -> Self {
        self.predicates = predicates;
        self
    }

    /// Replace the expression function registry.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Grade the target reference's response under the given scope.
    pub fn grade(
        &self,
        target: &str,
        scope: &ScopePrefix,
        spec: GradeSpec<'_>,
    ) -> Result<Verdict, GradeError> {
        let reference = Reference::classify(target)?;
        let key = reference.scoped_state_key(scope)?;

        let mut state = ResponseState::new();
        for field in self.store.fields(&key) {
            if let Some(value) = self.store.get(&key, &field) {
                state.insert(field, value);
            }
        }
        if state.is_empty() {
            return Err(GradeError::MissingState {
                key: key.to_string(),
            });
        }

        let outcome = match spec {
            GradeSpec::Predicate(name) => {
                let descriptor =
                    self.predicates
                        .get(name)
                        .ok_or_else(|| GradeError::UnknownPredicate {
                            name: name.to_string(),
                        })?;
                (descriptor.implementation)(&state)
            }
            GradeSpec::Expression(source) => {
                self.grade_by_expression(source, reference.bare(), state)?
            }
        };

        Ok(Verdict { key, outcome })
    }

    fn grade_by_expression(
        &self,
        source: &str,
        bare_id: &str,
        state: ResponseState,
    ) -> Result<Outcome, GradeError> {
        let expr = parse(source)?;

        let mut component_state = IndexMap::new();
        component_state.insert(bare_id.to_string(), Value::Object(state));

        let mut functions = FunctionRegistry::with_builtins();
        for name in self.functions.all_names().collect::<Vec<_>>() {
            if let Some(descriptor) = self.functions.get(name) {
                functions.register(folio_expr::FunctionDescriptor {
                    name: descriptor.name,
                    signature: descriptor.signature,
                    doc: descriptor.doc,
                    arity: descriptor.arity,
                    implementation: descriptor.implementation,
                });
            }
        }

        let ctx = create_context(ContextSeed {
            component_state: Some(component_state),
            functions: Some(functions),
            ..Default::default()
        });

        let value = evaluate(&expr, &ctx)?;
        Ok(outcome_from_value(&value))
    }
}

/// Interpret an expression result as a grading outcome.
///
/// Booleans map to correct/incorrect; numbers are clamped credit (1 is
/// correct, 0 is incorrect); `correctness.*` strings pass through; anything
/// else grades by truthiness.
fn outcome_from_value(value: &Value) -> Outcome {
    match value {
        Value::Bool(true) => Outcome::Correct,
        Value::Bool(false) => Outcome::Incorrect,
        Value::Number(n) => {
            let credit = n.clamp(0.0, 1.0);
            if credit >= 1.0 {
                Outcome::Correct
            } else if credit <= 0.0 {
                Outcome::Incorrect
            } else {
                Outcome::PartiallyCorrect(credit)
            }
        }
        Value::Str(s) if s == "correct" => Outcome::Correct,
        Value::Str(s) if s == "incorrect" => Outcome::Incorrect,
        Value::Str(s) if s == "partiallyCorrect" => Outcome::PartiallyCorrect(0.5),
        other => {
            if other.truthy() {
                Outcome::Correct
            } else {
                Outcome::Incorrect
            }
        }
    }
}
