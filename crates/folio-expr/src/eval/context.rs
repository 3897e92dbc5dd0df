//! Evaluation context construction.
//!
//! A context carries the three sigil namespaces (`@` scoped component state,
//! `$` static content, `&` global variables), caller-supplied plain bindings,
//! and the injected function registry. Evaluation is a pure function of the
//! expression and the context; there is no module-level state.

use super::{FunctionRegistry, Value};
use indexmap::IndexMap;

/// Evaluation context: the three sigil namespaces plus bindings and
/// registered functions.
pub struct EvalContext {
    /// `@name` namespace: per-component scoped state
    pub component_state: IndexMap<String, Value>,
    /// `$name` namespace: static content text
    pub content: IndexMap<String, Value>,
    /// `&name` namespace: global variables
    pub globals: IndexMap<String, Value>,
    /// Caller-supplied bare-identifier bindings (consulted after the built-in
    /// namespaces)
    pub bindings: IndexMap<String, Value>,
    /// Registered pure functions
    pub functions: FunctionRegistry,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            component_state: IndexMap::new(),
            content: IndexMap::new(),
            globals: IndexMap::new(),
            bindings: IndexMap::new(),
            functions: FunctionRegistry::with_builtins(),
        }
    }
}

/// Caller-supplied partial context; unset namespaces default to empty.
#[derive(Default)]
pub struct ContextSeed {
    /// Seed for the `@` namespace
    pub component_state: Option<IndexMap<String, Value>>,
    /// Seed for the `$` namespace
    pub content: Option<IndexMap<String, Value>>,
    /// Seed for the `&` namespace
    pub globals: Option<IndexMap<String, Value>>,
    /// Seed for bare-identifier bindings
    pub bindings: Option<IndexMap<String, Value>>,
    /// Caller-registered functions, layered over the always-available helpers
    pub functions: Option<FunctionRegistry>,
}

/// Build a full context from a partial seed.
///
/// Caller namespaces land over empty defaults; the always-available helper
/// functions (word count among them) are installed first so caller
/// registrations with the same name win.
pub fn create_context(seed: ContextSeed) -> EvalContext {
    let mut functions = FunctionRegistry::with_builtins();
    if let Some(extra) = seed.functions {
        // Drain descriptors from the caller registry over the defaults.
        for name in extra.all_names().collect::<Vec<_>>() {
            if let Some(descriptor) = extra.get(name) {
                functions.register(super::FunctionDescriptor {
                    name: descriptor.name,
                    signature: descriptor.signature,
                    doc: descriptor.doc,
                    arity: descriptor.arity,
                    implementation: descriptor.implementation,
                });
            }
        }
    }

    EvalContext {
        component_state: seed.component_state.unwrap_or_default(),
        content: seed.content.unwrap_or_default(),
        globals: seed.globals.unwrap_or_default(),
        bindings: seed.bindings.unwrap_or_default(),
        functions,
    }
}
