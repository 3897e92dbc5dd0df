//! Reactive store surface.
//!
//! The persistent per-instance state layer is an external collaborator; this
//! module defines the trait the engine and grading consumers talk through,
//! plus an in-memory implementation used by tests.

use std::cell::RefCell;

use indexmap::IndexMap;

use folio_expr::Value;

use crate::ident::ScopedStateKey;

/// Per-instance reactive state, keyed by scoped state key and field.
pub trait StateStore {
    /// Read one field of an instance's state.
    fn get(&self, key: &ScopedStateKey, field: &str) -> Option<Value>;

    /// Write one field of an instance's state.
    fn set(&self, key: &ScopedStateKey, field: &str, value: Value);

    /// Names of the fields currently stored for an instance.
    fn fields(&self, key: &ScopedStateKey) -> Vec<String>;
}

/// In-memory state store (single-threaded, interior-mutable).
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    cells: RefCell<IndexMap<String, IndexMap<String, Value>>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &ScopedStateKey, field: &str) -> Option<Value> {
        self.cells
            .borrow()
            .get(key.as_str())
            .and_then(|fields| fields.get(field))
            .cloned()
    }

    fn set(&self, key: &ScopedStateKey, field: &str, value: Value) {
        self.cells
            .borrow_mut()
            .entry(key.as_str().to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn fields(&self, key: &ScopedStateKey) -> Vec<String> {
        self.cells
            .borrow()
            .get(key.as_str())
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }
}
