//! Per-version resolution cache.
//!
//! The cache is the only shared, mutable structure in the runtime core. It is
//! keyed per graph version, so a new version simply gets a fresh cache and no
//! invalidation logic exists. Within one version each composite key is
//! written at most once: a pending handle is registered before any work
//! starts, so re-entrant requests observe the same handle instead of
//! duplicating resolution.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use tracing::trace;

use folio_expr::Value;

use crate::graph::{GraphVersion, SourceRef};
use crate::handle::Handle;
use crate::ident::CanonicalKey;

/// What a cached handle was resolved from.
///
/// Inline fragments are distinguished from graph references by their authored
/// anchor, so two structurally identical fragments never collide unless they
/// are in fact the same authored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentity {
    /// A node in the content graph
    Graph(CanonicalKey),
    /// An inline fragment, identified by its authored location
    Inline(SourceRef),
}

/// Full key under which a handle is cached: node identity, scope, and
/// override fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    /// Node identity
    pub identity: NodeIdentity,
    /// Scope the instance lives under (joined form)
    pub scope: String,
    /// Fingerprint of the applied overrides; 0 means none
    pub overrides: u64,
}

impl CompositeKey {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        let identity = match &self.identity {
            NodeIdentity::Graph(key) => key.to_string(),
            NodeIdentity::Inline(anchor) => format!("inline@{anchor}"),
        };
        if self.scope.is_empty() {
            identity
        } else {
            format!("{}:{}", self.scope, identity)
        }
    }
}

/// Fingerprint an override map.
///
/// Pure and order-insensitive: entries are hashed in sorted key order, so two
/// maps with the same contents fingerprint identically regardless of
/// insertion order. `0` is reserved for the empty map.
pub fn overrides_fingerprint(overrides: &IndexMap<String, Value>) -> u64 {
    if overrides.is_empty() {
        return 0;
    }

    let mut keys: Vec<&String> = overrides.keys().collect();
    keys.sort();

    let mut hasher = DefaultHasher::new();
    for key in keys {
        key.hash(&mut hasher);
        hash_value(&overrides[key.as_str()], &mut hasher);
    }
    let fingerprint = hasher.finish();
    if fingerprint == 0 {
        1
    } else {
        fingerprint
    }
}

fn hash_value(value: &Value, hasher: &mut DefaultHasher) {
    match value {
        Value::Undefined => 0u8.hash(hasher),
        Value::Null => 1u8.hash(hasher),
        Value::Bool(b) => {
            2u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            3u8.hash(hasher);
            n.to_bits().hash(hasher);
        }
        Value::Str(s) => {
            4u8.hash(hasher);
            s.hash(hasher);
        }
        Value::List(items) => {
            5u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            6u8.hash(hasher);
            map.len().hash(hasher);
            for (key, item) in map {
                key.hash(hasher);
                hash_value(item, hasher);
            }
        }
    }
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned an existing handle
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
}

/// Cache of resolution results for one graph version.
#[derive(Default)]
pub struct ResolveCache {
    version: GraphVersion,
    entries: RefCell<IndexMap<CompositeKey, Handle>>,
    /// Composite keys on the current synchronous descent, for cycle
    /// detection. A pending cache entry *not* in this set is a legitimate
    /// DAG share, not a cycle.
    in_flight: RefCell<HashSet<CompositeKey>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl ResolveCache {
    /// Create an empty cache for a graph version.
    pub fn new(version: GraphVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// The graph version this cache serves.
    pub fn version(&self) -> GraphVersion {
        self.version
    }

    /// Look up a handle.
    pub fn get(&self, key: &CompositeKey) -> Option<Handle> {
        let found = self.entries.borrow().get(key).cloned();
        match &found {
            Some(_) => {
                self.hits.set(self.hits.get() + 1);
                trace!(key = %key.describe(), "cache hit");
            }
            None => {
                self.misses.set(self.misses.get() + 1);
                trace!(key = %key.describe(), "cache miss");
            }
        }
        found
    }

    /// Register a handle. Each key is written at most once per version.
    pub(crate) fn insert(&self, key: CompositeKey, handle: Handle) {
        let previous = self.entries.borrow_mut().insert(key.clone(), handle);
        assert!(
            previous.is_none(),
            "BUG: composite key '{}' cached twice in {}",
            key.describe(),
            self.version
        );
    }

    /// Mark a key as resolving on the current synchronous descent.
    ///
    /// Returns false when the key is already descending (a cycle).
    pub(crate) fn descend(&self, key: &CompositeKey) -> bool {
        self.in_flight.borrow_mut().insert(key.clone())
    }

    /// Is this key on the current synchronous descent?
    pub(crate) fn is_descending(&self, key: &CompositeKey) -> bool {
        self.in_flight.borrow().contains(key)
    }

    /// Unmark a key once its synchronous resolution step finished.
    pub(crate) fn ascend(&self, key: &CompositeKey) {
        self.in_flight.borrow_mut().remove(key);
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Is the cache empty?
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }
}
