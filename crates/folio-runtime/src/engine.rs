//! Resolution/render engine.
//!
//! Turns graph references and inline nodes into cached, identity-stable
//! handles. The central invariant: two resolution calls with identical
//! (node identity, scope, overrides) against the same graph version return
//! the *same* handle object. A pending handle is registered in the cache
//! before any child resolution or handler setup begins, so re-entrant and
//! suspension-retried calls observe it instead of starting duplicate work.
//!
//! Structural content problems (missing keys, unknown tags, bad attributes,
//! cycles) become inline error results a parent can still embed; only
//! handler failures reject a handle.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use folio_expr::Value;

use crate::cache::{overrides_fingerprint, CompositeKey, NodeIdentity, ResolveCache};
use crate::error::Result;
use crate::graph::{apply_overrides, GraphStore, KidRef, SourceRef, StaticNode};
use crate::handle::{
    ComponentInstance, Deferred, Handle, HandlerFailure, InlineError, Instance,
};
use crate::ident::{extend_scope, Reference, ScopePrefix, ScopedStateKey};
use crate::registry::{ChildScopeStrategy, ComponentRegistry, Setup, SetupContext};
use crate::state::StateStore;

/// What to resolve: an author-facing reference string or an inline node.
pub enum ResolveInput<'a> {
    /// A reference in any of the four syntactic forms
    Reference(&'a str),
    /// An inline kid (reference entry, text run, or fragment)
    Node(&'a KidRef),
}

/// The resolution engine for one published graph version.
///
/// Holds the graph and its per-version cache; the component registry is
/// injected per call so independent documents and tests never share
/// dispatch state.
pub struct Engine {
    graph: Rc<GraphStore>,
    cache: ResolveCache,
    store: Option<Rc<dyn StateStore>>,
}

impl Engine {
    /// Create an engine over a published graph.
    pub fn new(graph: Rc<GraphStore>) -> Self {
        let cache = ResolveCache::new(graph.version());
        Self {
            graph,
            cache,
            store: None,
        }
    }

    /// Create an engine whose handlers can read initial state from a
    /// reactive store.
    pub fn with_state_store(graph: Rc<GraphStore>, store: Rc<dyn StateStore>) -> Self {
        let mut engine = Self::new(graph);
        engine.store = Some(store);
        engine
    }

    /// The graph this engine resolves against.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// The per-version cache.
    pub fn cache(&self) -> &ResolveCache {
        &self.cache
    }

    /// Resolve a reference or inline node under a scope.
    ///
    /// Errors only on contract violations in the caller's own input
    /// (malformed or unsupported reference syntax); every content problem is
    /// recovered into the returned handle.
    pub fn resolve(
        &self,
        input: ResolveInput<'_>,
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
    ) -> Result<Handle> {
        match input {
            ResolveInput::Reference(src) => {
                self.resolve_reference(src, &IndexMap::new(), scope, registry, None)
            }
            ResolveInput::Node(kid) => self.resolve_kid(kid, scope, registry, None),
        }
    }

    /// Resolve a kid list independently, order preserved.
    pub fn resolve_kids(
        &self,
        kids: &[KidRef],
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
    ) -> Result<Vec<Handle>> {
        kids.iter()
            .map(|kid| self.resolve_kid(kid, scope, registry, None))
            .collect()
    }

    fn resolve_kid(
        &self,
        kid: &KidRef,
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
        parent: Option<&str>,
    ) -> Result<Handle> {
        match kid {
            KidRef::Text(text) => Ok(Handle::fulfilled(Instance::Text(text.clone()))),
            KidRef::Ref {
                reference,
                overrides,
            } => self.resolve_reference(reference, overrides, scope, registry, parent),
            KidRef::Fragment {
                anchor,
                tag,
                attributes,
                kids,
            } => self.resolve_fragment(anchor, tag, attributes, kids, scope, registry, parent),
        }
    }

    fn resolve_reference(
        &self,
        src: &str,
        overrides: &IndexMap<String, Value>,
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
        parent: Option<&str>,
    ) -> Result<Handle> {
        let reference = Reference::classify(src)?;
        let state_key = reference.scoped_state_key(scope)?;
        let key = reference.canonical_key();
        // Absolute references denote the same instance from every scope, so
        // the cache key uses the scope that actually applied.
        let effective_scope = reference.effective_scope(scope);

        let composite = CompositeKey {
            identity: NodeIdentity::Graph(key.clone()),
            scope: effective_scope.to_string(),
            overrides: overrides_fingerprint(overrides),
        };

        if let Some(handle) = self.check_cycle_then_cache(&composite) {
            return Ok(handle);
        }

        let Some(node) = self.graph.lookup(&key) else {
            debug!(%key, "reference misses the graph");
            return Ok(self.cache_error(composite, InlineError::NotFoundInGraph { key }));
        };

        let node = apply_overrides(node, overrides);
        Ok(self.instantiate(composite, &node, state_key, &effective_scope, registry, parent))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_fragment(
        &self,
        anchor: &SourceRef,
        tag: &str,
        attributes: &IndexMap<String, Value>,
        kids: &[KidRef],
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
        parent: Option<&str>,
    ) -> Result<Handle> {
        let composite = CompositeKey {
            identity: NodeIdentity::Inline(anchor.clone()),
            scope: scope.to_string(),
            overrides: 0,
        };

        if let Some(handle) = self.check_cycle_then_cache(&composite) {
            return Ok(handle);
        }

        // Fragments are not graph-addressable; their state identity derives
        // from the authored anchor.
        let local_id = format!("{tag}#{}", anchor.start);
        let state_key = ScopedStateKey::new(scope, &local_id);

        let node = StaticNode {
            key: local_id.into(),
            tag: tag.to_string(),
            attributes: attributes.clone(),
            kids: kids.to_vec(),
            provenance: vec![anchor.clone()],
        };
        Ok(self.instantiate(composite, &node, state_key, scope, registry, parent))
    }

    /// Cycle check, then cache lookup, in that order.
    ///
    /// A key already on the current synchronous descent has a pending cache
    /// entry belonging to an ancestor; returning it would leave the subtree
    /// waiting on itself forever, so the re-entry surfaces as an inline
    /// error instead. A pending entry *off* the descent stack is a shared
    /// DAG node and is returned as-is.
    fn check_cycle_then_cache(&self, composite: &CompositeKey) -> Option<Handle> {
        if self.cache.is_descending(composite) {
            warn!(key = %composite.describe(), "cycle detected");
            return Some(Handle::fulfilled(Instance::Error(InlineError::CycleDetected {
                key: composite.describe(),
            })));
        }
        self.cache.get(composite)
    }

    /// Cache an inline error result so repeated lookups of the same broken
    /// reference return the identical handle.
    fn cache_error(&self, composite: CompositeKey, error: InlineError) -> Handle {
        let handle = Handle::fulfilled(Instance::Error(error));
        self.cache.insert(composite, handle.clone());
        handle
    }

    /// Steps 6-9: dispatch, validate, derive child scopes, and settle.
    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        composite: CompositeKey,
        node: &StaticNode,
        state_key: ScopedStateKey,
        scope: &ScopePrefix,
        registry: &ComponentRegistry,
        parent: Option<&str>,
    ) -> Handle {
        let Some(spec) = registry.get(&node.tag) else {
            warn!(tag = %node.tag, key = %state_key, "no handler registered");
            return self.cache_error(
                composite,
                InlineError::UnknownTag {
                    tag: node.tag.clone(),
                    key: state_key.to_string(),
                },
            );
        };

        if let Some(required) = spec.requires_parent {
            if parent != Some(required) {
                warn!(tag = %node.tag, required, "component outside its required parent");
                // Not cached: the same node may resolve fine later under the
                // right parent, and the composite key does not carry the
                // parent tag.
                return Handle::fulfilled(Instance::Error(InlineError::MisplacedComponent {
                    tag: node.tag.clone(),
                    key: state_key.to_string(),
                    requires: required,
                }));
            }
        }

        let attributes = match &spec.attribute_schema {
            Some(schema) => match schema.validate(&node.attributes) {
                Ok(merged) => merged,
                Err(problems) => {
                    return self.cache_error(
                        composite,
                        InlineError::AttributeValidationFailed {
                            tag: node.tag.clone(),
                            key: state_key.to_string(),
                            problems,
                        },
                    );
                }
            },
            None => node.attributes.clone(),
        };

        // Register the pending handle before any child resolution or setup so
        // concurrent and re-entrant requests observe it.
        let handle = Handle::pending();
        self.cache.insert(composite.clone(), handle.clone());
        self.cache.descend(&composite);
        debug!(key = %composite.describe(), tag = %node.tag, "instantiating");

        let setup_result = (spec.setup)(&SetupContext {
            tag: &node.tag,
            state_key: &state_key,
            scope,
            attributes: &attributes,
            store: self.store.as_deref(),
        });

        let kids = self.resolve_node_kids(node, scope, spec.child_scope, registry);
        self.cache.ascend(&composite);

        let kids = match kids {
            Ok(kids) => kids,
            Err(error) => {
                // A malformed reference inside published content is an
                // ingestion bug; surface it on this handle rather than
                // blanking the whole resolve call.
                handle.reject(HandlerFailure::new(node.tag.clone(), error.to_string()));
                return handle;
            }
        };

        let deferred = match setup_result {
            Err(failure) => {
                handle.reject(failure);
                return handle;
            }
            Ok(Setup::Ready(value)) => {
                self.settle_when_ready(&handle, node, state_key, attributes, kids, value, None);
                return handle;
            }
            Ok(Setup::Deferred(deferred)) => deferred,
        };

        self.settle_when_ready(
            &handle,
            node,
            state_key,
            attributes,
            kids,
            Value::Undefined,
            Some(deferred),
        );
        handle
    }

    fn resolve_node_kids(
        &self,
        node: &StaticNode,
        scope: &ScopePrefix,
        strategy: ChildScopeStrategy,
        registry: &ComponentRegistry,
    ) -> Result<Vec<Handle>> {
        match strategy {
            ChildScopeStrategy::Inherit => node
                .kids
                .iter()
                .map(|kid| self.resolve_kid(kid, scope, registry, Some(&node.tag)))
                .collect(),
            ChildScopeStrategy::PerKid => node
                .kids
                .iter()
                .enumerate()
                .map(|(index, kid)| {
                    let child_scope =
                        extend_scope(scope, format!("{}:{}", node.key, index));
                    self.resolve_kid(kid, &child_scope, registry, Some(&node.tag))
                })
                .collect(),
        }
    }

    /// Fulfil the handle once every pending dependency (children plus any
    /// deferred setup) has settled. A rejected child still counts as
    /// settled and renders its own diagnostic; only this node's own setup
    /// failure rejects this handle.
    #[allow(clippy::too_many_arguments)]
    fn settle_when_ready(
        &self,
        handle: &Handle,
        node: &StaticNode,
        state_key: ScopedStateKey,
        attributes: IndexMap<String, Value>,
        kids: Vec<Handle>,
        value: Value,
        deferred: Option<Deferred>,
    ) {
        let pending_kids: Vec<Handle> = kids.iter().filter(|k| k.is_pending()).cloned().collect();
        let total = pending_kids.len() + usize::from(deferred.is_some());

        let settling = Rc::new(Settling {
            handle: handle.clone(),
            tag: node.tag.clone(),
            state_key,
            attributes,
            kids,
            value: RefCell::new(value),
            failure: RefCell::new(None),
            remaining: Cell::new(total),
        });

        if total == 0 {
            settling.finish();
            return;
        }

        for kid in &pending_kids {
            let settling = settling.clone();
            kid.subscribe(move |_| settling.arrive());
        }

        if let Some(deferred) = deferred {
            let settling = settling.clone();
            deferred.on_done(move |outcome| {
                match outcome {
                    Ok(value) => *settling.value.borrow_mut() = value.clone(),
                    Err(failure) => *settling.failure.borrow_mut() = Some(failure.clone()),
                }
                settling.arrive();
            });
        }
    }
}

/// Bookkeeping for a handle waiting on its dependencies.
struct Settling {
    handle: Handle,
    tag: String,
    state_key: ScopedStateKey,
    attributes: IndexMap<String, Value>,
    kids: Vec<Handle>,
    value: RefCell<Value>,
    failure: RefCell<Option<HandlerFailure>>,
    remaining: Cell<usize>,
}

impl Settling {
    fn arrive(&self) {
        let left = self.remaining.get() - 1;
        self.remaining.set(left);
        if left == 0 {
            self.finish();
        }
    }

    fn finish(&self) {
        if let Some(failure) = self.failure.borrow_mut().take() {
            self.handle.reject(failure);
            return;
        }
        self.handle.fulfil(Instance::Component(ComponentInstance {
            tag: self.tag.clone(),
            state_key: self.state_key.clone(),
            attributes: self.attributes.clone(),
            kids: self.kids.clone(),
            value: self.value.borrow().clone(),
        }));
    }
}
