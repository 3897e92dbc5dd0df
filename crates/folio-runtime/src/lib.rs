//! # Folio resolution runtime
//!
//! Turns a static, possibly-cyclic content graph into live, per-instance
//! component handles with stable identity, scoped state keys, override
//! application, and suspension-safe caching.
//!
//! ## Architecture
//!
//! ```text
//! ident    - reference syntax, canonical keys, scope prefixes, state keys
//! graph    - immutable-per-version content graph store + override merge
//! registry - injected component registry (tag -> typed handler descriptor)
//! handle   - identity-stable pending/fulfilled/rejected instance handles
//! cache    - per-version composite-key cache, write-once, cycle detection
//! engine   - the recursive resolution/render algorithm
//! state    - reactive store trait + in-memory implementation
//! ```
//!
//! ## Model
//!
//! Scheduling is single-threaded, cooperative, and event-loop driven: no OS
//! threads, no locks. Graph lookup, key derivation, attribute validation,
//! and cache access are synchronous; only a genuinely deferred handler setup
//! makes a handle wait, and a handle that is already settled can be read
//! synchronously. The cache is written at most once per composite key,
//! registered before any work begins; that is the core's one
//! concurrency-correctness property.
//!
//! ## Usage
//!
//! ```
//! use std::rc::Rc;
//! use folio_runtime::{
//!     ComponentRegistry, ComponentSpec, Engine, GraphBuilder, GraphVersion,
//!     ResolveInput, ScopePrefix, Settlement, StaticNode,
//! };
//!
//! let mut builder = GraphBuilder::new();
//! builder.add_node(StaticNode {
//!     key: "intro".into(),
//!     tag: "Passage".to_string(),
//!     attributes: Default::default(),
//!     kids: Vec::new(),
//!     provenance: Vec::new(),
//! });
//! let graph = Rc::new(builder.publish(GraphVersion::initial()));
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register(ComponentSpec::passive("Passage", "Static prose"));
//!
//! let engine = Engine::new(graph);
//! let handle = engine
//!     .resolve(ResolveInput::Reference("intro"), &ScopePrefix::root(), &registry)
//!     .unwrap();
//! assert!(matches!(handle.try_get(), Some(Settlement::Fulfilled(_))));
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handle;
pub mod ident;
pub mod registry;
pub mod state;

pub use cache::{overrides_fingerprint, CacheStats, CompositeKey, NodeIdentity, ResolveCache};
pub use engine::{Engine, ResolveInput};
pub use error::{Error, Result};
pub use graph::{
    apply_overrides, GraphBuilder, GraphStore, GraphVersion, KidRef, SourceRef, StaticNode,
};
pub use handle::{
    ComponentInstance, Deferred, DeferredOutcome, Handle, HandlerFailure, InlineError, Instance,
    Settlement,
};
pub use ident::{
    extend_scope, CanonicalKey, RefKind, Reference, ScopePrefix, ScopedStateKey, SCOPE_SEPARATOR,
};
pub use registry::{
    AttrKind, AttrSpec, AttributeProblem, AttributeSchema, ChildScopeStrategy, ComponentRegistry,
    ComponentSpec, Setup, SetupContext, SetupFn,
};
pub use state::{MemoryStateStore, StateStore};

// Re-export the value type shared with the expression language.
pub use folio_expr::Value;
