//! Content graph store.
//!
//! The static, authored graph of nodes before instantiation. The (external)
//! ingestion parser builds nodes through [`GraphBuilder`]; publishing freezes
//! them into an immutable [`GraphStore`]. Edits produce a new graph version;
//! published nodes are never mutated, which is what keeps cache keys and
//! instance aliasing sound.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use folio_expr::Value;

use crate::ident::CanonicalKey;

/// Provenance of a node or inline fragment: where in the authored source it
/// came from. Also serves as the stable authored identity of inline
/// fragments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source file the node was authored in
    pub file: String,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

impl SourceRef {
    /// Create a new source reference.
    pub fn new(file: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            file: file.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.file, self.start, self.end)
    }
}

/// Version of a published graph.
///
/// Resolution caches are keyed per version; a new version gets a fresh cache
/// and the old one is simply dropped once unreferenced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GraphVersion(pub u64);

impl GraphVersion {
    /// The first version.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The version after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for GraphVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A static node in the content graph.
///
/// Immutable once published; overrides on a reference apply to the
/// instantiated copy, never to this shared descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNode {
    /// Graph-lookup identity
    pub key: CanonicalKey,
    /// Component tag resolved against the registry
    pub tag: String,
    /// Authored attributes (order preserved)
    pub attributes: IndexMap<String, Value>,
    /// Child references, text runs, and inline fragments in authored order
    pub kids: Vec<KidRef>,
    /// Where this node was authored
    pub provenance: Vec<SourceRef>,
}

/// A child entry of a static node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KidRef {
    /// Reference to another node by key, with optional attribute overrides
    /// applied to the instantiated copy only.
    Ref {
        /// Reference string (any of the four syntactic forms)
        reference: String,
        /// Attribute overrides for the instantiated copy
        overrides: IndexMap<String, Value>,
    },
    /// Inline text run
    Text(String),
    /// Inline markup fragment with its own nested kids.
    ///
    /// The anchor is the fragment's stable authored identity: structurally
    /// identical fragments from different source locations are different
    /// nodes.
    Fragment {
        /// Authored identity and provenance
        anchor: SourceRef,
        /// Component tag
        tag: String,
        /// Authored attributes
        attributes: IndexMap<String, Value>,
        /// Nested kids
        kids: Vec<KidRef>,
    },
}

impl KidRef {
    /// Convenience constructor for an override-free reference.
    pub fn reference(reference: impl Into<String>) -> Self {
        KidRef::Ref {
            reference: reference.into(),
            overrides: IndexMap::new(),
        }
    }
}

/// Mutable construction surface for a graph version.
///
/// Used by the ingestion parser; consumers only ever see the published
/// [`GraphStore`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: IndexMap<CanonicalKey, StaticNode>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Within one version each key denotes exactly one node; a
    /// second add with the same key replaces the first.
    pub fn add_node(&mut self, node: StaticNode) -> &mut Self {
        self.nodes.insert(node.key.clone(), node);
        self
    }

    /// Freeze into an immutable store at the given version.
    pub fn publish(self, version: GraphVersion) -> GraphStore {
        GraphStore {
            version,
            nodes: self.nodes,
        }
    }
}

/// Immutable, versioned table of static nodes.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphStore {
    version: GraphVersion,
    nodes: IndexMap<CanonicalKey, StaticNode>,
}

impl GraphStore {
    /// This store's version.
    pub fn version(&self) -> GraphVersion {
        self.version
    }

    /// Look up a node by canonical key.
    pub fn lookup(&self, key: &CanonicalKey) -> Option<&StaticNode> {
        self.nodes.get(key)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node keys in publish order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.nodes.keys()
    }
}

/// Apply attribute overrides to a node, producing the instantiated copy.
///
/// A pure merge: overrides win key-by-key over the node's attributes; all
/// other fields pass through unchanged. The merged copy is never written
/// back into the store.
pub fn apply_overrides(node: &StaticNode, overrides: &IndexMap<String, Value>) -> StaticNode {
    if overrides.is_empty() {
        return node.clone();
    }
    let mut attributes = node.attributes.clone();
    for (key, value) in overrides {
        attributes.insert(key.clone(), value.clone());
    }
    StaticNode {
        key: node.key.clone(),
        tag: node.tag.clone(),
        attributes,
        kids: node.kids.clone(),
        provenance: node.provenance.clone(),
    }
}
