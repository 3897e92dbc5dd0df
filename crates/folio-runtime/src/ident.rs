//! Reference syntax and scoped identity derivation.
//!
//! Authors refer to nodes with reference strings in four syntactic forms:
//!
//! - `foo` — relative, the current scope prefix applies
//! - `/foo` — absolute, the scope prefix is bypassed
//! - `./foo` — explicit-relative, identical semantics to bare (clarity only)
//! - `../foo` — parent-relative, reserved and unsupported
//!
//! Classifying a reference never touches the graph; it only reads syntax.
//! Two identities derive from a reference: the [`CanonicalKey`] used for
//! graph lookups (always prefix-free) and the [`ScopedStateKey`] used by the
//! reactive store (scope prefix applied for relative forms). Both
//! derivations are pure functions of their inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between scope segments and the trailing canonical key in a
/// scoped state key.
pub const SCOPE_SEPARATOR: char = ':';

/// Syntactic classification of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// `foo` — scope prefix applies
    Relative,
    /// `/foo` — scope prefix bypassed
    Absolute,
    /// `./foo` — same semantics as `Relative`
    ExplicitRelative,
    /// `../foo` — reserved, no semantics assigned
    ParentRelative,
}

/// A classified reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    kind: RefKind,
    bare: String,
}

impl Reference {
    /// Classify a reference string.
    ///
    /// Fails with [`Error::MalformedReference`] when the string is empty or
    /// contains reserved delimiter characters outside their syntactic role,
    /// so authors get a clear error here rather than a corrupted key later.
    pub fn classify(src: &str) -> Result<Self> {
        if src.is_empty() {
            return Err(Error::MalformedReference {
                reference: src.to_string(),
                reason: "reference is empty".to_string(),
            });
        }

        let (kind, bare) = if let Some(rest) = src.strip_prefix("../") {
            (RefKind::ParentRelative, rest)
        } else if let Some(rest) = src.strip_prefix("./") {
            (RefKind::ExplicitRelative, rest)
        } else if let Some(rest) = src.strip_prefix('/') {
            (RefKind::Absolute, rest)
        } else {
            (RefKind::Relative, src)
        };

        if bare.is_empty() {
            return Err(Error::MalformedReference {
                reference: src.to_string(),
                reason: "missing identifier after prefix".to_string(),
            });
        }
        if bare.contains(SCOPE_SEPARATOR) {
            return Err(Error::MalformedReference {
                reference: src.to_string(),
                reason: format!("identifier contains reserved '{SCOPE_SEPARATOR}'"),
            });
        }
        if bare.contains('/') {
            return Err(Error::MalformedReference {
                reference: src.to_string(),
                reason: "identifier contains '/'".to_string(),
            });
        }

        Ok(Self {
            kind,
            bare: bare.to_string(),
        })
    }

    /// The syntactic form of this reference.
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// The identifier with prefix markers stripped.
    pub fn bare(&self) -> &str {
        &self.bare
    }

    /// The graph-lookup identity.
    ///
    /// The canonical key space is prefix-free: prefixing happens only for
    /// state keys, never for graph lookups, so the current scope is not
    /// consulted.
    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey(self.bare.clone())
    }

    /// The reactive-store identity under the given scope.
    ///
    /// Absolute references ignore the scope entirely; relative and
    /// explicit-relative references join the scope prefix onto the bare
    /// identifier. Parent-relative references fail with
    /// [`Error::UnsupportedReference`]: the semantics are reserved, not
    /// guessed.
    pub fn scoped_state_key(&self, scope: &ScopePrefix) -> Result<ScopedStateKey> {
        match self.kind {
            RefKind::Absolute => Ok(ScopedStateKey::new(&ScopePrefix::root(), &self.bare)),
            RefKind::Relative | RefKind::ExplicitRelative => {
                Ok(ScopedStateKey::new(scope, &self.bare))
            }
            RefKind::ParentRelative => Err(Error::UnsupportedReference {
                reference: format!("../{}", self.bare),
            }),
        }
    }

    /// The scope the state key is derived under: root for absolute
    /// references, the current scope otherwise.
    pub(crate) fn effective_scope(&self, scope: &ScopePrefix) -> ScopePrefix {
        match self.kind {
            RefKind::Absolute => ScopePrefix::root(),
            _ => scope.clone(),
        }
    }
}

/// Graph-lookup identity of a static node.
///
/// Within one store version each key denotes exactly one node, though the
/// graph being a DAG means a key may be reachable via multiple paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CanonicalKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CanonicalKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ordered path-segment list distinguishing repeated instantiations of the
/// same static node.
///
/// Prefixes are immutable; [`ScopePrefix::extend`] returns a new prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopePrefix {
    segments: Vec<String>,
}

impl ScopePrefix {
    /// The empty (root) scope.
    pub fn root() -> Self {
        Self::default()
    }

    /// Create a prefix from segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Is this the root scope?
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment to create a new prefix.
    pub fn extend(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for ScopePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(":"))
    }
}

impl From<&str> for ScopePrefix {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::root()
        } else {
            Self {
                segments: s
                    .split(SCOPE_SEPARATOR)
                    .map(String::from)
                    .collect(),
            }
        }
    }
}

/// Derive one child scope for a repeatable container.
///
/// Deterministic append; repeatable containers (lists, item banks) call this
/// once per rendered copy, typically with
/// `segment = containerId:indexOrAttemptTag`.
pub fn extend_scope(scope: &ScopePrefix, segment: impl Into<String>) -> ScopePrefix {
    scope.extend(segment)
}

/// Reactive-store identity of one instance: scope prefix joined onto the
/// canonical key.
///
/// Two instances of the same static node under different prefixes get
/// distinct scoped state keys and therefore independent state; instances
/// under the same prefix share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopedStateKey(String);

impl ScopedStateKey {
    /// Join a scope prefix onto a bare identifier.
    pub fn new(scope: &ScopePrefix, bare: &str) -> Self {
        if scope.is_root() {
            Self(bare.to_string())
        } else {
            Self(format!("{scope}{SCOPE_SEPARATOR}{bare}"))
        }
    }

    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopedStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
