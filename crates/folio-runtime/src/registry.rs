//! Component registry.
//!
//! Maps component tags to typed handler descriptors: setup closure,
//! attribute schema, and child-scope strategy. The registry is an explicit
//! value injected into every `resolve` call, so multiple graph versions and
//! tests run concurrently without cross-contamination, and dispatch is a
//! closed tagged lookup rather than open-ended reflection.

use indexmap::IndexMap;

use folio_expr::Value;

use crate::handle::{Deferred, HandlerFailure};
use crate::ident::{ScopePrefix, ScopedStateKey};
use crate::state::StateStore;

/// Expected kind of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// Any value accepted
    Any,
    /// String
    Str,
    /// Number
    Number,
    /// Boolean
    Bool,
    /// List
    List,
    /// Object
    Object,
}

impl AttrKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            AttrKind::Any => true,
            AttrKind::Str => matches!(value, Value::Str(_)),
            AttrKind::Number => matches!(value, Value::Number(_)),
            AttrKind::Bool => matches!(value, Value::Bool(_)),
            AttrKind::List => matches!(value, Value::List(_)),
            AttrKind::Object => matches!(value, Value::Object(_)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            AttrKind::Any => "any value",
            AttrKind::Str => "a string",
            AttrKind::Number => "a number",
            AttrKind::Bool => "a boolean",
            AttrKind::List => "a list",
            AttrKind::Object => "an object",
        }
    }
}

/// Declared shape of one attribute.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    /// Attribute name
    pub name: &'static str,
    /// Must the author supply it?
    pub required: bool,
    /// Expected value kind
    pub kind: AttrKind,
    /// Default filled into the instance when absent (never into the store)
    pub default: Option<Value>,
}

/// One offending attribute, for author-facing diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeProblem {
    /// The offending field
    pub field: String,
    /// What is wrong with it
    pub detail: String,
}

/// Attribute schema declared by a component handler.
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    specs: Vec<AttrSpec>,
}

impl AttributeSchema {
    /// Create a schema from attribute specs.
    pub fn new(specs: Vec<AttrSpec>) -> Self {
        Self { specs }
    }

    /// Validate authored attributes against the schema.
    ///
    /// On success, returns the attribute map with schema defaults filled in.
    /// On failure, collects every offending field so authors fix them all in
    /// one pass. Attributes outside the schema pass through untouched.
    pub fn validate(
        &self,
        attributes: &IndexMap<String, Value>,
    ) -> std::result::Result<IndexMap<String, Value>, Vec<AttributeProblem>> {
        let mut problems = Vec::new();
        let mut merged = attributes.clone();

        for spec in &self.specs {
            match attributes.get(spec.name) {
                Some(value) => {
                    if !spec.kind.accepts(value) {
                        problems.push(AttributeProblem {
                            field: spec.name.to_string(),
                            detail: format!(
                                "expected {}, got {}",
                                spec.kind.describe(),
                                value.kind()
                            ),
                        });
                    }
                }
                None => {
                    if let Some(default) = &spec.default {
                        merged.insert(spec.name.to_string(), default.clone());
                    } else if spec.required {
                        problems.push(AttributeProblem {
                            field: spec.name.to_string(),
                            detail: "required attribute is missing".to_string(),
                        });
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(merged)
        } else {
            Err(problems)
        }
    }
}

/// How a component derives scopes for its kids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildScopeStrategy {
    /// Kids resolve under the parent's scope unchanged.
    #[default]
    Inherit,
    /// Repeatable container: each kid gets its own scope,
    /// `extend_scope(scope, "containerId:index")`.
    PerKid,
}

/// What a handler's setup produced.
pub enum Setup {
    /// Setup finished synchronously with this value.
    Ready(Value),
    /// Setup finishes later; the handler keeps a clone of the deferred and
    /// completes it when its work lands.
    Deferred(Deferred),
}

/// Context passed to a handler's setup.
pub struct SetupContext<'a> {
    /// Component tag being instantiated
    pub tag: &'a str,
    /// Reactive-store identity of this instance
    pub state_key: &'a ScopedStateKey,
    /// Scope the instance lives under
    pub scope: &'a ScopePrefix,
    /// Merged attributes (overrides and schema defaults applied)
    pub attributes: &'a IndexMap<String, Value>,
    /// Reactive store, when the engine was built with one
    pub store: Option<&'a dyn StateStore>,
}

/// Handler setup function.
pub type SetupFn = Box<dyn Fn(&SetupContext<'_>) -> std::result::Result<Setup, HandlerFailure>>;

/// Descriptor for a registered component.
pub struct ComponentSpec {
    /// Markup tag (e.g., "Choice", "ItemList")
    pub tag: &'static str,
    /// Documentation string
    pub doc: &'static str,
    /// Attribute schema, when the handler declares one
    pub attribute_schema: Option<AttributeSchema>,
    /// Tag this component must be nested directly under, when constrained
    /// (e.g., an answer option only makes sense inside its question)
    pub requires_parent: Option<&'static str>,
    /// Scope derivation for kids
    pub child_scope: ChildScopeStrategy,
    /// Setup invoked once per instance
    pub setup: SetupFn,
}

impl ComponentSpec {
    /// A minimal spec with no schema, inherited child scope, and a setup that
    /// produces no value. Useful for display-only components and tests.
    pub fn passive(tag: &'static str, doc: &'static str) -> Self {
        Self {
            tag,
            doc,
            attribute_schema: None,
            requires_parent: None,
            child_scope: ChildScopeStrategy::Inherit,
            setup: Box::new(|_| Ok(Setup::Ready(Value::Undefined))),
        }
    }
}

/// Registry of component handlers, keyed by tag.
#[derive(Default)]
pub struct ComponentRegistry {
    specs: IndexMap<&'static str, ComponentSpec>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. A later registration with the same tag wins.
    pub fn register(&mut self, spec: ComponentSpec) {
        self.specs.insert(spec.tag, spec);
    }

    /// Look up a component by tag.
    pub fn get(&self, tag: &str) -> Option<&ComponentSpec> {
        self.specs.get(tag)
    }

    /// Check whether a tag has a registered handler.
    pub fn is_known(&self, tag: &str) -> bool {
        self.specs.contains_key(tag)
    }

    /// All registered tags.
    pub fn all_tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AttributeSchema {
        AttributeSchema::new(vec![
            AttrSpec {
                name: "prompt",
                required: true,
                kind: AttrKind::Str,
                default: None,
            },
            AttrSpec {
                name: "limit",
                required: false,
                kind: AttrKind::Number,
                default: Some(Value::Number(1.0)),
            },
        ])
    }

    #[test]
    fn test_validate_fills_defaults() {
        let mut attrs = IndexMap::new();
        attrs.insert("prompt".to_string(), Value::Str("pick one".into()));
        let merged = schema().validate(&attrs).unwrap();
        assert_eq!(merged.get("limit"), Some(&Value::Number(1.0)));
        // The input map is untouched.
        assert!(!attrs.contains_key("limit"));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let mut attrs = IndexMap::new();
        attrs.insert("limit".to_string(), Value::Str("three".into()));
        let problems = schema().validate(&attrs).unwrap_err();
        let fields: Vec<&str> = problems.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["prompt", "limit"]);
    }

    #[test]
    fn test_unknown_attributes_pass_through() {
        let mut attrs = IndexMap::new();
        attrs.insert("prompt".to_string(), Value::Str("pick".into()));
        attrs.insert("theme".to_string(), Value::Str("dark".into()));
        let merged = schema().validate(&attrs).unwrap();
        assert_eq!(merged.get("theme"), Some(&Value::Str("dark".into())));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ComponentRegistry::new();
        registry.register(ComponentSpec::passive("Passage", "Static prose"));
        assert!(registry.is_known("Passage"));
        assert!(!registry.is_known("Unknown"));
    }
}
