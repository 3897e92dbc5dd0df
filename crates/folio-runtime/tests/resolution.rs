//! Integration tests for the resolution/render engine.
//!
//! Exercises the identity, scoping, caching, and degradation behavior of the
//! engine against small published graphs.

use std::cell::Cell;
use std::rc::Rc;

use indexmap::IndexMap;

use folio_runtime::{
    AttrKind, AttrSpec, AttributeSchema, ChildScopeStrategy, ComponentRegistry, ComponentSpec,
    Deferred, Engine, GraphBuilder, GraphVersion, Handle, HandlerFailure, InlineError, Instance,
    KidRef, ResolveInput, ScopePrefix, Setup, Settlement, SourceRef, StateStore, StaticNode,
    Value,
};

fn node(key: &str, tag: &str, kids: Vec<KidRef>) -> StaticNode {
    StaticNode {
        key: key.into(),
        tag: tag.to_string(),
        attributes: IndexMap::new(),
        kids,
        provenance: vec![SourceRef::new("doc.fml", 0, 0)],
    }
}

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(ComponentSpec::passive("Passage", "Static prose"));
    registry.register(ComponentSpec {
        tag: "ItemList",
        doc: "Repeatable container: one child scope per kid",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::PerKid,
        setup: Box::new(|_| Ok(Setup::Ready(Value::Undefined))),
    });
    registry
}

fn fulfilled(handle: &Handle) -> Rc<Instance> {
    match handle.try_get() {
        Some(Settlement::Fulfilled(instance)) => instance,
        other => panic!("expected fulfilled handle, got {other:?}"),
    }
}

fn component(handle: &Handle) -> folio_runtime::ComponentInstance {
    match &*fulfilled(handle) {
        Instance::Component(component) => component.clone(),
        other => panic!("expected component instance, got {other:?}"),
    }
}

fn inline_error(handle: &Handle) -> InlineError {
    match &*fulfilled(handle) {
        Instance::Error(error) => error.clone(),
        other => panic!("expected inline error, got {other:?}"),
    }
}

#[test]
fn test_resolution_identity() {
    // Two calls with equal (node, scope, overrides) return the same handle
    // object, not merely an equal one.
    let mut builder = GraphBuilder::new();
    builder.add_node(node("intro", "Passage", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();
    let scope = ScopePrefix::root();

    let first = engine
        .resolve(ResolveInput::Reference("intro"), &scope, &registry)
        .unwrap();
    let second = engine
        .resolve(ResolveInput::Reference("intro"), &scope, &registry)
        .unwrap();

    assert!(Handle::same(&first, &second));
}

#[test]
fn test_scope_independence() {
    let mut builder = GraphBuilder::new();
    builder.add_node(node("q", "Passage", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let scope = ScopePrefix::root();
    let a = engine
        .resolve(
            ResolveInput::Reference("q"),
            &folio_runtime::extend_scope(&scope, "0"),
            &registry,
        )
        .unwrap();
    let b = engine
        .resolve(
            ResolveInput::Reference("q"),
            &folio_runtime::extend_scope(&scope, "1"),
            &registry,
        )
        .unwrap();

    assert!(!Handle::same(&a, &b));
    assert_eq!(component(&a).state_key.as_str(), "0:q");
    assert_eq!(component(&b).state_key.as_str(), "1:q");
}

#[test]
fn test_unknown_tag_inline_error() {
    // Graph contains "btn" with tag "Action"; "Action" is unregistered.
    let mut builder = GraphBuilder::new();
    builder.add_node(node("btn", "Action", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("btn"), &ScopePrefix::root(), &registry)
        .unwrap();

    match inline_error(&handle) {
        InlineError::UnknownTag { tag, key } => {
            assert_eq!(tag, "Action");
            assert_eq!(key, "btn");
        }
        other => panic!("expected UnknownTag, got {other:?}"),
    }
}

#[test]
fn test_missing_key_inline_error() {
    let builder = GraphBuilder::new();
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(
            ResolveInput::Reference("ghost"),
            &ScopePrefix::root(),
            &registry,
        )
        .unwrap();

    match inline_error(&handle) {
        InlineError::NotFoundInGraph { key } => assert_eq!(key.as_str(), "ghost"),
        other => panic!("expected NotFoundInGraph, got {other:?}"),
    }

    // The error hole is cached like any other instance.
    let again = engine
        .resolve(
            ResolveInput::Reference("ghost"),
            &ScopePrefix::root(),
            &registry,
        )
        .unwrap();
    assert!(Handle::same(&handle, &again));
}

#[test]
fn test_list_container_derives_three_scopes() {
    // A list resolving the same node three times produces three distinct
    // handles whose state keys differ only in the numeric segment.
    let mut builder = GraphBuilder::new();
    builder.add_node(node(
        "list",
        "ItemList",
        vec![
            KidRef::reference("q"),
            KidRef::reference("q"),
            KidRef::reference("q"),
        ],
    ));
    builder.add_node(node("q", "Passage", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("list"), &ScopePrefix::root(), &registry)
        .unwrap();
    let list = component(&handle);
    assert_eq!(list.kids.len(), 3);

    let keys: Vec<String> = list
        .kids
        .iter()
        .map(|kid| component(kid).state_key.to_string())
        .collect();
    assert_eq!(keys, vec!["list:0:q", "list:1:q", "list:2:q"]);

    assert!(!Handle::same(&list.kids[0], &list.kids[1]));
    assert!(!Handle::same(&list.kids[1], &list.kids[2]));
}

#[test]
fn test_absolute_reference_shares_instance_across_scopes() {
    let mut builder = GraphBuilder::new();
    builder.add_node(node(
        "list",
        "ItemList",
        vec![KidRef::reference("/shared"), KidRef::reference("/shared")],
    ));
    builder.add_node(node("shared", "Passage", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("list"), &ScopePrefix::root(), &registry)
        .unwrap();
    let list = component(&handle);

    // Both kids bypass the scope prefix: one logical instance, one handle.
    assert!(Handle::same(&list.kids[0], &list.kids[1]));
    assert_eq!(component(&list.kids[0]).state_key.as_str(), "shared");
}

#[test]
fn test_override_produces_distinct_instance() {
    let mut builder = GraphBuilder::new();
    let mut q = node("q", "Passage", vec![]);
    q.attributes.insert("limit".to_string(), Value::Number(1.0));
    builder.add_node(q);
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();
    let scope = ScopePrefix::root();

    let plain = engine
        .resolve(ResolveInput::Reference("q"), &scope, &registry)
        .unwrap();

    let mut overrides = IndexMap::new();
    overrides.insert("limit".to_string(), Value::Number(3.0));
    let overridden_kid = KidRef::Ref {
        reference: "q".to_string(),
        overrides,
    };
    let overridden = engine
        .resolve(ResolveInput::Node(&overridden_kid), &scope, &registry)
        .unwrap();

    assert!(!Handle::same(&plain, &overridden));
    assert_eq!(
        component(&plain).attributes.get("limit"),
        Some(&Value::Number(1.0))
    );
    assert_eq!(
        component(&overridden).attributes.get("limit"),
        Some(&Value::Number(3.0))
    );

    // The store still holds the unmodified node.
    assert_eq!(
        engine.graph().lookup(&"q".into()).unwrap().attributes.get("limit"),
        Some(&Value::Number(1.0))
    );
}

#[test]
fn test_attribute_validation_names_offending_fields() {
    let mut registry = registry();
    registry.register(ComponentSpec {
        tag: "Choice",
        doc: "Selectable answer",
        attribute_schema: Some(AttributeSchema::new(vec![AttrSpec {
            name: "prompt",
            required: true,
            kind: AttrKind::Str,
            default: None,
        }])),
        requires_parent: None,
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(|_| Ok(Setup::Ready(Value::Undefined))),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("pick", "Choice", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));

    let handle = engine
        .resolve(ResolveInput::Reference("pick"), &ScopePrefix::root(), &registry)
        .unwrap();

    match inline_error(&handle) {
        InlineError::AttributeValidationFailed { tag, problems, .. } => {
            assert_eq!(tag, "Choice");
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].field, "prompt");
        }
        other => panic!("expected AttributeValidationFailed, got {other:?}"),
    }
}

#[test]
fn test_bad_kid_does_not_blank_parent() {
    let mut builder = GraphBuilder::new();
    builder.add_node(node(
        "page",
        "Passage",
        vec![
            KidRef::Text("before".to_string()),
            KidRef::reference("ghost"),
            KidRef::Text("after".to_string()),
        ],
    ));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("page"), &ScopePrefix::root(), &registry)
        .unwrap();
    let page = component(&handle);
    assert_eq!(page.kids.len(), 3);

    assert!(matches!(&*fulfilled(&page.kids[0]), Instance::Text(t) if t == "before"));
    assert!(matches!(
        inline_error(&page.kids[1]),
        InlineError::NotFoundInGraph { .. }
    ));
    assert!(matches!(&*fulfilled(&page.kids[2]), Instance::Text(t) if t == "after"));
}

#[test]
fn test_handler_failure_rejects_handle() {
    let mut registry = registry();
    registry.register(ComponentSpec {
        tag: "Flaky",
        doc: "Always fails setup",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(|cx| {
            Err(HandlerFailure::new(cx.tag, "setup exploded"))
        }),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("bad", "Flaky", vec![]));
    builder.add_node(node(
        "page",
        "Passage",
        vec![KidRef::reference("bad"), KidRef::Text("still here".to_string())],
    ));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));

    let handle = engine
        .resolve(ResolveInput::Reference("page"), &ScopePrefix::root(), &registry)
        .unwrap();

    // The parent still fulfils; the failed child carries its own diagnostic.
    let page = component(&handle);
    match page.kids[0].try_get() {
        Some(Settlement::Rejected(failure)) => {
            assert_eq!(failure.tag, "Flaky");
            assert!(failure.message.contains("setup exploded"));
        }
        other => panic!("expected rejected child, got {other:?}"),
    }
}

#[test]
fn test_deferred_setup_suspends_then_settles() {
    let slot: Rc<Cell<Option<Deferred>>> = Rc::new(Cell::new(None));
    let slot_for_setup = slot.clone();

    let mut registry = registry();
    registry.register(ComponentSpec {
        tag: "Loader",
        doc: "Completes setup later",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(move |_| {
            let deferred = Deferred::new();
            slot_for_setup.set(Some(deferred.clone()));
            Ok(Setup::Deferred(deferred))
        }),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("widget", "Loader", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let scope = ScopePrefix::root();

    let handle = engine
        .resolve(ResolveInput::Reference("widget"), &scope, &registry)
        .unwrap();
    assert!(handle.is_pending());

    // A re-entrant request while suspended observes the identical pending
    // handle; the handler runs once.
    let retry = engine
        .resolve(ResolveInput::Reference("widget"), &scope, &registry)
        .unwrap();
    assert!(Handle::same(&handle, &retry));

    let notified = Rc::new(Cell::new(false));
    let flag = notified.clone();
    handle.subscribe(move |_| flag.set(true));

    let deferred = slot.take().expect("setup ran exactly once");
    deferred.fulfill(Value::Str("loaded".into()));

    assert!(notified.get());
    assert_eq!(component(&handle).value, Value::Str("loaded".into()));
}

#[test]
fn test_parent_pends_until_deferred_child_settles() {
    let slot: Rc<Cell<Option<Deferred>>> = Rc::new(Cell::new(None));
    let slot_for_setup = slot.clone();

    let mut registry = registry();
    registry.register(ComponentSpec {
        tag: "Loader",
        doc: "Completes setup later",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(move |_| {
            let deferred = Deferred::new();
            slot_for_setup.set(Some(deferred.clone()));
            Ok(Setup::Deferred(deferred))
        }),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("widget", "Loader", vec![]));
    builder.add_node(node("page", "Passage", vec![KidRef::reference("widget")]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));

    let handle = engine
        .resolve(ResolveInput::Reference("page"), &ScopePrefix::root(), &registry)
        .unwrap();
    assert!(handle.is_pending());

    slot.take().unwrap().fulfill(Value::Bool(true));
    let page = component(&handle);
    assert_eq!(page.kids.len(), 1);
    assert!(!page.kids[0].is_pending());
}

#[test]
fn test_cycle_detected_as_inline_error() {
    // a -> b -> a: the re-entry renders as an error hole instead of
    // recursing without bound.
    let mut builder = GraphBuilder::new();
    builder.add_node(node("a", "Passage", vec![KidRef::reference("b")]));
    builder.add_node(node("b", "Passage", vec![KidRef::reference("a")]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("a"), &ScopePrefix::root(), &registry)
        .unwrap();

    let a = component(&handle);
    let b = component(&a.kids[0]);
    match inline_error(&b.kids[0]) {
        InlineError::CycleDetected { key } => assert!(key.contains('a')),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn test_dag_share_is_not_a_cycle() {
    // Two siblings referencing the same node share one handle; no cycle.
    let mut builder = GraphBuilder::new();
    builder.add_node(node(
        "page",
        "Passage",
        vec![KidRef::reference("shared"), KidRef::reference("shared")],
    ));
    builder.add_node(node("shared", "Passage", vec![]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("page"), &ScopePrefix::root(), &registry)
        .unwrap();
    let page = component(&handle);

    assert!(Handle::same(&page.kids[0], &page.kids[1]));
    assert!(matches!(&*fulfilled(&page.kids[0]), Instance::Component(_)));
}

#[test]
fn test_kids_resolve_in_authored_order() {
    let mut builder = GraphBuilder::new();
    builder.add_node(node(
        "page",
        "Passage",
        vec![
            KidRef::Text("one".to_string()),
            KidRef::Text("two".to_string()),
            KidRef::Text("three".to_string()),
        ],
    ));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    let handles = engine
        .resolve_kids(
            &engine.graph().lookup(&"page".into()).unwrap().kids.clone(),
            &ScopePrefix::root(),
            &registry,
        )
        .unwrap();

    let texts: Vec<String> = handles
        .iter()
        .map(|h| match &*fulfilled(h) {
            Instance::Text(t) => t.clone(),
            other => panic!("expected text, got {other:?}"),
        })
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[test]
fn test_inline_fragments_do_not_collide() {
    // Structurally identical fragments at different authored locations are
    // distinct instances.
    let fragment_at = |start: u32| KidRef::Fragment {
        anchor: SourceRef::new("doc.fml", start, start + 5),
        tag: "Passage".to_string(),
        attributes: IndexMap::new(),
        kids: vec![],
    };

    let builder = GraphBuilder::new();
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();
    let scope = ScopePrefix::root();

    let first_kid = fragment_at(10);
    let second_kid = fragment_at(90);
    let first = engine
        .resolve(ResolveInput::Node(&first_kid), &scope, &registry)
        .unwrap();
    let second = engine
        .resolve(ResolveInput::Node(&second_kid), &scope, &registry)
        .unwrap();
    assert!(!Handle::same(&first, &second));

    // The same authored fragment resolves to the same handle.
    let again = engine
        .resolve(ResolveInput::Node(&first_kid), &scope, &registry)
        .unwrap();
    assert!(Handle::same(&first, &again));
}

#[test]
fn test_malformed_reference_fails_fast_at_top_level() {
    let builder = GraphBuilder::new();
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));
    let registry = registry();

    assert!(engine
        .resolve(ResolveInput::Reference("a:b"), &ScopePrefix::root(), &registry)
        .is_err());
    assert!(engine
        .resolve(ResolveInput::Reference(""), &ScopePrefix::root(), &registry)
        .is_err());
}

#[test]
fn test_parent_constrained_component() {
    let mut registry = registry();
    registry.register(ComponentSpec::passive("Choice", "Selectable question"));
    registry.register(ComponentSpec {
        tag: "Option",
        doc: "One selectable answer",
        attribute_schema: None,
        requires_parent: Some("Choice"),
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(|_| Ok(Setup::Ready(Value::Undefined))),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("opt", "Option", vec![]));
    builder.add_node(node("pick", "Choice", vec![KidRef::reference("opt")]));
    let engine = Engine::new(Rc::new(builder.publish(GraphVersion::initial())));

    // Resolved from the top level: misplaced. The error is not cached, so
    // it cannot shadow a later well-placed resolution.
    let stray = engine
        .resolve(ResolveInput::Reference("opt"), &ScopePrefix::root(), &registry)
        .unwrap();
    match inline_error(&stray) {
        InlineError::MisplacedComponent { tag, requires, .. } => {
            assert_eq!(tag, "Option");
            assert_eq!(requires, "Choice");
        }
        other => panic!("expected MisplacedComponent, got {other:?}"),
    }

    // Nested under its required parent: resolves normally.
    let pick = component(
        &engine
            .resolve(ResolveInput::Reference("pick"), &ScopePrefix::root(), &registry)
            .unwrap(),
    );
    assert!(matches!(&*fulfilled(&pick.kids[0]), Instance::Component(_)));
}

#[test]
fn test_setup_reads_initial_state_from_store() {
    let store = Rc::new(folio_runtime::MemoryStateStore::new());
    let seeded_key = folio_runtime::ScopedStateKey::new(&ScopePrefix::root(), "q");
    store.set(&seeded_key, "answer", Value::Str("cached".into()));

    let mut registry = registry();
    registry.register(ComponentSpec {
        tag: "Response",
        doc: "Restores a prior answer from the store",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::Inherit,
        setup: Box::new(|cx| {
            let restored = cx
                .store
                .and_then(|store| store.get(cx.state_key, "answer"))
                .unwrap_or(Value::Undefined);
            Ok(Setup::Ready(restored))
        }),
    });

    let mut builder = GraphBuilder::new();
    builder.add_node(node("q", "Response", vec![]));
    let engine = Engine::with_state_store(
        Rc::new(builder.publish(GraphVersion::initial())),
        store,
    );

    let handle = engine
        .resolve(ResolveInput::Reference("q"), &ScopePrefix::root(), &registry)
        .unwrap();
    assert_eq!(component(&handle).value, Value::Str("cached".into()));
}
