//! End-to-end flow: resolve a scoped instance, record a response, gate
//! progression, grade the answer.

use std::rc::Rc;

use indexmap::IndexMap;

use folio_expr::{create_context, ContextSeed, Value};
use folio_grade::{Gate, GradeSpec, Grader, Outcome};
use folio_runtime::{
    ChildScopeStrategy, ComponentRegistry, ComponentSpec, Engine, GraphBuilder, GraphVersion,
    KidRef, MemoryStateStore, ResolveInput, ScopePrefix, Setup, SourceRef, StateStore, StaticNode,
};

fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register(ComponentSpec::passive("Question", "A gradable item"));
    registry.register(ComponentSpec {
        tag: "ItemBank",
        doc: "Adaptive item bank: one scope per drawn item",
        attribute_schema: None,
        requires_parent: None,
        child_scope: ChildScopeStrategy::PerKid,
        setup: Box::new(|_| Ok(Setup::Ready(Value::Undefined))),
    });
    registry
}

#[test]
fn test_resolve_record_gate_grade() {
    // The bank draws the same question twice; each draw has its own state.
    let mut builder = GraphBuilder::new();
    builder.add_node(StaticNode {
        key: "bank".into(),
        tag: "ItemBank".to_string(),
        attributes: IndexMap::new(),
        kids: vec![KidRef::reference("q"), KidRef::reference("q")],
        provenance: vec![SourceRef::new("lesson.fml", 0, 40)],
    });
    builder.add_node(StaticNode {
        key: "q".into(),
        tag: "Question".to_string(),
        attributes: IndexMap::new(),
        kids: vec![],
        provenance: vec![SourceRef::new("lesson.fml", 41, 80)],
    });
    let graph = Rc::new(builder.publish(GraphVersion::initial()));

    let store = MemoryStateStore::new();
    let engine = Engine::new(graph);
    let registry = registry();

    let handle = engine
        .resolve(ResolveInput::Reference("bank"), &ScopePrefix::root(), &registry)
        .unwrap();
    assert!(!handle.is_pending());

    // The learner answers the first draw correctly, the second not at all.
    let first_scope = ScopePrefix::from("bank:0");
    let first_key = folio_runtime::ScopedStateKey::new(&first_scope, "q");
    store.set(&first_key, "value", Value::Number(42.0));
    store.set(&first_key, "done", Value::Bool(true));

    // Gate on the recorded state.
    let gate = Gate::new();
    let mut state = IndexMap::new();
    let mut q = IndexMap::new();
    for field in store.fields(&first_key) {
        if let Some(value) = store.get(&first_key, &field) {
            q.insert(field, value);
        }
    }
    state.insert("q".to_string(), Value::Object(q));
    let ctx = create_context(ContextSeed {
        component_state: Some(state),
        ..Default::default()
    });
    assert!(gate.evaluate("@q.done && isDefined(@q.value)", &ctx).unwrap());

    // Grade the answered draw; the unanswered draw has no state.
    let grader = Grader::new(&store);
    let verdict = grader
        .grade("q", &first_scope, GradeSpec::Expression("@q.value === 42"))
        .unwrap();
    assert_eq!(verdict.outcome, Outcome::Correct);
    assert_eq!(verdict.key.as_str(), "bank:0:q");

    let unanswered = grader.grade(
        "q",
        &ScopePrefix::from("bank:1"),
        GradeSpec::Expression("@q.value === 42"),
    );
    assert!(unanswered.is_err());
}
