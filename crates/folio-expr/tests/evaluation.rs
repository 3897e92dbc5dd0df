//! End-to-end evaluation tests for the expression language.
//!
//! Covers the grading/gating patterns authors actually write: sigil state
//! reads, enumeration comparison, defensive access to missing state,
//! short-circuit predicates, interpolation, and option bags.

use folio_expr::{
    create_context, evaluate, parse, Arity, ContextSeed, EvalError, FunctionDescriptor,
    FunctionRegistry, Value,
};
use indexmap::IndexMap;

fn object(entries: &[(&str, Value)]) -> Value {
    let mut map = IndexMap::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value.clone());
    }
    Value::Object(map)
}

fn state_ctx(entries: &[(&str, Value)]) -> folio_expr::EvalContext {
    let mut state = IndexMap::new();
    for (key, value) in entries {
        state.insert(key.to_string(), value.clone());
    }
    create_context(ContextSeed {
        component_state: Some(state),
        ..Default::default()
    })
}

fn eval_ok(source: &str, ctx: &folio_expr::EvalContext) -> Value {
    let expr = parse(source).unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"));
    evaluate(&expr, ctx).unwrap_or_else(|e| panic!("eval failed for {source:?}: {e}"))
}

#[test]
fn test_correctness_comparison_true_and_false() {
    // The canonical grading condition.
    let ctx = state_ctx(&[("q", object(&[("correct", Value::Str("correct".into()))]))]);
    assert_eq!(
        eval_ok("@q.correct === correctness.correct", &ctx),
        Value::Bool(true)
    );

    let ctx = state_ctx(&[("q", object(&[("correct", Value::Str("incorrect".into()))]))]);
    assert_eq!(
        eval_ok("@q.correct === correctness.correct", &ctx),
        Value::Bool(false)
    );
}

#[test]
fn test_missing_sigil_reference_is_undefined() {
    let ctx = create_context(ContextSeed::default());
    assert_eq!(eval_ok("@maybeMissing", &ctx), Value::Undefined);
    assert_eq!(eval_ok("@maybeMissing.value", &ctx), Value::Undefined);
    assert_eq!(eval_ok("isDefined(@maybeMissing.value)", &ctx), Value::Bool(false));
}

#[test]
fn test_purity_same_inputs_same_result() {
    let ctx = state_ctx(&[("q", object(&[("score", Value::Number(0.75))]))]);
    let expr = parse("@q.score * 100 >= 50").unwrap();
    let first = evaluate(&expr, &ctx);
    let second = evaluate(&expr, &ctx);
    assert_eq!(first, second);
    assert_eq!(first, Ok(Value::Bool(true)));
}

#[test]
fn test_three_namespaces_are_distinct() {
    let mut content = IndexMap::new();
    content.insert("intro".to_string(), object(&[("text", Value::Str("two words".into()))]));
    let mut globals = IndexMap::new();
    globals.insert("threshold".to_string(), Value::Number(2.0));
    let mut state = IndexMap::new();
    state.insert("intro".to_string(), object(&[("seen", Value::Bool(true))]));

    let ctx = create_context(ContextSeed {
        component_state: Some(state),
        content: Some(content),
        globals: Some(globals),
        ..Default::default()
    });

    assert_eq!(eval_ok("@intro.seen", &ctx), Value::Bool(true));
    assert_eq!(
        eval_ok("wordCount($intro.text) >= &threshold", &ctx),
        Value::Bool(true)
    );
}

#[test]
fn test_every_short_circuits() {
    // Second element fails the predicate; scanning stops there.
    let items = Value::List(vec![
        object(&[("done", Value::Bool(true))]),
        object(&[("done", Value::Bool(false))]),
        Value::Undefined,
    ]);
    let ctx = state_ctx(&[("items", items)]);
    assert_eq!(
        eval_ok("@items.every(k => k.done)", &ctx),
        Value::Bool(false)
    );
}

#[test]
fn test_some_and_filter() {
    let items = Value::List(vec![
        object(&[("score", Value::Number(0.2))]),
        object(&[("score", Value::Number(0.9))]),
        object(&[("score", Value::Number(0.8))]),
    ]);
    let ctx = state_ctx(&[("items", items)]);

    assert_eq!(
        eval_ok("@items.some(k => k.score > 0.5)", &ctx),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("@items.filter(k => k.score > 0.5).length", &ctx),
        Value::Number(2.0)
    );
}

#[test]
fn test_length_property() {
    let ctx = state_ctx(&[
        ("items", Value::List(vec![Value::Number(1.0), Value::Number(2.0)])),
        ("name", Value::Str("abc".into())),
    ]);
    assert_eq!(eval_ok("@items.length", &ctx), Value::Number(2.0));
    assert_eq!(eval_ok("@name.length", &ctx), Value::Number(3.0));
}

#[test]
fn test_logical_short_circuit_returns_operand() {
    let ctx = state_ctx(&[("q", object(&[("score", Value::Number(3.0))]))]);
    assert_eq!(eval_ok("@q.score || 10", &ctx), Value::Number(3.0));
    assert_eq!(eval_ok("@missing.score || 10", &ctx), Value::Number(10.0));
    assert_eq!(eval_ok("@missing && @missing.boom()", &ctx), Value::Undefined);
}

#[test]
fn test_ternary() {
    let ctx = state_ctx(&[("q", object(&[("score", Value::Number(0.9))]))]);
    assert_eq!(
        eval_ok("@q.score >= 0.5 ? 'pass' : 'fail'", &ctx),
        Value::Str("pass".into())
    );
}

#[test]
fn test_template_interpolation() {
    let ctx = state_ctx(&[("q", object(&[("score", Value::Number(4.0))]))]);
    assert_eq!(
        eval_ok("`score: ${@q.score} of ${2 + 3}`", &ctx),
        Value::Str("score: 4 of 5".into())
    );
}

#[test]
fn test_object_bag_to_registered_function() {
    let mut functions = FunctionRegistry::new();
    functions.register(FunctionDescriptor {
        name: "grade",
        signature: "grade(score, options) -> boolean",
        doc: "Test helper reading an option bag",
        arity: Arity::Fixed(2),
        implementation: |args| {
            let score = args[0].as_number().unwrap_or(0.0);
            let cutoff = args[1].get("cutoff").as_number().unwrap_or(1.0);
            Ok(Value::Bool(score >= cutoff))
        },
    });
    let ctx = create_context(ContextSeed {
        functions: Some(functions),
        ..Default::default()
    });
    assert_eq!(
        eval_ok("grade(0.7, { cutoff: 0.6 })", &ctx),
        Value::Bool(true)
    );
}

#[test]
fn test_unknown_function_fails_fast() {
    let ctx = create_context(ContextSeed::default());
    let expr = parse("launchRockets(1)").unwrap();
    assert_eq!(
        evaluate(&expr, &ctx),
        Err(EvalError::UnknownFunction {
            name: "launchRockets".into()
        })
    );
}

#[test]
fn test_nullish_method_call_is_descriptive() {
    let ctx = create_context(ContextSeed::default());
    let expr = parse("@items.every(k => k.done)").unwrap();
    let err = evaluate(&expr, &ctx).expect_err("receiver is undefined");
    match err {
        EvalError::NullishMethodCall { method, receiver } => {
            assert_eq!(method, "every");
            assert_eq!(receiver, "@items");
        }
        other => panic!("expected NullishMethodCall, got {other:?}"),
    }
}

#[test]
fn test_loose_vs_strict_equality() {
    let ctx = state_ctx(&[("q", object(&[("answer", Value::Str("3".into()))]))]);
    assert_eq!(eval_ok("@q.answer == 3", &ctx), Value::Bool(true));
    assert_eq!(eval_ok("@q.answer === 3", &ctx), Value::Bool(false));
    assert_eq!(eval_ok("@q.answer === '3'", &ctx), Value::Bool(true));
}

#[test]
fn test_word_count_helper_always_available() {
    let mut content = IndexMap::new();
    content.insert(
        "essay".to_string(),
        object(&[("text", Value::Str("one two three four five".into()))]),
    );
    let ctx = create_context(ContextSeed {
        content: Some(content),
        ..Default::default()
    });
    assert_eq!(eval_ok("wordCount($essay.text)", &ctx), Value::Number(5.0));
}

#[test]
fn test_string_concatenation() {
    let ctx = create_context(ContextSeed::default());
    assert_eq!(
        eval_ok("'attempt ' + 2", &ctx),
        Value::Str("attempt 2".into())
    );
}
