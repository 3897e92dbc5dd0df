//! Built-in identifier namespaces.
//!
//! Bare identifiers resolve against these before caller-supplied bindings:
//! fixed-vocabulary status enumerations first, then the numeric namespace.

use super::Value;
use indexmap::IndexMap;

/// Look up a built-in namespace object by identifier.
pub(crate) fn lookup(name: &str) -> Option<Value> {
    match name {
        "correctness" => Some(enumeration(&[
            "correct",
            "incorrect",
            "partiallyCorrect",
            "unanswered",
        ])),
        "progress" => Some(enumeration(&["notStarted", "inProgress", "complete"])),
        "math" => Some(math_namespace()),
        _ => None,
    }
}

/// Build an enumeration object whose members are their own names as strings.
fn enumeration(members: &[&str]) -> Value {
    let mut map = IndexMap::new();
    for member in members {
        map.insert(member.to_string(), Value::Str(member.to_string()));
    }
    Value::Object(map)
}

/// The built-in numeric namespace.
fn math_namespace() -> Value {
    let mut map = IndexMap::new();
    map.insert("pi".to_string(), Value::Number(std::f64::consts::PI));
    map.insert("e".to_string(), Value::Number(std::f64::consts::E));
    map.insert("tau".to_string(), Value::Number(std::f64::consts::TAU));
    map.insert("inf".to_string(), Value::Number(f64::INFINITY));
    Value::Object(map)
}
