//! Condition evaluation and the operator semantics shared with validations.

use crate::{
    state::ExecutionState,
    substitute::{display_value, Substitutor},
    types::{Condition, ConditionSource, Operator},
};
use log::debug;
use serde_json::{Number, Value};

/// Check if two JSON values are equal.
///
/// Values of different JSON types are never equal. Integers compare exactly;
/// only a float on either side falls back to `f64` comparison.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => numbers_equal(l, r),
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).map_or(false, |rv| values_equal(v, rv)))
        }
        _ => false,
    }
}

fn numbers_equal(l: &Number, r: &Number) -> bool {
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (l.as_u64(), r.as_u64()) {
        return a == b;
    }
    if l.is_f64() || r.is_f64() {
        return matches!((l.as_f64(), r.as_f64()), (Some(a), Some(b)) if a == b);
    }
    // One side is negative, the other beyond i64::MAX.
    false
}

/// Substitute an expected value. Substitution always yields text, so a
/// string that held a `{{ }}` placeholder is read back as a number or
/// boolean when `actual` is one and the text spells it out. Literal strings
/// are left alone.
pub fn resolve_expected(
    template: &Value,
    actual: Option<&Value>,
    substitutor: &mut Substitutor<'_>,
) -> Value {
    let resolved = substitutor.apply(template);
    if let (Value::String(raw), Value::String(text), Some(actual)) = (template, &resolved, actual) {
        if raw.contains("{{") {
            if let Some(typed) = retype(text, actual) {
                return typed;
            }
        }
    }
    resolved
}

fn retype(text: &str, like: &Value) -> Option<Value> {
    match like {
        Value::Number(_) => serde_json::from_str::<Number>(text.trim())
            .ok()
            .map(Value::Number),
        Value::Bool(_) => match text.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Convert a JSON value to a number.
///
/// Strings are parsed, booleans count as 1 and 0; null, arrays and objects
/// have no numeric value.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Apply `operator` to an actual and an expected value.
///
/// `actual` is `None` when the value was not found. Errors describe why the
/// comparison could not be made at all (unknown operator, non-numeric
/// operand); callers treat them as a failed check.
pub fn compare(
    operator: &Operator,
    actual: Option<&Value>,
    expected: Option<&Value>,
) -> Result<bool, String> {
    let null = Value::Null;
    match operator {
        Operator::StatusCode | Operator::Equals => Ok(values_equal(
            actual.unwrap_or(&null),
            expected.unwrap_or(&null),
        )),
        Operator::NotEquals => Ok(!values_equal(
            actual.unwrap_or(&null),
            expected.unwrap_or(&null),
        )),
        Operator::Exists => Ok(actual.is_some()),
        Operator::NotExists => Ok(actual.is_none()),
        Operator::GreaterThan
        | Operator::LessThan
        | Operator::GreaterThanOrEqual
        | Operator::LessThanOrEqual => {
            let a = numeric_operand("actual", actual)?;
            let e = numeric_operand("expected", expected)?;
            Ok(match operator {
                Operator::GreaterThan => a > e,
                Operator::LessThan => a < e,
                Operator::GreaterThanOrEqual => a >= e,
                _ => a <= e,
            })
        }
        Operator::Unknown(name) => Err(format!("unknown operator '{}'", name)),
    }
}

fn numeric_operand(side: &str, value: Option<&Value>) -> Result<f64, String> {
    match value {
        Some(v) => {
            to_number(v).ok_or_else(|| format!("{} value {} is not numeric", side, v))
        }
        None => Err(format!("{} value is missing", side)),
    }
}

/// Decide whether a node runs. All conditions must hold; evaluation stops
/// at the first one that does not.
pub fn evaluate_conditions(
    conditions: &[Condition],
    state: &ExecutionState,
    substitutor: &mut Substitutor<'_>,
) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate_condition(condition, state, substitutor))
}

fn evaluate_condition(
    condition: &Condition,
    state: &ExecutionState,
    substitutor: &mut Substitutor<'_>,
) -> bool {
    let actual = match &condition.source {
        ConditionSource::Node(node_id) => {
            let response = match state.response(node_id) {
                Some(r) => r,
                None => {
                    debug!("Condition failed: node {} has no response", node_id);
                    return false;
                }
            };
            if condition.operator == Operator::StatusCode {
                Some(Value::from(response.status_code))
            } else {
                condition.field.as_deref().and_then(|f| response.field(f))
            }
        }
        ConditionSource::Variable(name) => state.variable(name).filter(|v| !v.is_null()).cloned(),
        ConditionSource::Input(name) => state.input(name).map(|s| Value::String(s.to_string())),
    };
    let expected = condition
        .value
        .as_ref()
        .map(|v| resolve_expected(v, actual.as_ref(), substitutor));

    match compare(&condition.operator, actual.as_ref(), expected.as_ref()) {
        Ok(true) => {
            debug!(
                "Condition passed: {:?} {} {}",
                condition.source,
                condition.operator,
                expected.as_ref().map(display_value).unwrap_or_default()
            );
            true
        }
        Ok(false) => {
            debug!(
                "Condition failed: {} - actual: {}, expected: {}",
                condition.operator,
                actual.as_ref().map_or("<missing>".to_string(), display_value),
                expected.as_ref().map_or("<none>".to_string(), display_value)
            );
            false
        }
        Err(reason) => {
            debug!("Condition could not be evaluated: {}", reason);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        substitute::{DynamicValues, FixedValues},
        types::StoredResponse,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn cond(v: Value) -> Condition {
        serde_json::from_value(v).unwrap()
    }

    fn state() -> ExecutionState {
        let mut state = ExecutionState::new(HashMap::from([
            ("env".to_string(), json!("prod")),
            ("limit".to_string(), json!(10)),
            ("count".to_string(), json!("7")),
        ]));
        state.store_response(
            "login",
            StoredResponse {
                body: json!({"role": "admin", "age": 30, "tags": ["a"]}),
                status_code: 200,
            },
        );
        state.begin_prompts(HashMap::from([("choice".to_string(), "yes".to_string())]));
        state
    }

    fn eval(conditions: &[Condition], state: &ExecutionState) -> bool {
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(state, &mut dynamic, 0);
        evaluate_conditions(conditions, state, &mut sub)
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(&json!(42.0), &json!(42)));
        assert!(!values_equal(&json!("42"), &json!(42)));
        assert!(!values_equal(&json!("true"), &json!(true)));
        assert!(!values_equal(&json!(9007199254740993_i64), &json!(9007199254740992_i64)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!values_equal(&json!(-1), &json!(u64::MAX)));
        assert!(values_equal(&json!({"a": [1]}), &json!({"a": [1]})));
        assert!(!values_equal(&json!({"a": 1}), &json!({"b": 1})));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!([1])), None);
    }

    #[test]
    fn test_compare_operators() {
        let a = json!(5);
        let e = json!("3");
        assert_eq!(compare(&Operator::GreaterThan, Some(&a), Some(&e)), Ok(true));
        assert_eq!(compare(&Operator::LessThan, Some(&a), Some(&e)), Ok(false));
        assert_eq!(compare(&Operator::GreaterThanOrEqual, Some(&a), Some(&a)), Ok(true));
        assert_eq!(compare(&Operator::LessThanOrEqual, Some(&a), Some(&a)), Ok(true));
        assert_eq!(compare(&Operator::NotEquals, Some(&a), Some(&e)), Ok(true));
        assert_eq!(
            compare(&Operator::NotEquals, Some(&json!(42)), Some(&json!("42"))),
            Ok(true)
        );
        assert_eq!(
            compare(&Operator::Equals, Some(&json!(true)), Some(&json!("true"))),
            Ok(false)
        );
        assert_eq!(compare(&Operator::Exists, None, Some(&e)), Ok(false));
        assert_eq!(compare(&Operator::NotExists, None, None), Ok(true));
        assert!(compare(&Operator::GreaterThan, Some(&json!("x")), Some(&e)).is_err());
        assert!(compare(&Operator::GreaterThan, None, Some(&e)).is_err());
        assert!(compare(&Operator::Unknown("like".into()), Some(&a), Some(&a)).is_err());
    }

    #[test]
    fn test_no_conditions_always_run() {
        assert!(eval(&[], &state()));
    }

    #[test]
    fn test_node_source() {
        let s = state();
        assert!(eval(
            &[cond(json!({"node": "login", "operator": "statusCode", "value": 200}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"node": "login", "operator": "statusCode", "value": 404}))],
            &s
        ));
        assert!(eval(
            &[cond(json!({"node": "login", "field": ".role", "equals": "admin"}))],
            &s
        ));
        assert!(eval(
            &[cond(json!({"node": "login", "field": "age", "operator": "greaterThan", "value": 18}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"node": "login", "field": "missing", "operator": "exists"}))],
            &s
        ));
    }

    #[test]
    fn test_missing_dependency_skips() {
        // A node that never ran (or was skipped) fails any condition on it,
        // even a negative one.
        let s = state();
        assert!(!eval(
            &[cond(json!({"node": "ghost", "operator": "notEquals", "field": "x", "value": 1}))],
            &s
        ));
    }

    #[test]
    fn test_variable_and_input_sources() {
        let s = state();
        assert!(eval(
            &[cond(json!({"variable": "env", "operator": "equals", "value": "prod"}))],
            &s
        ));
        assert!(eval(
            &[cond(json!({"variable": "count", "operator": "lessThan", "value": "{{ .vars.limit }}"}))],
            &s
        ));
        assert!(eval(
            &[cond(json!({"input": "choice", "operator": "equals", "value": "yes"}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"variable": "undefined", "operator": "exists"}))],
            &s
        ));
    }

    #[test]
    fn test_literal_string_never_equals_number() {
        let s = state();
        assert!(eval(
            &[cond(json!({"node": "login", "field": "age", "operator": "notEquals", "value": "30"}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"node": "login", "field": "age", "equals": "30"}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"node": "login", "operator": "statusCode", "value": "200"}))],
            &s
        ));
    }

    #[test]
    fn test_substituted_expected_value() {
        let s = state();
        assert!(eval(
            &[cond(json!({
                "node": "login", "field": "age", "operator": "equals",
                "value": "{{ .responses.login.age }}"
            }))],
            &s
        ));
        assert!(eval(
            &[cond(json!({"variable": "limit", "operator": "equals", "value": "{{ .vars.limit }}"}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({
                "node": "login", "field": "age", "operator": "notEquals",
                "value": "{{ .responses.login.age }}"
            }))],
            &s
        ));
        // Text that does not spell a number stays a string.
        assert!(!eval(
            &[cond(json!({"node": "login", "field": "age", "equals": "{{ .vars.env }}"}))],
            &s
        ));
    }

    #[test]
    fn test_non_numeric_and_unknown_are_false() {
        let s = state();
        assert!(!eval(
            &[cond(json!({"variable": "env", "operator": "greaterThan", "value": 1}))],
            &s
        ));
        assert!(!eval(
            &[cond(json!({"variable": "env", "operator": "matches", "value": "p.*"}))],
            &s
        ));
    }

    #[test]
    fn test_and_short_circuit() {
        let s = state();
        let conditions = [
            cond(json!({"variable": "env", "operator": "equals", "value": "dev"})),
            cond(json!({"variable": "env", "operator": "equals", "value": "{{ $guid }}"})),
        ];
        let mut dynamic = FixedValues::new(0);
        {
            let mut sub = Substitutor::new(&s, &mut dynamic, 0);
            assert!(!evaluate_conditions(&conditions, &s, &mut sub));
        }
        // The second condition's value was never substituted.
        assert_eq!(dynamic.guid(), "00000000-0000-4000-8000-000000000001");
    }
}
