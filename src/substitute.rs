//! `{{ ... }}` placeholder substitution.
//!
//! Resolution runs as four passes over each string, in this order:
//! dynamic values (`$guid`, `$timestamp`), global variables (`.vars.KEY`),
//! user input (`.input.NAME`) and response references
//! (`.responses.NODE_ID.path`). Each pass replaces every match before the
//! next pass starts, so text produced by an earlier pass can be resolved by a
//! later one, but never the other way round. Placeholders that cannot be
//! resolved are left as they are.

use crate::state::ExecutionState;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static GUID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*\$guid\s*\}\}").unwrap());
static TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\$timestamp\s*\}\}").unwrap());
// Paths run lazily up to the closing braces, so JSONPath filters with
// spaces (`$.items[?(@.k == 'x')]`) stay in one capture.
static VARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.vars\.(.+?)\s*\}\}").unwrap());
static INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.input\.(.+?)\s*\}\}").unwrap());
static RESPONSES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.responses\.([a-zA-Z0-9_-]+)\.(.+?)\s*\}\}").unwrap()
});

/// Source of `{{ $guid }}` and `{{ $timestamp }}` values.
pub trait DynamicValues {
    fn guid(&mut self) -> String;
    fn timestamp_millis(&mut self) -> i64;
}

/// Random v4 UUIDs and the wall clock.
#[derive(Debug, Default)]
pub struct SystemValues;

impl DynamicValues for SystemValues {
    fn guid(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn timestamp_millis(&mut self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Deterministic values: a fixed clock that advances by one second per call
/// and numbered UUIDs.
#[derive(Debug)]
pub struct FixedValues {
    next_timestamp: i64,
    guids: u64,
}

impl FixedValues {
    pub fn new(start_millis: i64) -> Self {
        Self {
            next_timestamp: start_millis,
            guids: 0,
        }
    }
}

impl DynamicValues for FixedValues {
    fn guid(&mut self) -> String {
        self.guids += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.guids)
    }

    fn timestamp_millis(&mut self) -> i64 {
        let t = self.next_timestamp;
        self.next_timestamp += 1000;
        t
    }
}

/// Render a JSON value the way it appears inside a substituted string.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolves placeholders for one node. The timestamp is fixed at
/// construction so every occurrence within the node shares it.
pub struct Substitutor<'a> {
    state: &'a ExecutionState,
    dynamic: &'a mut dyn DynamicValues,
    timestamp: String,
}

impl<'a> Substitutor<'a> {
    pub fn new(
        state: &'a ExecutionState,
        dynamic: &'a mut dyn DynamicValues,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            state,
            dynamic,
            timestamp: timestamp_millis.to_string(),
        }
    }

    /// Substitute inside strings, recursing into objects and arrays.
    /// Other scalars are returned unchanged.
    pub fn apply(&mut self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply_str(s)),
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), self.apply(v)))
                    .collect(),
            ),
            Value::Array(arr) => Value::Array(arr.iter().map(|v| self.apply(v)).collect()),
            other => other.clone(),
        }
    }

    pub fn apply_str(&mut self, s: &str) -> String {
        let dynamic = &mut *self.dynamic;
        let s = GUID_RE.replace_all(s, |_: &Captures| dynamic.guid());
        let s = TIMESTAMP_RE.replace_all(&s, self.timestamp.as_str());

        let state = self.state;
        let s = VARS_RE.replace_all(&s, |caps: &Captures| match state.variable(&caps[1]) {
            Some(v) => display_value(v),
            None => {
                debug!("Variable {} is not defined", &caps[1]);
                caps[0].to_string()
            }
        });
        let s = INPUT_RE.replace_all(&s, |caps: &Captures| match state.input(&caps[1]) {
            Some(v) => v.to_string(),
            None => {
                debug!("Input {} was not collected for this node", &caps[1]);
                caps[0].to_string()
            }
        });
        let s = RESPONSES_RE.replace_all(&s, |caps: &Captures| {
            let (node_id, path) = (&caps[1], &caps[2]);
            match state.response(node_id) {
                Some(resp) => match resp.field(path) {
                    Some(v) => display_value(&v),
                    None => {
                        debug!("Could not extract {} from {} response", path, node_id);
                        caps[0].to_string()
                    }
                },
                None => {
                    debug!("Response for node {} not found", node_id);
                    caps[0].to_string()
                }
            }
        });
        s.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoredResponse;
    use serde_json::json;
    use std::collections::HashMap;

    fn state() -> ExecutionState {
        let mut state = ExecutionState::new(HashMap::from([
            ("apiKey".to_string(), json!("k-123")),
            ("userId".to_string(), json!(12345)),
            ("flag".to_string(), json!(true)),
        ]));
        state.store_response(
            "login",
            StoredResponse {
                body: json!({"token": "abc", "items": [{"id": 9}]}),
                status_code: 200,
            },
        );
        state
    }

    #[test]
    fn test_vars_inputs_and_responses() {
        let mut state = state();
        state.begin_prompts(HashMap::from([("name".to_string(), "ann".to_string())]));
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(&state, &mut dynamic, 0);
        assert_eq!(
            sub.apply_str("/users/{{ .vars.userId }}?key={{.vars.apiKey}}&on={{ .vars.flag }}"),
            "/users/12345?key=k-123&on=true"
        );
        assert_eq!(sub.apply_str("hi {{ .input.name }}"), "hi ann");
        assert_eq!(
            sub.apply_str("Bearer {{ .responses.login.token }}"),
            "Bearer abc"
        );
        assert_eq!(sub.apply_str("{{ .responses.login.items[0].id }}"), "9");
        assert_eq!(sub.apply_str("{{ .responses.login._status_code }}"), "200");
    }

    #[test]
    fn test_jsonpath_filter_reference() {
        let mut state = state();
        state.store_response(
            "list",
            StoredResponse {
                body: json!({"items": [{"k": "y", "v": 3}, {"k": "x", "v": 7}]}),
                status_code: 200,
            },
        );
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(&state, &mut dynamic, 0);
        assert_eq!(
            sub.apply_str("/b/{{ .responses.list.$.items[?(@.k == 'x')].v }}"),
            "/b/7"
        );
        assert_eq!(
            sub.apply_str("{{ .responses.list.$.items[0].k }}-{{ .vars.apiKey }}"),
            "y-k-123"
        );
    }

    #[test]
    fn test_unresolved_placeholders_stay_literal() {
        let state = state();
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(&state, &mut dynamic, 0);
        for s in [
            "{{ .vars.nope }}",
            "{{ .input.nope }}",
            "{{ .responses.ghost.id }}",
            "{{ .responses.login.missing }}",
        ] {
            assert_eq!(sub.apply_str(s), s);
        }
    }

    #[test]
    fn test_timestamp_shared_guid_unique() {
        let state = state();
        let mut dynamic = SystemValues;
        let mut sub = Substitutor::new(&state, &mut dynamic, 1_700_000_000_000);
        let out = sub.apply(&json!({
            "a": "{{ $timestamp }}",
            "b": ["{{$timestamp}}"],
            "g": "{{ $guid }} {{ $guid }}"
        }));
        assert_eq!(out["a"], json!("1700000000000"));
        assert_eq!(out["b"][0], json!("1700000000000"));
        let guids: Vec<&str> = out["g"].as_str().unwrap().split(' ').collect();
        assert_ne!(guids[0], guids[1]);
        for g in guids {
            assert_eq!(uuid::Uuid::parse_str(g).unwrap().get_version_num(), 4);
        }
    }

    #[test]
    fn test_vars_resolve_before_responses() {
        // The variable expands into a response reference, which only
        // resolves because the responses pass runs afterwards.
        let mut state = ExecutionState::new(HashMap::from([(
            "ref".to_string(),
            json!("{{ .responses.login.token }}"),
        )]));
        state.store_response(
            "login",
            StoredResponse {
                body: json!({"token": "abc", "note": "{{ .vars.ref }}"}),
                status_code: 200,
            },
        );
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(&state, &mut dynamic, 0);
        assert_eq!(
            sub.apply_str("{{ .responses.login.token }}/{{ .vars.ref }}"),
            "abc/abc"
        );
        // Response text is not scanned again for variables.
        assert_eq!(
            sub.apply_str("{{ .responses.login.note }}"),
            "{{ .vars.ref }}"
        );
    }

    #[test]
    fn test_non_strings_pass_through() {
        let state = state();
        let mut dynamic = FixedValues::new(0);
        let mut sub = Substitutor::new(&state, &mut dynamic, 0);
        let input = json!({"n": 1, "b": false, "z": null, "s": "{{ .vars.userId }}"});
        assert_eq!(
            sub.apply(&input),
            json!({"n": 1, "b": false, "z": null, "s": "12345"})
        );
    }

    #[test]
    fn test_fixed_values_are_deterministic() {
        let mut v = FixedValues::new(5000);
        assert_eq!(v.timestamp_millis(), 5000);
        assert_eq!(v.timestamp_millis(), 6000);
        assert_eq!(v.guid(), "00000000-0000-4000-8000-000000000001");
        assert_ne!(v.guid(), "00000000-0000-4000-8000-000000000001");
    }
}
