use crate::extract::extract_field;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    convert::TryFrom,
    fmt,
    str::FromStr,
};

/// Root of a FlowSphere configuration file.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub enable_debug: bool,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub base_url: Option<String>,
    /// Seconds.
    pub timeout: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub validations: Vec<Validation>,
}

/// One HTTP step of a sequence.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub skip_default_headers: bool,
    pub body: Option<Value>,
    #[serde(default)]
    pub body_format: BodyFormat,
    pub timeout: Option<u64>,
    pub user_prompts: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub validations: Vec<Validation>,
    #[serde(default)]
    pub skip_default_validations: bool,
    pub launch_browser: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(format!(
                "invalid method '{}'. Must be one of: GET, POST, PUT, DELETE, PATCH",
                s
            )),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Method> for String {
    fn from(m: Method) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BodyFormat {
    #[default]
    Json,
    FormUrlencoded,
}

/// Comparison applied by conditions and validations.
///
/// Names that are not recognized are kept as `Unknown` so that a config
/// still loads; they evaluate as a failed check at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    StatusCode,
    Equals,
    NotEquals,
    Exists,
    NotExists,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Unknown(String),
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s {
            "statusCode" => Operator::StatusCode,
            "equals" => Operator::Equals,
            "notEquals" => Operator::NotEquals,
            "exists" => Operator::Exists,
            "notExists" => Operator::NotExists,
            "greaterThan" => Operator::GreaterThan,
            "lessThan" => Operator::LessThan,
            "greaterThanOrEqual" => Operator::GreaterThanOrEqual,
            "lessThanOrEqual" => Operator::LessThanOrEqual,
            other => Operator::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::StatusCode => "statusCode",
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Exists => "exists",
            Operator::NotExists => "notExists",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Unknown(name) if name.is_empty() => "<none>",
            Operator::Unknown(name) => name,
        };
        f.write_str(name)
    }
}

/// Operator-as-key shorthand, e.g. `{"jsonpath": ".token", "exists": true}`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OperatorKeys {
    status_code: Option<Value>,
    equals: Option<Value>,
    not_equals: Option<Value>,
    exists: Option<bool>,
    greater_than: Option<Value>,
    less_than: Option<Value>,
    greater_than_or_equal: Option<Value>,
    less_than_or_equal: Option<Value>,
}

impl OperatorKeys {
    fn into_operator(self) -> Option<(Operator, Option<Value>)> {
        if let Some(v) = self.status_code {
            return Some((Operator::StatusCode, Some(v)));
        }
        if let Some(v) = self.equals {
            return Some((Operator::Equals, Some(v)));
        }
        if let Some(v) = self.not_equals {
            return Some((Operator::NotEquals, Some(v)));
        }
        if let Some(present) = self.exists {
            let op = if present {
                Operator::Exists
            } else {
                Operator::NotExists
            };
            return Some((op, None));
        }
        let numeric = [
            (Operator::GreaterThan, self.greater_than),
            (Operator::LessThan, self.less_than),
            (Operator::GreaterThanOrEqual, self.greater_than_or_equal),
            (Operator::LessThanOrEqual, self.less_than_or_equal),
        ];
        numeric
            .into_iter()
            .find_map(|(op, v)| v.map(|v| (op, Some(v))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionSource {
    Node(String),
    Variable(String),
    Input(String),
}

/// Pre-execution gate. All conditions of a node must hold for it to run.
#[derive(Deserialize, Debug, Clone)]
#[serde(try_from = "RawCondition")]
pub struct Condition {
    pub source: ConditionSource,
    pub field: Option<String>,
    pub operator: Operator,
    pub value: Option<Value>,
}

#[derive(Deserialize)]
struct RawCondition {
    node: Option<String>,
    variable: Option<String>,
    input: Option<String>,
    field: Option<String>,
    operator: Option<String>,
    value: Option<Value>,
    #[serde(flatten)]
    keys: OperatorKeys,
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let mut sources = vec![];
        if let Some(n) = raw.node {
            sources.push(ConditionSource::Node(n));
        }
        if let Some(v) = raw.variable {
            sources.push(ConditionSource::Variable(v));
        }
        if let Some(i) = raw.input {
            sources.push(ConditionSource::Input(i));
        }
        if sources.len() != 1 {
            return Err(format!(
                "condition must name exactly one of 'node', 'variable' or 'input' (found {})",
                sources.len()
            ));
        }
        let (operator, value) = match raw.operator {
            Some(name) => (Operator::from(name.as_str()), raw.value),
            None => match raw.keys.into_operator() {
                Some(pair) => pair,
                None => (Operator::Unknown(String::new()), raw.value),
            },
        };
        Ok(Condition {
            source: sources.remove(0),
            field: raw.field,
            operator,
            value,
        })
    }
}

/// Post-execution check on a node's response.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawValidation")]
pub struct Validation {
    pub http_status_code: Option<u16>,
    pub check: Option<FieldCheck>,
}

impl Validation {
    pub fn status(code: u16) -> Self {
        Validation {
            http_status_code: Some(code),
            check: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCheck {
    pub path: String,
    pub operator: Operator,
    pub expected: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidation {
    http_status_code: Option<u16>,
    jsonpath: Option<String>,
    field: Option<String>,
    operator: Option<String>,
    value: Option<Value>,
    #[serde(flatten)]
    keys: OperatorKeys,
}

impl TryFrom<RawValidation> for Validation {
    type Error = String;

    fn try_from(raw: RawValidation) -> Result<Self, Self::Error> {
        let check = match raw.jsonpath.or(raw.field) {
            Some(path) => {
                let (operator, expected) = match raw.operator {
                    Some(name) => (Operator::from(name.as_str()), raw.value),
                    None => match raw.keys.into_operator() {
                        Some(pair) => pair,
                        None if raw.value.is_some() => (Operator::Equals, raw.value),
                        None => (Operator::Exists, None),
                    },
                };
                Some(FieldCheck {
                    path,
                    operator,
                    expected,
                })
            }
            None => None,
        };
        if raw.http_status_code.is_none() && check.is_none() {
            return Err("validation must carry 'httpStatusCode' or a 'jsonpath'/'field'".into());
        }
        Ok(Validation {
            http_status_code: raw.http_status_code,
            check,
        })
    }
}

/// A node's response as kept for later references.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub body: Value,
    #[serde(rename = "_status_code")]
    pub status_code: u16,
}

impl StoredResponse {
    /// Resolve a field path against the body. `_status_code` addresses the
    /// status rather than a body key.
    pub fn field(&self, path: &str) -> Option<Value> {
        match path.trim_start_matches('.') {
            "_status_code" => Some(Value::from(self.status_code)),
            _ => extract_field(&self.body, path),
        }
    }
}
