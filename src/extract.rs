//! Field extraction from response bodies.
//!
//! Paths starting with `$` are JSONPath queries. Anything else uses the
//! simple grammar: dot separated keys with optional `[idx]` suffixes, e.g.
//! `users[0].profile.email` or `[1].id`. A leading `.` is ignored.
//!
//! Lookups never fail loudly: a missing key, bad index or type mismatch
//! yields `None`. JSON `null` is also reported as `None`.

use log::debug;
use serde_json::Value;
use serde_json_path::JsonPath;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Key(String),
    Index(i64),
}

/// A parsed field path, resolved once and applied to any number of values.
#[derive(Debug)]
pub enum FieldPath {
    Query(JsonPath),
    Simple(Vec<Segment>),
}

impl FieldPath {
    pub fn parse(path: &str) -> Option<FieldPath> {
        if path.starts_with('$') {
            return match JsonPath::parse(path) {
                Ok(p) => Some(FieldPath::Query(p)),
                Err(e) => {
                    debug!("Invalid JSONPath {}: {}", path, e);
                    None
                }
            };
        }
        parse_simple(path).map(FieldPath::Simple)
    }

    pub fn extract(&self, data: &Value) -> Option<Value> {
        let found = match self {
            FieldPath::Query(p) => {
                let mut matches = p.query(data).all();
                match matches.len() {
                    0 => None,
                    1 => Some(matches.remove(0).clone()),
                    _ => Some(Value::Array(matches.into_iter().cloned().collect())),
                }
            }
            FieldPath::Simple(segments) => walk(data, segments).cloned(),
        };
        found.filter(|v| !v.is_null())
    }
}

/// Extract `path` from `data`, or `None` when nothing is there.
pub fn extract_field(data: &Value, path: &str) -> Option<Value> {
    let value = FieldPath::parse(path).and_then(|p| p.extract(data));
    if value.is_none() {
        debug!("Field extraction found nothing for {}", path);
    }
    value
}

fn parse_simple(path: &str) -> Option<Vec<Segment>> {
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return None;
    }
    let mut segments = vec![];
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let idx = rest.get(1..close)?.trim().parse::<i64>().ok()?;
            segments.push(Segment::Index(idx));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(segments)
}

fn walk<'a>(data: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = data;
    for seg in segments {
        current = match (seg, current) {
            (Segment::Key(k), Value::Object(obj)) => obj.get(k)?,
            (Segment::Index(i), Value::Array(arr)) => {
                let idx = if *i < 0 {
                    arr.len().checked_sub(i.unsigned_abs() as usize)?
                } else {
                    *i as usize
                };
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}
