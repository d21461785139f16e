//! Response validation.

use crate::{
    conditions::{compare, resolve_expected},
    substitute::{display_value, Substitutor},
    types::{Defaults, FieldCheck, Node, Operator, StoredResponse, Validation},
};
use std::fmt;

/// The first rule a response did not meet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub rule: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation failed: expected {}, got {}",
            self.rule, self.expected, self.actual
        )
    }
}

impl std::error::Error for ValidationFailure {}

/// Default validations (unless skipped) followed by the node's own. An empty
/// result becomes a single `httpStatusCode: 200` check.
pub fn effective_validations(node: &Node, defaults: &Defaults) -> Vec<Validation> {
    let mut validations = vec![];
    if !node.skip_default_validations {
        validations.extend(defaults.validations.iter().cloned());
    }
    validations.extend(node.validations.iter().cloned());
    if validations.is_empty() {
        validations.push(Validation::status(200));
    }
    validations
}

/// Check `response` against every validation in order, stopping at the first
/// failure.
pub fn validate_response(
    validations: &[Validation],
    response: &StoredResponse,
    substitutor: &mut Substitutor<'_>,
) -> Result<(), ValidationFailure> {
    for validation in validations {
        if let Some(expected) = validation.http_status_code {
            if response.status_code != expected {
                return Err(ValidationFailure {
                    rule: "HTTP status".to_string(),
                    expected: expected.to_string(),
                    actual: response.status_code.to_string(),
                });
            }
        }
        if let Some(check) = &validation.check {
            check_field(check, response, substitutor)?;
        }
    }
    Ok(())
}

fn check_field(
    check: &FieldCheck,
    response: &StoredResponse,
    substitutor: &mut Substitutor<'_>,
) -> Result<(), ValidationFailure> {
    let actual = response.field(&check.path);
    let expected = check
        .expected
        .as_ref()
        .map(|v| resolve_expected(v, actual.as_ref(), substitutor));
    let fail = |actual: String| ValidationFailure {
        rule: format!("Field {} ({})", check.path, check.operator),
        expected: match (&check.operator, &expected) {
            (Operator::Exists, _) => "a value".to_string(),
            (Operator::NotExists, _) => "no value".to_string(),
            (_, Some(v)) => display_value(v),
            (_, None) => "<none>".to_string(),
        },
        actual,
    };
    match compare(&check.operator, actual.as_ref(), expected.as_ref()) {
        Ok(true) => Ok(()),
        Ok(false) => Err(fail(
            actual
                .as_ref()
                .map_or("<missing>".to_string(), display_value),
        )),
        Err(reason) => Err(fail(reason)),
    }
}
