use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Shape a checked value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl CheckType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            CheckType::Boolean => value.is_boolean(),
            CheckType::Number => value.is_number(),
            CheckType::String => value.is_string(),
            CheckType::Array => value.is_array(),
            CheckType::Object => value.is_object(),
        }
    }

    /// Whether an expected value may be attached to a check of this type.
    pub fn accepts_value(&self, expected: &Value) -> bool {
        match self {
            CheckType::Array | CheckType::Object => false,
            other => other.matches(expected),
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckType::Boolean => "boolean",
            CheckType::Number => "number",
            CheckType::String => "string",
            CheckType::Array => "array",
            CheckType::Object => "object",
        };
        f.write_str(name)
    }
}

/// One `{path, type, value?}` assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: CheckType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseValidation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("path not found: {key} (in '{path}')")]
    PathNotFound { path: String, key: String },

    #[error("cannot navigate through non-object at {key} (in '{path}')")]
    NotAnObject { path: String, key: String },

    #[error("expected {expected} at '{path}', got {actual}")]
    TypeMismatch {
        path: String,
        expected: CheckType,
        actual: &'static str,
    },

    #[error("expected value {expected} at '{path}', got {actual}")]
    ValueMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },

    #[error("failed to parse JSON response: {0}")]
    MalformedPayload(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Checks response bodies against a fixed, ordered list of assertions.
///
/// Checks run in order and stop at the first failure.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    enabled: bool,
    checks: Vec<ValidationCheck>,
}

impl ResponseValidator {
    pub fn new(config: &ResponseValidation) -> Self {
        Self {
            enabled: config.enabled,
            checks: config.checks.clone(),
        }
    }

    /// Validates a raw body. A disabled validator never looks at it.
    /// The body must be a JSON object; anything else is malformed.
    pub fn validate(&self, body: &[u8]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let document: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| {
                ValidationError::MalformedPayload(e.to_string())
            })?;

        self.validate_document(&Value::Object(document))
    }

    pub fn validate_document(&self, document: &Value) -> Result<()> {
        for check in &self.checks {
            let value = resolve_path(document, &check.path)?;
            check_value(check, value)?;
        }
        Ok(())
    }
}

/// Walks a dot-separated key path through nested objects.
pub fn resolve_path<'a>(
    document: &'a Value,
    path: &str,
) -> Result<&'a Value> {
    path.split('.').try_fold(document, |current, key| {
        match current {
            Value::Object(map) => map.get(key).ok_or_else(|| {
                ValidationError::PathNotFound {
                    path: path.to_string(),
                    key: key.to_string(),
                }
            }),
            _ => Err(ValidationError::NotAnObject {
                path: path.to_string(),
                key: key.to_string(),
            }),
        }
    })
}

fn check_value(check: &ValidationCheck, value: &Value) -> Result<()> {
    if !check.kind.matches(value) {
        return Err(ValidationError::TypeMismatch {
            path: check.path.clone(),
            expected: check.kind,
            actual: kind_name(value),
        });
    }

    let Some(expected) = &check.value else {
        return Ok(());
    };

    let equal = match check.kind {
        // 1 and 1.0 are the same number
        CheckType::Number => match (value.as_f64(), expected.as_f64()) {
            (Some(actual), Some(expected)) => actual == expected,
            _ => false,
        },
        CheckType::Boolean | CheckType::String => value == expected,
        CheckType::Array | CheckType::Object => true,
    };

    if equal {
        Ok(())
    } else {
        Err(ValidationError::ValueMismatch {
            path: check.path.clone(),
            expected: expected.clone(),
            actual: value.clone(),
        })
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
