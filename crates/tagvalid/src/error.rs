//! Error types: structural faults and recorded rule failures.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

/// A structural fault: the rules or the input are misconfigured.
///
/// These abort the current validation call. A value that merely fails a
/// rule is never reported this way; it becomes a [`FieldError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The rule name is not registered
    #[error("{0} does not exist")]
    UnknownRule(String),

    /// Parameter count differs from the registered arity
    #[error("{name} requires {expected} parameters, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A parameter could not be coerced to its declared kind
    #[error("parameter {index} of {rule} is invalid: {reason}")]
    ParameterType {
        rule: String,
        index: usize,
        reason: String,
    },

    /// `Match(/.../)` without a usable `/)` terminator
    #[error("invalid Match function in tag {0:?}")]
    InvalidMatchClause(String),

    /// Malformed rule segment
    #[error("invalid valid function {0:?}")]
    InvalidSyntax(String),

    /// Attempt to register one of the reserved names
    #[error("invalid function name: {0}")]
    NameReserved(String),

    /// Top-level input is not a record
    #[error("{0} must be a struct or a struct reference")]
    NotAStruct(String),

    /// A rule panicked while being built or evaluated
    #[error("rule {rule} failed: {reason}")]
    Invocation { rule: String, reason: String },
}

impl ValidationError {
    pub fn arity(name: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ArityMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    pub fn parameter(rule: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        Self::ParameterType {
            rule: rule.into(),
            index,
            reason: reason.into(),
        }
    }
}

/// A recorded rule failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Human-readable message
    pub message: String,
    /// Raw key the rule was invoked with
    pub key: String,
    /// Second segment of a `field.name` key, else the key itself
    pub name: String,
    /// First segment of a `field.name` key, else the key itself
    pub field: String,
    /// The offending value
    pub value: Value,
    /// Message template of the failing rule
    pub template: String,
    /// Machine-readable limit, e.g. `[1, 140]` for `Range(1,140)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_value: Option<Value>,
}

impl FieldError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            key: String::new(),
            name: String::new(),
            field: String::new(),
            value: Value::Nil,
            template: String::new(),
            limit_value: None,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

/// Envelope a key may carry to customise the reported message and field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomErrorMessage {
    #[serde(rename = "errorMessage", default)]
    pub message: String,
    #[serde(rename = "errorKey", default)]
    pub key: String,
    #[serde(rename = "errorField", default)]
    pub field: String,
}

impl CustomErrorMessage {
    pub fn new(
        message: impl Into<String>,
        key: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            key: key.into(),
            field: field.into(),
        }
    }

    /// Decode an envelope; `None` unless `s` is a JSON object.
    pub fn decode(s: &str) -> Option<Self> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(s).ok()?;
        serde_json::from_value(serde_json::Value::Object(object)).ok()
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
