//! Execution results and their response serialization
//!
//! ```json
//! { "data": { ... } | null, "errors": [ { "message": "...", "path": ["posts", 2, "title"] } ] }
//! ```
//!
//! `errors` is omitted when empty and `data` is omitted when the operation
//! failed validation.

use crate::core::error::{FieldErrorKind, ValidationError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Mutex;

/// One step of a response path: a response key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Field(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Field(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Field(key) => write!(f, "{}", key),
        }
    }
}

/// Path of a field in the response
pub type ResponsePath = Vec<PathSegment>;

/// An error recorded for a field (or for the request as a whole)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: ResponsePath,
    #[serde(skip, default = "default_kind")]
    pub kind: FieldErrorKind,
}

fn default_kind() -> FieldErrorKind {
    FieldErrorKind::Resolver
}

impl FieldError {
    pub fn new(kind: FieldErrorKind, message: impl Into<String>, path: ResponsePath) -> Self {
        Self {
            message: message.into(),
            path,
            kind,
        }
    }

    /// Dotted path rendering, e.g. `posts.2.title`
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl From<&ValidationError> for FieldError {
    fn from(err: &ValidationError) -> Self {
        FieldError::new(FieldErrorKind::Request, err.to_string(), Vec::new())
    }
}

/// Outcome of executing one operation
///
/// `data` is `None` when the operation never started (validation failure),
/// `Some(Value::Null)` when null propagation reached the root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(
        default,
        deserialize_with = "present_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// A `data` key that is present, even as `null`, means execution started
fn present_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl ExecutionResult {
    pub fn new(data: Value, errors: Vec<FieldError>) -> Self {
        Self {
            data: Some(data),
            errors,
        }
    }

    /// Result for an operation rejected before execution
    pub fn from_validation_error(err: &ValidationError) -> Self {
        Self {
            data: None,
            errors: vec![err.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Serialize to the two-key response shape
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// First error recorded at exactly this path
    pub fn error_at(&self, path: &[PathSegment]) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.path == path)
    }
}

/// Concurrency-safe error sink shared by every branch of one execution
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    errors: Mutex<Vec<FieldError>>,
}

impl ErrorCollector {
    pub fn push(&self, error: FieldError) {
        tracing::debug!(
            path = %error.path_string(),
            code = error.kind.error_code(),
            message = %error.message,
            "Field error recorded"
        );
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(error);
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_errors_omitted_when_empty() {
        let result = ExecutionResult::new(json!({"user": {"name": "Alice"}}), vec![]);
        assert_eq!(result.to_json(), json!({"data": {"user": {"name": "Alice"}}}));
    }

    #[test]
    fn test_null_data_is_serialized() {
        let result = ExecutionResult::new(
            Value::Null,
            vec![FieldError::new(
                FieldErrorKind::NonNull,
                "Cannot return null",
                vec!["user".into()],
            )],
        );
        assert_eq!(
            result.to_json(),
            json!({"data": null, "errors": [{"message": "Cannot return null", "path": ["user"]}]})
        );
    }

    #[test]
    fn test_validation_failure_omits_data_and_path() {
        let result = ExecutionResult::from_validation_error(&ValidationError::NoOperation);
        let json = result.to_json();
        assert!(json.get("data").is_none());
        assert!(json["errors"][0].get("path").is_none());
        assert_eq!(json["errors"][0]["message"], "No operation found in document");
    }

    #[test]
    fn test_deserialize_keeps_null_data_apart_from_missing_data() {
        let nulled: ExecutionResult =
            serde_json::from_value(json!({"data": null, "errors": [{"message": "x"}]})).unwrap();
        assert_eq!(nulled.data, Some(Value::Null));
        assert_eq!(nulled.to_json()["data"], Value::Null);
        assert!(nulled.to_json().get("data").is_some());

        let rejected: ExecutionResult =
            serde_json::from_value(json!({"errors": [{"message": "x"}]})).unwrap();
        assert_eq!(rejected.data, None);
    }

    #[test]
    fn test_path_serializes_keys_and_indices() {
        let error = FieldError::new(
            FieldErrorKind::Resolver,
            "boom",
            vec!["posts".into(), 2usize.into(), "title".into()],
        );
        assert_eq!(serde_json::to_value(&error).unwrap()["path"], json!(["posts", 2, "title"]));
        assert_eq!(error.path_string(), "posts.2.title");
    }

    #[test]
    fn test_collector_keeps_order() {
        let collector = ErrorCollector::default();
        collector.push(FieldError::new(FieldErrorKind::Resolver, "a", vec!["a".into()]));
        collector.push(FieldError::new(FieldErrorKind::Timeout, "b", vec!["b".into()]));
        let errors = collector.into_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].kind, FieldErrorKind::Timeout);
    }
}
