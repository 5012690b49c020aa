//! The single error type surfaced by schema checking, transformation, and
//! codec encode/decode.

use std::fmt;

/// Coarse category of a [`ValidationError`], kept internal to this crate and
/// used only by tests to assert *which* check failed without string-matching
/// on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed JSON, or a schema/instance that doesn't match its expected
    /// JSON shape (wrong tuple arity, wrong element type).
    Syntax,
    /// A schema fails a structural invariant (duplicate name, undefined
    /// reference, bad option, ...).
    SchemaInvalid,
    /// An instance fails validation against its type during encode/decode
    /// (out of range, wrong variant, missing field, ...).
    InstanceInvalid,
}

/// A validation or encode/decode failure.
///
/// JADN collapses what other schema systems split into many error variants
/// into one: callers get a path-qualified message and, internally, a
/// [`ErrorCategory`] to distinguish broad failure classes in tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    category: ErrorCategory,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        ValidationError { message: message.into(), category }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        ValidationError::new(ErrorCategory::Syntax, message)
    }

    pub fn schema_invalid(message: impl Into<String>) -> Self {
        ValidationError::new(ErrorCategory::SchemaInvalid, message)
    }

    pub fn instance_invalid(message: impl Into<String>) -> Self {
        ValidationError::new(ErrorCategory::InstanceInvalid, message)
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Qualify an existing error with a path segment, e.g. a field name or
    /// array index, matching `jadn.codec`'s practice of prefixing the
    /// innermost error with each enclosing context as it propagates up.
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        ValidationError {
            message: format!("{context}: {}", self.message),
            category: self.category,
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(e: serde_json::Error) -> Self {
        ValidationError::syntax(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_context_prefixes_message() {
        let e = ValidationError::instance_invalid("not an integer").with_context("foo/bar");
        assert_eq!(e.message(), "foo/bar: not an integer");
        assert_eq!(e.category(), ErrorCategory::InstanceInvalid);
    }

    #[test]
    fn from_serde_json_error_is_syntax() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: ValidationError = parse_err.into();
        assert_eq!(e.category(), ErrorCategory::Syntax);
    }
}
