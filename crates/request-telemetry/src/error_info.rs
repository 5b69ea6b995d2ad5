//! Failure descriptions attached to error records.
//!
//! An [`ErrorInfo`] is built at the error boundary, either from a typed Rust
//! error or from a loosely shaped JSON payload, and consumed uniformly by the
//! detail recorder. Missing parts are empty strings, never failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, message and cause chain of a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable message.
    pub message: String,
    /// Kind of the error (type name or caller-supplied label).
    pub name: String,
    /// Cause chain, one cause per line.
    pub stack: String,
}

impl ErrorInfo {
    /// Creates an error description with an empty stack.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            name: name.into(),
            stack: String::new(),
        }
    }

    /// Sets the stack text.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Describes a typed error: the short type name as `name`, its display
    /// text as `message` and its `source()` chain as `stack`.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            name: short_type_name(std::any::type_name::<E>()),
            stack: causes.join("\n"),
        }
    }

    /// Extracts `message`, `name` and `stack` string fields from a JSON
    /// payload. Anything that is not error-shaped yields empty strings.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            message: field("message"),
            name: field("name"),
            stack: field("stack"),
        }
    }

    /// True when no part of the description is filled in.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.name.is_empty() && self.stack.is_empty()
    }
}

impl From<&Value> for ErrorInfo {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Value> for ErrorInfo {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<&crate::TelemetryError> for ErrorInfo {
    fn from(error: &crate::TelemetryError) -> Self {
        Self::from_error(error)
    }
}

impl From<&std::io::Error> for ErrorInfo {
    fn from(error: &std::io::Error) -> Self {
        Self::from_error(error)
    }
}

impl From<&serde_json::Error> for ErrorInfo {
    fn from(error: &serde_json::Error) -> Self {
        Self::from_error(error)
    }
}

impl From<&(dyn std::error::Error + Send + Sync + 'static)> for ErrorInfo {
    fn from(error: &(dyn std::error::Error + Send + Sync + 'static)) -> Self {
        let mut info = Self::from_error(error);
        info.name = "Error".to_string();
        info
    }
}

/// `my_crate::module::NotFound` → `NotFound`, generic arguments kept.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{}{}", short, &full[base.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fmt;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct NotFound(Inner);

    impl fmt::Display for NotFound {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "todo not found")
        }
    }

    impl std::error::Error for NotFound {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_from_error_walks_source_chain() {
        let info = ErrorInfo::from_error(&NotFound(Inner));
        assert_eq!(info.name, "NotFound");
        assert_eq!(info.message, "todo not found");
        assert_eq!(info.stack, "caused by: connection reset");
    }

    #[test]
    fn test_from_value_error_shaped() {
        let info = ErrorInfo::from_value(&json!({
            "name": "ValidationError",
            "message": "Body id is required",
            "stack": "at handler"
        }));
        assert_eq!(info.name, "ValidationError");
        assert_eq!(info.message, "Body id is required");
        assert_eq!(info.stack, "at handler");
    }

    #[test]
    fn test_from_value_malformed_gives_empty_strings() {
        for value in [json!("boom"), json!(42), json!(null), json!({"message": 7})] {
            let info = ErrorInfo::from_value(&value);
            assert!(info.is_empty(), "{:?}", value);
        }
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Thing"), "Thing");
        assert_eq!(short_type_name("Thing"), "Thing");
        assert_eq!(short_type_name("a::Wrap<b::C>"), "Wrap<b::C>");
    }
}
