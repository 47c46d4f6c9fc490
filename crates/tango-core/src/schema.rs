//! The pluggable validation seam.
//!
//! Tango does not ship a validation library. An endpoint may carry any
//! [`Schema`]: the flattener runs it inside the terminal stage, and a
//! failure surfaces as a 422 response carrying the issue list.

use serde::{Deserialize, Serialize};

use crate::value::{Args, Value};

/// A pluggable argument validator.
///
/// `parse` either returns the (possibly transformed) args or the list of
/// issues that make them invalid. Which library backs an implementation is
/// a wiring choice.
pub trait Schema: Send + Sync {
    /// Validates and optionally transforms the parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns the issues that make the arguments invalid.
    fn parse(&self, args: Args) -> Result<Args, Vec<Issue>>;
}

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Path of the offending field, outermost first.
    pub path: Vec<String>,
    /// Human-readable description of the failure.
    pub message: String,
}

impl Issue {
    /// Creates an issue for a top-level field.
    #[must_use]
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
            message: message.into(),
        }
    }
}

/// Converts an issue list into the wire value serialized as the 422 body.
#[must_use]
pub fn issues_to_value(issues: &[Issue]) -> Value {
    Value::Array(
        issues
            .iter()
            .map(|issue| {
                Value::Map(vec![
                    (
                        Value::from("path"),
                        Value::Array(issue.path.iter().map(|p| Value::from(p.as_str())).collect()),
                    ),
                    (Value::from("message"), Value::from(issue.message.as_str())),
                ])
            })
            .collect(),
    )
}

/// A [`Schema`] backed by a plain function.
///
/// # Example
///
/// ```
/// use tango_core::{Args, FnSchema, Issue, Schema};
///
/// let schema = FnSchema::new(|args: Args| {
///     if args.contains_key("title") {
///         Ok(args)
///     } else {
///         Err(vec![Issue::field("title", "required")])
///     }
/// });
/// assert!(schema.parse(Args::new()).is_err());
/// ```
pub struct FnSchema<F> {
    func: F,
}

impl<F> FnSchema<F>
where
    F: Fn(Args) -> Result<Args, Vec<Issue>> + Send + Sync,
{
    /// Wraps a function as a schema.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(Args) -> Result<Args, Vec<Issue>> + Send + Sync,
{
    fn parse(&self, args: Args) -> Result<Args, Vec<Issue>> {
        (self.func)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serialization() {
        let issue = Issue::field("title", "too short");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"title\""));
        assert!(json.contains("too short"));
    }

    #[test]
    fn test_issues_to_value_shape() {
        let value = issues_to_value(&[Issue::field("title", "too short")]);
        let Value::Array(items) = value else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 1);
        let Value::Map(fields) = &items[0] else {
            panic!("expected map");
        };
        assert_eq!(fields[0].0, Value::from("path"));
        assert_eq!(fields[1].1, Value::from("too short"));
    }

    #[test]
    fn test_fn_schema_passthrough() {
        let schema = FnSchema::new(Ok);
        let mut args = Args::new();
        args.insert("n".into(), crate::ArgValue::from(1i64));
        assert_eq!(schema.parse(args.clone()).unwrap(), args);
    }
}
